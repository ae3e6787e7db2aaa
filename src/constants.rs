pub(crate) mod v1_0 {
    use phf::phf_map;

    // Index `n` holds the text of symbol ID `n + 1`; the table has no entry for `$0`,
    // the symbol with unknown text.
    pub static SYSTEM_SYMBOLS: &[&str] = &[
        "$ion",                     // $1
        "$ion_1_0",                 // $2
        "$ion_symbol_table",        // $3
        "name",                     // $4
        "version",                  // $5
        "imports",                  // $6
        "symbols",                  // $7
        "max_id",                   // $8
        "$ion_shared_symbol_table", // $9
    ];

    /// The system symbols the cursors refer to by ID while processing symbol tables.
    pub(crate) mod system_symbol_ids {
        pub const ION_SYMBOL_TABLE: usize = 3;
        pub const NAME: usize = 4;
        pub const VERSION: usize = 5;
        pub const IMPORTS: usize = 6;
        pub const SYMBOLS: usize = 7;
        pub const MAX_ID: usize = 8;
    }

    // The reverse mapping. The key set is fixed at compile time, so a perfect hash
    // function resolves each lookup without probing.
    pub(crate) static SYSTEM_SYMBOL_TEXT_TO_ID: phf::Map<&str, usize> = phf_map! {
        "$ion"                     => 1,
        "$ion_1_0"                 => 2,
        "$ion_symbol_table"        => 3,
        "name"                     => 4,
        "version"                  => 5,
        "imports"                  => 6,
        "symbols"                  => 7,
        "max_id"                   => 8,
        "$ion_shared_symbol_table" => 9,
    };
}
