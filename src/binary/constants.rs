/// Format constants for binary Ion v1.0.
pub mod v1_0 {
    /// The four-byte Ion version marker that begins every binary stream.
    pub const IVM: [u8; 4] = [0xE0, 0x01, 0x00, 0xEA];

    /// The reserved values of a type descriptor's length nibble.
    pub mod length_codes {
        /// Marks the value as a typed null; no body follows the header.
        pub const NULL: u8 = 15;
        /// Marks the length as too large for the nibble; a VarUInt length follows.
        pub const VAR_UINT: u8 = 14;
    }
}
