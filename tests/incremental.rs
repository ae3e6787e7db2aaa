//! Cross-module properties of the incremental cursors: determinism under arbitrary input
//! splits, oversize handling, byte accounting, and symbol table round-tripping.

use std::cell::{Cell, RefCell};
use std::io::Read;
use std::rc::Rc;

use ion_cursor::{
    BinaryCursor, BufferConfiguration, EmptyCatalog, IonCursor, IonError, IonResult, IonType,
    MapCatalog, SharedSymbolTable, StreamEvent, TextCursor,
};

/// A source whose visible prefix is controlled by the test: reads stop at `available`
/// bytes until the test raises the limit, which is how "the network is slow" is simulated.
struct ScriptedSource {
    data: Vec<u8>,
    position: usize,
    available: Rc<Cell<usize>>,
}

impl ScriptedSource {
    fn new(data: Vec<u8>, available: Rc<Cell<usize>>) -> ScriptedSource {
        ScriptedSource {
            data,
            position: 0,
            available,
        }
    }
}

impl Read for ScriptedSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let limit = self.available.get().min(self.data.len());
        let readable = limit.saturating_sub(self.position).min(buf.len());
        buf[..readable].copy_from_slice(&self.data[self.position..self.position + readable]);
        self.position += readable;
        Ok(readable)
    }
}

const IVM: &[u8] = &[0xE0, 0x01, 0x00, 0xEA];

// IVM, an LST defining "a" as $10, a NOP pad, and a mix of values:
//   42  a::7  [1, "hi", a]  {a: true}  null  "text"
fn binary_test_stream() -> Vec<u8> {
    let mut bytes = IVM.to_vec();
    bytes.extend_from_slice(&[
        0xE7, 0x81, 0x83, 0xD4, 0x87, 0xB2, 0x81, 0x61, // $ion_symbol_table::{symbols:["a"]}
        0x00, // NOP
        0x21, 0x2A, // 42
        0xE4, 0x81, 0x8A, 0x21, 0x07, // a::7
        0xB7, 0x21, 0x01, 0x82, 0x68, 0x69, 0x71, 0x0A, // [1, "hi", a]
        0xD2, 0x8A, 0x11, // {a: true}
        0x0F, // null
        0x84, 0x74, 0x65, 0x78, 0x74, // "text"
    ]);
    bytes
}

// The same sequence of values in text form.
const TEXT_TEST_STREAM: &str = r#"$ion_1_0
$ion_symbol_table::{symbols: ["a"]}
42 a::7 [1, "hi", 'a'] {'a': true} null "text""#;

// Drives `operation` until it stops reporting NeedsData, asking the feeder for more input
// between attempts. Returns NeedsData only once the feeder is exhausted.
fn drive<C, F>(cursor: &mut C, feeder: &mut F, operation: fn(&mut C) -> IonResult<StreamEvent>) -> IonResult<StreamEvent>
where
    F: FnMut() -> bool,
{
    loop {
        let event = operation(cursor)?;
        if event != StreamEvent::NeedsData {
            return Ok(event);
        }
        if !feeder() {
            return Ok(StreamEvent::NeedsData);
        }
    }
}

fn describe_binary<R: Read>(cursor: &mut BinaryCursor<R>) -> IonResult<String> {
    let mut description = String::new();
    if let Some(field_id) = cursor.field_id() {
        let name = cursor
            .symbol_table()
            .text_for(field_id)
            .unwrap_or("$0")
            .to_string();
        description.push_str(&format!("{name}:"));
    }
    for sid in cursor.annotations().to_vec() {
        let text = cursor.symbol_table().text_for(sid).unwrap_or("$0").to_string();
        description.push_str(&format!("{text}::"));
    }
    let ion_type = cursor.ion_type().unwrap();
    if cursor.is_null() {
        description.push_str(&format!("null.{ion_type}"));
        return Ok(description);
    }
    let rendered = match ion_type {
        IonType::Bool => cursor.read_bool()?.to_string(),
        IonType::Int => cursor.read_i64()?.to_string(),
        IonType::Float => cursor.read_f64()?.to_string(),
        IonType::String => format!("{:?}", cursor.read_str()?),
        IonType::Symbol => cursor.read_symbol()?.to_string(),
        other => format!("<{other}>"),
    };
    description.push_str(&rendered);
    Ok(description)
}

fn describe_text<R: Read>(cursor: &mut TextCursor<R>) -> IonResult<String> {
    let mut description = String::new();
    if let Some(field) = cursor.field_name() {
        let name = field.text().unwrap_or("$0").to_string();
        description.push_str(&format!("{name}:"));
    }
    let annotations: Vec<String> = cursor
        .annotations()
        .iter()
        .map(|a| a.text().unwrap_or("$0").to_string())
        .collect();
    for text in annotations {
        description.push_str(&format!("{text}::"));
    }
    let ion_type = cursor.ion_type().unwrap();
    if cursor.is_null() {
        description.push_str(&format!("null.{ion_type}"));
        return Ok(description);
    }
    let rendered = match ion_type {
        IonType::Bool => cursor.read_bool()?.to_string(),
        IonType::Int => cursor.read_i64()?.to_string(),
        IonType::Float => cursor.read_f64()?.to_string(),
        IonType::String => format!("{:?}", cursor.read_str()?),
        IonType::Symbol => cursor.read_symbol()?.to_string(),
        other => format!("<{other}>"),
    };
    description.push_str(&rendered);
    Ok(description)
}

// Walks an entire stream, describing every event. The walker steps into every container
// it encounters.
macro_rules! walk {
    ($cursor:expr, $feeder:expr, $describe:path, $use_end_stream:expr) => {{
        let cursor = $cursor;
        let feeder = $feeder;
        let mut events: Vec<String> = Vec::new();
        let mut declared_end = false;
        loop {
            let event = drive(cursor, feeder, |c| c.next_value())?;
            match event {
                StreamEvent::StartScalar => {
                    let mut description = $describe(cursor)?;
                    description.insert_str(0, "value ");
                    events.push(description);
                }
                StreamEvent::StartContainer => {
                    events.push(format!("start {}", cursor.ion_type().unwrap()));
                    drive(cursor, feeder, |c| c.step_into_container())?;
                }
                StreamEvent::EndContainer => {
                    events.push("end".to_string());
                    drive(cursor, feeder, |c| c.step_out_of_container())?;
                }
                StreamEvent::NeedsData => {
                    if $use_end_stream && !declared_end {
                        declared_end = true;
                        let promoted = cursor.end_stream()?;
                        if promoted == StreamEvent::StartScalar {
                            let mut description = $describe(cursor)?;
                            description.insert_str(0, "value ");
                            events.push(description);
                            continue;
                        }
                    }
                    break;
                }
                StreamEvent::NeedsInstruction => {
                    events.push("oversized".to_string());
                }
                StreamEvent::ValueReady => unreachable!("next_value never returns ValueReady"),
            }
        }
        events
    }};
}

fn binary_events_with_split(split: usize) -> IonResult<Vec<String>> {
    let data = binary_test_stream();
    let total = data.len();
    let available = Rc::new(Cell::new(split));
    let source = ScriptedSource::new(data, Rc::clone(&available));
    let mut cursor = BinaryCursor::new(source);
    let mut feeder = || {
        if available.get() >= total {
            return false;
        }
        available.set(total);
        true
    };
    Ok(walk!(&mut cursor, &mut feeder, describe_binary, false))
}

#[test]
fn binary_event_sequence_is_split_invariant() -> IonResult<()> {
    let total = binary_test_stream().len();
    let baseline = binary_events_with_split(total)?;
    assert!(baseline.contains(&"value 42".to_string()));
    assert!(baseline.contains(&"value a::7".to_string()));
    assert!(baseline.contains(&"value a:true".to_string()));
    for split in 0..total {
        let events = binary_events_with_split(split)?;
        assert_eq!(events, baseline, "events diverged when split at byte {split}");
    }
    Ok(())
}

fn text_events_with_chunk_size(chunk: usize) -> IonResult<Vec<String>> {
    let data = TEXT_TEST_STREAM.as_bytes().to_vec();
    let total = data.len();
    let available = Rc::new(Cell::new(chunk.min(total)));
    let source = ScriptedSource::new(data, Rc::clone(&available));
    let mut cursor = TextCursor::new(source);
    let mut feeder = || {
        if available.get() >= total {
            return false;
        }
        available.set((available.get() + chunk).min(total));
        true
    };
    Ok(walk!(&mut cursor, &mut feeder, describe_text, true))
}

#[test]
fn text_event_sequence_is_chunk_invariant() -> IonResult<()> {
    let total = TEXT_TEST_STREAM.len();
    let baseline = text_events_with_chunk_size(total)?;
    assert!(baseline.contains(&"value 42".to_string()));
    assert!(baseline.contains(&"value a::7".to_string()));
    for chunk in 1..=7 {
        let events = text_events_with_chunk_size(chunk)?;
        assert_eq!(
            events, baseline,
            "events diverged when fed in {chunk}-byte chunks"
        );
    }
    Ok(())
}

#[test]
fn binary_and_text_streams_agree() -> IonResult<()> {
    let from_binary = binary_events_with_split(binary_test_stream().len())?;
    let from_text = text_events_with_chunk_size(TEXT_TEST_STREAM.len())?;
    assert_eq!(from_binary, from_text);
    Ok(())
}

#[test]
fn oversized_value_recovery_is_split_invariant() -> IonResult<()> {
    // IVM, a 30-byte string (too large for a 16-byte buffer), then the int 3.
    let mut data = IVM.to_vec();
    data.extend_from_slice(&[0x8E, 0x9E]);
    data.extend_from_slice(&[b'x'; 30]);
    data.extend_from_slice(&[0x21, 0x03]);
    let total = data.len();

    for split in 0..total {
        let oversized_count = Rc::new(RefCell::new(0usize));
        let handler_count = Rc::clone(&oversized_count);
        let config = BufferConfiguration::builder()
            .with_initial_buffer_size(8)
            .with_maximum_buffer_size(16)
            .on_oversized_value(Box::new(move || {
                *handler_count.borrow_mut() += 1;
                Ok(())
            }))
            .on_oversized_symbol_table(Box::new(|| Ok(())))
            .build()?;

        let available = Rc::new(Cell::new(split));
        let source = ScriptedSource::new(data.clone(), Rc::clone(&available));
        let mut cursor = BinaryCursor::with_configuration(source, config);
        let mut feeder = || {
            if available.get() >= total {
                return false;
            }
            available.set(total);
            true
        };

        let first = drive(&mut cursor, &mut feeder, |c| c.next_value())?;
        assert_eq!(first, StreamEvent::NeedsInstruction, "split at {split}");
        let second = drive(&mut cursor, &mut feeder, |c| c.next_value())?;
        assert_eq!(second, StreamEvent::StartScalar, "split at {split}");
        assert_eq!(cursor.read_i64()?, 3);
        assert_eq!(*oversized_count.borrow(), 1, "split at {split}");
    }
    Ok(())
}

#[test]
fn data_handler_accounts_every_byte_exactly_once() -> IonResult<()> {
    // The stream contains an oversized (discarded) value; accounting must still be exact.
    let mut data = IVM.to_vec();
    data.extend_from_slice(&[0x8E, 0x9E]);
    data.extend_from_slice(&[b'x'; 30]);
    data.extend_from_slice(&[0x21, 0x03]);
    let total = data.len();

    let byte_count = Rc::new(RefCell::new(0usize));
    let handler_count = Rc::clone(&byte_count);
    let config = BufferConfiguration::builder()
        .with_initial_buffer_size(8)
        .with_maximum_buffer_size(16)
        .on_oversized_value(Box::new(|| Ok(())))
        .on_oversized_symbol_table(Box::new(|| Ok(())))
        .on_data(Box::new(move |bytes| {
            *handler_count.borrow_mut() += bytes;
            Ok(())
        }))
        .build()?;

    let mut cursor = BinaryCursor::with_configuration(std::io::Cursor::new(data), config);
    assert_eq!(cursor.next_value()?, StreamEvent::NeedsInstruction);
    assert_eq!(cursor.next_value()?, StreamEvent::StartScalar);
    assert_eq!(cursor.read_i64()?, 3);
    assert_eq!(cursor.next_value()?, StreamEvent::NeedsData);
    assert_eq!(*byte_count.borrow(), total);
    Ok(())
}

// IVM, then:
//   $ion_symbol_table::{imports: [{name: "zoo", version: 1, max_id: 2}], symbols: ["z"]}
//   $10 $11 $12
fn stream_with_import() -> Vec<u8> {
    let mut data = IVM.to_vec();
    data.extend_from_slice(&[
        0xEE, 0x96, 0x81, 0x83, 0xDE, 0x92, // $ion_symbol_table::{ (22 bytes)
        0x86, 0xBC, // imports: [ (12 bytes)
        0xDB, // { (11 bytes)
        0x84, 0x83, 0x7A, 0x6F, 0x6F, // name: "zoo"
        0x85, 0x21, 0x01, // version: 1
        0x88, 0x21, 0x02, // max_id: 2
        0x87, 0xB2, 0x81, 0x7A, // symbols: ["z"]
        0x71, 0x0A, // $10
        0x71, 0x0B, // $11
        0x71, 0x0C, // $12
    ]);
    data
}

#[test]
fn imports_resolve_through_the_catalog() -> IonResult<()> {
    let mut catalog = MapCatalog::new();
    catalog.insert_table(SharedSymbolTable::new(
        "zoo",
        1,
        vec![Some("cat".to_string()), Some("dog".to_string())],
    )?);
    let mut cursor = BinaryCursor::with_catalog(
        std::io::Cursor::new(stream_with_import()),
        BufferConfiguration::default(),
        Box::new(catalog),
    );

    // Imported IDs follow the system range; the local symbol follows the imports.
    assert_eq!(cursor.next_value()?, StreamEvent::StartScalar);
    assert_eq!(cursor.read_symbol()?.text(), Some("cat"));
    assert_eq!(cursor.next_value()?, StreamEvent::StartScalar);
    assert_eq!(cursor.read_symbol()?.text(), Some("dog"));
    assert_eq!(cursor.next_value()?, StreamEvent::StartScalar);
    assert_eq!(cursor.read_symbol()?.text(), Some("z"));
    assert_eq!(cursor.symbol_table().imported_max_id(), 9 + 2);
    assert_eq!(cursor.symbol_table().max_id(), 12);
    Ok(())
}

#[test]
fn unresolvable_imports_become_substitute_tables() -> IonResult<()> {
    let mut cursor = BinaryCursor::with_catalog(
        std::io::Cursor::new(stream_with_import()),
        BufferConfiguration::default(),
        Box::new(EmptyCatalog),
    );

    // The substitute preserves the declared ID space: $10 and $11 are defined but their
    // text is unknown, and the local symbol that follows them is unaffected.
    assert_eq!(cursor.next_value()?, StreamEvent::StartScalar);
    let symbol = cursor.read_symbol()?;
    assert_eq!(symbol.text(), None);
    match cursor.symbol_table().require_text(10) {
        Err(IonError::UnknownSymbol(e)) => assert_eq!(e.symbol_id(), 10),
        other => panic!("expected an unknown symbol error, found {other:?}"),
    }
    assert_eq!(cursor.next_value()?, StreamEvent::StartScalar);
    assert_eq!(cursor.next_value()?, StreamEvent::StartScalar);
    assert_eq!(cursor.read_symbol()?.text(), Some("z"));
    assert_eq!(cursor.symbol_table().max_id(), 12);
    Ok(())
}

#[test]
fn decoded_symbol_tables_preserve_duplicates_and_holes() -> IonResult<()> {
    // $ion_symbol_table::{symbols: ["a", null, "b", "a"]}: four entries, four slots.
    let mut data = IVM.to_vec();
    data.extend_from_slice(&[
        0xEC, 0x81, 0x83, 0xD9, 0x87, 0xB7, // wrapper + struct + symbols list
        0x81, 0x61, // "a"
        0x0F, // null
        0x81, 0x62, // "b"
        0x81, 0x61, // "a" (duplicate)
        0x71, 0x0D, // $13
    ]);
    let mut cursor = BinaryCursor::new(std::io::Cursor::new(data));
    assert_eq!(cursor.next_value()?, StreamEvent::StartScalar);

    let table = cursor.symbol_table();
    assert_eq!(table.max_id(), 13);
    assert_eq!(table.text_for(10), Some("a"));
    assert_eq!(table.text_for(11), None);
    assert!(table.sid_is_valid(11));
    assert_eq!(table.text_for(12), Some("b"));
    // The duplicate slot still decodes, but the canonical ID for "a" is the first one.
    assert_eq!(table.text_for(13), Some("a"));
    assert_eq!(table.sid_for("a"), Some(10));

    // The symbol value $13 resolves through the duplicate slot.
    assert_eq!(cursor.read_symbol()?.text(), Some("a"));
    Ok(())
}
