use std::io::Read;
use std::mem;
use std::ops::Range;

use delegate::delegate;
use num_bigint::BigUint;
use smallvec::SmallVec;

use crate::binary::buffer::BinaryBuffer;
use crate::binary::constants::v1_0::IVM;
use crate::binary::lookahead::{FillOutcome, LookaheadBuffer};
use crate::binary::lst::parse_local_symbol_table;
use crate::binary::type_code::IonTypeCode;
use crate::binary::type_descriptor::{Header, TypeDescriptor};
use crate::config::BufferConfiguration;
use crate::constants::v1_0::system_symbol_ids;
use crate::cursor::{IonCursor, SpanProvider, StreamEvent};
use crate::position::Position;
use crate::result::unknown_symbol::UnknownSymbolError;
use crate::result::{
    decoding_error, decoding_error_at, decoding_error_raw, illegal_operation,
    illegal_operation_raw, incomplete_data_error, IonError, IonResult,
};
use crate::symbol::Symbol;
use crate::symtab::imports::install_declaration;
use crate::symtab::{Catalog, EmptyCatalog, LocalSymbolTable};
use crate::types::{Int, IonType, SymbolId};

/// Type, offset, and length information about the serialized value over which the
/// BinaryCursor is currently positioned.
#[derive(Clone, Copy, Debug, PartialEq)]
struct EncodedValue {
    // The type descriptor byte that identified this value; includes the type code, length
    // code, and IonType.
    header: Header,

    // Each encoded value has up to five components, appearing in the following order:
    //
    // [ field_id? | annotations? | header (type descriptor) | header_length? | value ]
    //
    // Components shown with a `?` are optional.
    //
    // EncodedValue stores the offset of the type descriptor byte from the beginning of the
    // stream (`header_offset`). The lengths of the other components can be used to calculate
    // their positions relative to the type descriptor byte.

    // The number of bytes used to encode the field ID (if present) preceding the value. If
    // `field_id` is undefined, `field_id_length` will be zero.
    field_id_length: u8,
    // If this value is inside a struct, `field_id` will contain the SymbolId that represents
    // its field name.
    field_id: Option<SymbolId>,
    // The number of bytes used to encode the annotations wrapper (if present) preceding the
    // value. If there are no annotations, `annotations_header_length` will be zero.
    annotations_header_length: u8,
    // Type descriptor byte location, as an absolute stream offset.
    header_offset: usize,
    // The number of bytes used to encode the header not including the type descriptor byte.
    header_length: u8,
    // The number of bytes used to encode the value itself, not including the header byte
    // or length fields.
    value_length: usize,
    // field_id_length + annotations_header_length + header_length + value_length.
    // Stored for reuse: it is needed when stepping into a value, skipping a value, and
    // filling a value's data.
    total_length: usize,
}

impl EncodedValue {
    /// Returns the length of this value's header, including the type descriptor byte and any
    /// additional bytes used to encode the value's length.
    fn header_length(&self) -> usize {
        self.header_length as usize + 1
    }

    /// The absolute offset of the first byte of this item: its field ID if present, then its
    /// annotations wrapper if present, then its header.
    fn start_offset(&self) -> usize {
        self.header_offset - self.annotations_header_length as usize - self.field_id_length as usize
    }

    /// The offset of the first byte following the header (including length bytes, if present).
    fn value_offset(&self) -> usize {
        self.header_offset + self.header_length()
    }

    /// Returns the index of the first byte that is beyond the end of the current value's
    /// encoding.
    fn value_end_exclusive(&self) -> usize {
        self.value_offset() + self.value_length
    }

    #[inline(always)]
    fn value_length(&self) -> usize {
        self.value_length
    }

    fn total_length(&self) -> usize {
        self.total_length
    }

    fn ion_type(&self) -> IonType {
        self.header.ion_type
    }
}

/// Constructs an 'empty' EncodedValue that the parser can populate.
impl Default for EncodedValue {
    fn default() -> EncodedValue {
        EncodedValue {
            header: Header {
                ion_type: IonType::Null,
                ion_type_code: IonTypeCode::NullOrNop,
                length_code: crate::binary::constants::v1_0::length_codes::NULL,
            },
            field_id: None,
            field_id_length: 0,
            annotations_header_length: 0,
            header_offset: 0,
            header_length: 0,
            value_length: 0,
            total_length: 0,
        }
    }
}

/// Represents the subset of [IonType] variants that are containers.
#[derive(Debug, PartialEq, Clone, Copy)]
enum ContainerType {
    List,
    SExpression,
    Struct,
}

impl ContainerType {
    fn ion_type(&self) -> IonType {
        match self {
            ContainerType::List => IonType::List,
            ContainerType::SExpression => IonType::SExp,
            ContainerType::Struct => IonType::Struct,
        }
    }
}

/// Represents a container into which the cursor has stepped.
#[derive(Debug, PartialEq, Clone, Copy)]
struct Container {
    kind: ContainerType,
    /// The absolute offset of the first byte *after* the container.
    exclusive_end: usize,
}

/// Tracks what the cursor is in the middle of doing. Every variant that holds byte counts
/// or an [EncodedValue] represents an operation that can be resumed after more input
/// arrives; suspending and retrying never loses parser state.
#[derive(Debug, PartialEq, Clone, Copy)]
enum CursorState {
    /// Positioned where a type descriptor byte is expected: before the first value, after
    /// stepping into or out of a container, or between values.
    Ready,
    /// Positioned on a value. Scalars are fully buffered in this state; containers have at
    /// least their header buffered.
    OnValue(EncodedValue),
    /// A scalar's header has been read but its body is not fully buffered yet.
    WaitingForData(EncodedValue),
    /// Discarding bytes to reach the next value boundary.
    Skipping(usize),
    /// Discarding the remainder of an oversized value. The oversized-value handler has
    /// already run; when the discard completes the cursor resumes at the following value.
    SkippingOversized(usize),
    /// Discarding bytes to reach the end of a container that has already been popped.
    SteppingOut { target: usize },
    /// Positioned on a symbol table struct that has not been fully buffered yet.
    OnSymbolTable(EncodedValue),
    /// A symbol table exceeded the maximum buffer size. Symbol IDs declared by a table the
    /// cursor could not read can never be resolved, so—unlike an oversized value—this state
    /// is permanent: every subsequent operation reports `NeedsInstruction`.
    Terminated,
    /// `close()` was called and the input source has been released.
    Closed,
}

/// An incremental cursor over a binary Ion stream.
///
/// The cursor pulls bytes from its input source through a [LookaheadBuffer] and surfaces
/// one [StreamEvent] per operation. A source that momentarily has no data available causes
/// [`StreamEvent::NeedsData`]; the caller retries the same operation later and no work is
/// repeated. System-level constructs are handled internally:
///
/// * An Ion version marker resets the symbol table to the system context.
/// * A top-level struct annotated with `$ion_symbol_table` is materialized, resolved
///   against the catalog, and installed before any further user-value event is emitted.
///
/// See [IonCursor] for the semantics of each operation.
pub struct BinaryCursor<R: Read> {
    buffer: LookaheadBuffer<R>,
    state: CursorState,
    current_event: StreamEvent,
    parents: Vec<Container>,
    annotations: SmallVec<[SymbolId; 2]>,
    symbol_table: LocalSymbolTable,
    catalog: Box<dyn Catalog>,
    ion_version: (u8, u8),
    is_eos: bool,
}

impl<R: Read> BinaryCursor<R> {
    /// Constructs a cursor with an unbounded buffer and an empty catalog.
    pub fn new(source: R) -> BinaryCursor<R> {
        Self::with_configuration(source, BufferConfiguration::default())
    }

    pub fn with_configuration(source: R, configuration: BufferConfiguration) -> BinaryCursor<R> {
        Self::with_catalog(source, configuration, Box::new(EmptyCatalog))
    }

    pub fn with_catalog(
        source: R,
        configuration: BufferConfiguration,
        catalog: Box<dyn Catalog>,
    ) -> BinaryCursor<R> {
        BinaryCursor {
            buffer: LookaheadBuffer::new(source, configuration),
            state: CursorState::Ready,
            current_event: StreamEvent::NeedsInstruction,
            parents: Vec::new(), // Does not allocate yet
            annotations: SmallVec::new(),
            symbol_table: LocalSymbolTable::new(),
            catalog,
            ion_version: (1, 0),
            is_eos: false,
        }
    }

    delegate! {
        to self.buffer {
            /// The absolute stream offset of the next byte the cursor will consume.
            #[call(total_consumed)]
            pub fn stream_offset(&self) -> usize;
        }
    }

    /// Returns the (major, minor) version of the Ion stream being read. If no version
    /// marker has been encountered yet, returns (1, 0).
    pub fn ion_version(&self) -> (u8, u8) {
        self.ion_version
    }

    /// The symbol table currently in effect.
    pub fn symbol_table(&self) -> &LocalSymbolTable {
        &self.symbol_table
    }

    /// The symbol IDs of the current value's annotations, outermost first.
    pub fn annotations(&self) -> &[SymbolId] {
        &self.annotations
    }

    /// If the current value is a struct field, the symbol ID of its field name.
    pub fn field_id(&self) -> Option<SymbolId> {
        self.encoded_value()?.field_id
    }

    /// The type of the container the cursor is currently traversing, if any.
    pub fn parent_type(&self) -> Option<IonType> {
        self.parents.last().map(|container| container.kind.ion_type())
    }

    pub fn is_null(&self) -> bool {
        self.encoded_value()
            .map(|value| value.header.is_null())
            .unwrap_or(false)
    }

    /// Resolves a symbol ID against the table currently in effect.
    pub fn resolve_symbol(&self, sid: SymbolId) -> IonResult<Symbol> {
        self.symbol_table
            .find_known_symbol(sid)
            .ok_or_else(|| UnknownSymbolError::undefined(sid).into())
    }

    #[inline]
    fn encoded_value(&self) -> Option<&EncodedValue> {
        match &self.state {
            CursorState::OnValue(encoded_value) => Some(encoded_value),
            _ => None,
        }
    }

    fn set_event(&mut self, event: StreamEvent) -> IonResult<StreamEvent> {
        self.current_event = event;
        Ok(event)
    }

    // Reports NeedsData, unless end_stream has already been called—in which case the
    // missing bytes can never arrive and the truncation is a fatal error.
    fn needs_data(&mut self, label: &'static str) -> IonResult<StreamEvent> {
        if self.is_eos {
            return incomplete_data_error(label, self.buffer.total_consumed());
        }
        self.set_event(StreamEvent::NeedsData)
    }

    /// Drives the cursor forward to the next surfaceable event. This is the body of
    /// `next_value`; the loop structure lets each resumable state pick up exactly where a
    /// previous `NeedsData` left off.
    fn advance(&mut self) -> IonResult<StreamEvent> {
        use CursorState::*;
        loop {
            match self.state {
                Closed => return illegal_operation("the cursor has been closed"),
                Terminated => return self.set_event(StreamEvent::NeedsInstruction),
                Skipping(remaining) => {
                    let discarded = self.buffer.discard(remaining)?;
                    if discarded < remaining {
                        self.state = Skipping(remaining - discarded);
                        return self.needs_data("the remainder of a value being skipped");
                    }
                    self.state = Ready;
                }
                SkippingOversized(remaining) => {
                    let discarded = self.buffer.discard(remaining)?;
                    if discarded < remaining {
                        self.state = SkippingOversized(remaining - discarded);
                        return self.needs_data("the remainder of an oversized value");
                    }
                    self.state = Ready;
                }
                SteppingOut { target } => {
                    let remaining = target.saturating_sub(self.buffer.total_consumed());
                    let discarded = self.buffer.discard(remaining)?;
                    if discarded < remaining {
                        self.state = SteppingOut { target };
                        return self.needs_data("the remainder of a container");
                    }
                    self.state = Ready;
                }
                WaitingForData(value) => {
                    let required = value.value_end_exclusive() - self.buffer.total_consumed();
                    match self.buffer.fill_to(required)? {
                        FillOutcome::Filled => {
                            self.state = OnValue(value);
                            return self.set_event(StreamEvent::StartScalar);
                        }
                        FillOutcome::NeedsData => {
                            return self.needs_data("the body of a scalar value")
                        }
                        FillOutcome::Oversized => {
                            unreachable!("oversize is detected before waiting for data")
                        }
                    }
                }
                OnSymbolTable(value) => {
                    if let Some(event) = self.fill_and_install_symbol_table(value)? {
                        return Ok(event);
                    }
                    // The table was installed; continue to the next stream item.
                }
                OnValue(value) => {
                    // Advance past the current value to its next sibling.
                    self.annotations.clear();
                    let remaining = value.value_end_exclusive() - self.buffer.total_consumed();
                    self.state = Skipping(remaining);
                }
                Ready => {
                    if let Some(parent) = self.parents.last() {
                        if self.buffer.total_consumed() >= parent.exclusive_end {
                            return self.set_event(StreamEvent::EndContainer);
                        }
                    }
                    if let Some(event) = self.parse_next()? {
                        return Ok(event);
                    }
                }
            }
        }
    }

    /// Attempts to identify the next stream item from the buffered bytes, pulling more from
    /// the source as needed. Returns `Ok(None)` when an item was consumed internally (an
    /// IVM, NOP padding, or a symbol table handoff) and the caller should keep advancing.
    fn parse_next(&mut self) -> IonResult<Option<StreamEvent>> {
        match self.buffer.fill_to(1)? {
            FillOutcome::Filled => {}
            FillOutcome::NeedsData => {
                if self.is_eos {
                    if self.parents.is_empty() && self.buffer.remaining() == 0 {
                        // A clean end of stream.
                        return Ok(Some(self.set_event(StreamEvent::NeedsData)?));
                    }
                    return incomplete_data_error("a value", self.buffer.total_consumed());
                }
                return Ok(Some(self.set_event(StreamEvent::NeedsData)?));
            }
            FillOutcome::Oversized => {
                unreachable!("the maximum buffer size can always hold a single byte")
            }
        }
        loop {
            // Parse ahead on a disposable view of the buffer. If the attempt fails because
            // the item is only partially buffered, the view is discarded without affecting
            // the cursor and the next attempt re-parses from the last good state.
            let (item, nop_bytes, annotations) = {
                let mut parser = TxParser::new(self.buffer.view(), self.parents.last());
                let item = parser.read_next_item();
                (item, parser.nop_bytes_count, parser.annotations)
            };
            match item {
                Ok(TxItem::VersionMarker(major, minor)) => {
                    self.buffer.consume(nop_bytes + IVM.len());
                    self.ion_version = (major, minor);
                    self.symbol_table = LocalSymbolTable::new();
                    return Ok(None);
                }
                Ok(TxItem::Nothing) => {
                    if nop_bytes == 0 {
                        // No progress is possible without more data.
                        return Ok(Some(self.needs_data("a value")?));
                    }
                    self.buffer.consume(nop_bytes);
                    return Ok(None);
                }
                Ok(TxItem::Value(value)) => {
                    self.buffer.consume(nop_bytes);
                    return self.on_value_identified(value, annotations);
                }
                Err(IonError::Incomplete(_)) => {
                    // The item's header spans beyond the buffered bytes. Buffer at least
                    // one more byte and re-parse.
                    let required = self.buffer.remaining() + 1;
                    match self.buffer.fill_to(required)? {
                        FillOutcome::Filled => continue,
                        FillOutcome::NeedsData => {
                            return Ok(Some(self.needs_data("a value header")?))
                        }
                        FillOutcome::Oversized => {
                            // The field ID, annotations, and length fields alone exceed the
                            // buffer bound. Without a complete header the value's extent is
                            // unknowable, so it cannot be skipped.
                            return decoding_error_at(
                                "a value's header exceeded the maximum buffer size",
                                self.buffer.total_consumed(),
                            );
                        }
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    // The transaction parser identified a value and the buffer is positioned on its first
    // byte. Classify it and decide which event (if any) to surface.
    fn on_value_identified(
        &mut self,
        value: EncodedValue,
        annotations: SmallVec<[SymbolId; 2]>,
    ) -> IonResult<Option<StreamEvent>> {
        use CursorState::*;
        // A top-level struct whose first annotation is $ion_symbol_table is consumed
        // internally and installed as the new symbol context.
        if self.parents.is_empty()
            && value.ion_type() == IonType::Struct
            && !value.header.is_null()
            && annotations.first() == Some(&system_symbol_ids::ION_SYMBOL_TABLE)
        {
            self.annotations.clear();
            self.state = OnSymbolTable(value);
            return Ok(None);
        }
        self.annotations = annotations;
        if value.ion_type().is_container() && !value.header.is_null() {
            // Containers only need their header buffered to be reported.
            self.state = OnValue(value);
            return Ok(Some(self.set_event(StreamEvent::StartContainer)?));
        }
        // Scalars (including null containers) must be fully buffered before they are
        // reported, so that a subsequent read can't fail halfway through the value.
        let required = value.value_end_exclusive() - self.buffer.total_consumed();
        match self.buffer.fill_to(required)? {
            FillOutcome::Filled => {
                self.state = OnValue(value);
                Ok(Some(self.set_event(StreamEvent::StartScalar)?))
            }
            FillOutcome::NeedsData => {
                self.state = WaitingForData(value);
                Ok(Some(self.needs_data("the body of a scalar value")?))
            }
            FillOutcome::Oversized => Ok(Some(self.begin_skipping_oversized(required)?)),
        }
    }

    // The current value cannot fit in the configured maximum buffer size. Notify the
    // handler exactly once, then discard the value without buffering it. The discard may
    // span several NeedsData rounds; the handler is not re-invoked.
    fn begin_skipping_oversized(&mut self, value_length: usize) -> IonResult<StreamEvent> {
        self.annotations.clear();
        self.state = CursorState::SkippingOversized(value_length);
        self.buffer.config_mut().notify_oversized_value()?;
        let discarded = self.buffer.discard(value_length)?;
        if discarded == value_length {
            self.state = CursorState::Ready;
        } else {
            self.state = CursorState::SkippingOversized(value_length - discarded);
        }
        self.set_event(StreamEvent::NeedsInstruction)
    }

    // Buffers a symbol table struct in full, then parses and installs it. Returns
    // `Ok(None)` once the table is in effect, or `Ok(Some(event))` if the caller must
    // surface an event first (more data needed, or the table was oversized).
    fn fill_and_install_symbol_table(
        &mut self,
        value: EncodedValue,
    ) -> IonResult<Option<StreamEvent>> {
        let required = value.value_end_exclusive() - self.buffer.total_consumed();
        match self.buffer.fill_to(required)? {
            FillOutcome::Filled => {}
            FillOutcome::NeedsData => {
                return Ok(Some(self.needs_data("a symbol table")?));
            }
            FillOutcome::Oversized => {
                // Unlike an oversized value, an unread symbol table corrupts the meaning of
                // every symbol ID that follows it. The cursor becomes permanently inert.
                self.state = CursorState::Terminated;
                self.buffer.config_mut().notify_oversized_symbol_table()?;
                return Ok(Some(self.set_event(StreamEvent::NeedsInstruction)?));
            }
        }
        let declaration = {
            let body = self
                .buffer
                .view_range(value.value_offset(), value.value_length());
            parse_local_symbol_table(body)?
        };
        // Imports are applied before symbols regardless of the order in which the stream
        // declared the fields.
        install_declaration(&mut self.symbol_table, declaration, self.catalog.as_ref())?;
        self.buffer.consume(required);
        self.state = CursorState::Ready;
        Ok(None)
    }

    // Finishes discarding bytes up to `target`, the exclusive end of a popped container.
    fn continue_stepping_out(&mut self, target: usize) -> IonResult<StreamEvent> {
        let remaining = target.saturating_sub(self.buffer.total_consumed());
        let discarded = self.buffer.discard(remaining)?;
        if discarded < remaining {
            self.state = CursorState::SteppingOut { target };
            return self.needs_data("the remainder of a container");
        }
        self.state = CursorState::Ready;
        self.set_event(StreamEvent::NeedsInstruction)
    }

    /// Verifies that the cursor is positioned over a fully-buffered, non-null value of the
    /// expected type and returns the value's metadata along with its body bytes.
    fn value_and_bytes(&self, expected_ion_type: IonType) -> IonResult<(&EncodedValue, &[u8])> {
        let encoded_value = self
            .encoded_value()
            .ok_or_else(|| illegal_operation_raw("the cursor is not positioned on a value"))?;
        if encoded_value.ion_type() != expected_ion_type {
            return illegal_operation(format!(
                "type mismatch: expected a(n) {} but positioned over a(n) {}",
                expected_ion_type,
                encoded_value.ion_type()
            ));
        }
        if encoded_value.header.is_null() {
            return illegal_operation(format!(
                "cannot read a null value as a(n) {expected_ion_type}"
            ));
        }
        let available = self.buffer.total_consumed() + self.buffer.remaining();
        if encoded_value.value_end_exclusive() > available {
            return illegal_operation(
                "the current value is not buffered; call fill_value() first",
            );
        }
        let bytes = self
            .buffer
            .bytes_range(encoded_value.value_offset(), encoded_value.value_length());
        Ok((encoded_value, bytes))
    }

    /// If the cursor is positioned on a boolean, returns its value.
    pub fn read_bool(&mut self) -> IonResult<bool> {
        let (encoded_value, _) = self.value_and_bytes(IonType::Bool)?;
        match encoded_value.header.length_code {
            0 => Ok(false),
            1 => Ok(true),
            _ => decoding_error("found a boolean value with an illegal representation"),
        }
    }

    /// If the cursor is positioned on an integer, returns its value.
    pub fn read_int(&mut self) -> IonResult<Int> {
        let (encoded_value, bytes) = self.value_and_bytes(IonType::Int)?;
        let magnitude: Int = if bytes.len() <= mem::size_of::<u64>() {
            Int::from(crate::binary::uint::DecodedUInt::small_uint_from_slice(bytes))
        } else {
            Int::BigInt(BigUint::from_bytes_be(bytes).into())
        };
        match encoded_value.header.ion_type_code {
            IonTypeCode::PositiveInteger => Ok(magnitude),
            IonTypeCode::NegativeInteger if magnitude.is_zero() => {
                decoding_error("found a negative integer (typecode=3) with a value of 0")
            }
            IonTypeCode::NegativeInteger => Ok(-magnitude),
            _ => decoding_error("unexpected ion type code for an integer"),
        }
    }

    /// If the cursor is positioned on an integer that fits in an `i64`, returns it.
    pub fn read_i64(&mut self) -> IonResult<i64> {
        self.read_int().and_then(|value| {
            value
                .as_i64()
                .ok_or_else(|| decoding_error_raw("integer was too large to fit in an i64"))
        })
    }

    /// If the cursor is positioned on a float, returns its value.
    pub fn read_f64(&mut self) -> IonResult<f64> {
        let (_encoded_value, bytes) = self.value_and_bytes(IonType::Float)?;
        match bytes.len() {
            0 => Ok(0f64),
            4 => Ok(f64::from(f32::from_be_bytes(bytes.try_into().unwrap()))),
            8 => Ok(f64::from_be_bytes(bytes.try_into().unwrap())),
            _ => decoding_error("encountered a float with an illegal length"),
        }
    }

    /// If the cursor is positioned on a string, returns its text.
    pub fn read_str(&mut self) -> IonResult<&str> {
        let (_encoded_value, bytes) = self.value_and_bytes(IonType::String)?;
        std::str::from_utf8(bytes)
            .map_err(|_| decoding_error_raw("encountered a string with invalid utf-8 data"))
    }

    /// If the cursor is positioned on a symbol value, returns its symbol ID.
    pub fn read_symbol_id(&mut self) -> IonResult<SymbolId> {
        let (_encoded_value, bytes) = self.value_and_bytes(IonType::Symbol)?;
        if bytes.len() > mem::size_of::<u64>() {
            // This is usually unreadable data, but the encoding may simply be padded with
            // leading zeros; a BigUint can still downgrade to a usize in that case.
            return Self::try_symbol_id_from_big_uint(&BigUint::from_bytes_be(bytes));
        }
        let magnitude = crate::binary::uint::DecodedUInt::small_uint_from_slice(bytes);
        usize::try_from(magnitude)
            .map_err(|_| decoding_error_raw("found a symbol ID that was too large to fit in a usize"))
    }

    #[inline(never)]
    // This method performs allocations/computation that compile to non-trivial instructions.
    // It will only be called if the input stream contains unusual data; making it
    // `inline(never)` keeps the compiler from bloating the hot path with its expansion.
    fn try_symbol_id_from_big_uint(big_uint: &BigUint) -> IonResult<SymbolId> {
        if let Ok(sid) = big_uint.try_into() {
            Ok(sid)
        } else {
            decoding_error("found a symbol ID that was too large to fit in a usize")
        }
    }

    /// If the cursor is positioned on a symbol value, resolves it against the symbol table
    /// currently in effect.
    pub fn read_symbol(&mut self) -> IonResult<Symbol> {
        let sid = self.read_symbol_id()?;
        self.resolve_symbol(sid)
    }

    /// Returns the raw bytes of the current value's body, if they are buffered. Containers
    /// must be filled with [`fill_value`](IonCursor::fill_value) first.
    pub fn raw_value_bytes(&self) -> Option<&[u8]> {
        let value = self.encoded_value()?;
        let available = self.buffer.total_consumed() + self.buffer.remaining();
        if value.value_end_exclusive() > available {
            return None;
        }
        Some(
            self.buffer
                .bytes_range(value.value_offset(), value.value_length()),
        )
    }
}

impl<R: Read> IonCursor for BinaryCursor<R> {
    fn next_value(&mut self) -> IonResult<StreamEvent> {
        self.advance()
    }

    fn step_into_container(&mut self) -> IonResult<StreamEvent> {
        use CursorState::*;
        match self.state {
            Closed => return illegal_operation("the cursor has been closed"),
            Terminated => return self.set_event(StreamEvent::NeedsInstruction),
            _ => {}
        }
        let value = match self.encoded_value() {
            Some(value) if value.ion_type().is_container() && !value.header.is_null() => *value,
            _ => {
                return illegal_operation(
                    "cannot step in; the cursor is not positioned over a container",
                )
            }
        };
        let kind = match value.ion_type() {
            IonType::List => ContainerType::List,
            IonType::SExp => ContainerType::SExpression,
            IonType::Struct => ContainerType::Struct,
            _ => unreachable!("is_container() was checked above"),
        };
        self.parents.push(Container {
            kind,
            exclusive_end: value.value_end_exclusive(),
        });
        // Move to the first byte of the container's body. The header bytes are always
        // buffered; the cursor had to read them to be parked on this container.
        let header_span = value.total_length() - value.value_length();
        self.buffer.consume(header_span);
        self.annotations.clear();
        self.state = Ready;
        self.set_event(StreamEvent::NeedsInstruction)
    }

    fn step_out_of_container(&mut self) -> IonResult<StreamEvent> {
        use CursorState::*;
        match self.state {
            Closed => return illegal_operation("the cursor has been closed"),
            Terminated => return self.set_event(StreamEvent::NeedsInstruction),
            // A previous step-out is still discarding bytes; finish it.
            SteppingOut { target } => return self.continue_stepping_out(target),
            _ => {}
        }
        let parent = match self.parents.pop() {
            Some(parent) => parent,
            None => return illegal_operation("cannot step out at the top level (depth=0)"),
        };
        self.annotations.clear();
        self.continue_stepping_out(parent.exclusive_end)
    }

    fn fill_value(&mut self) -> IonResult<StreamEvent> {
        use CursorState::*;
        let value = match self.state {
            Closed => return illegal_operation("the cursor has been closed"),
            Terminated => return self.set_event(StreamEvent::NeedsInstruction),
            OnValue(value) | WaitingForData(value) => value,
            _ => {
                return illegal_operation(
                    "fill_value requires the cursor to be positioned on a value",
                )
            }
        };
        let required = value.value_end_exclusive() - self.buffer.total_consumed();
        match self.buffer.fill_to(required)? {
            FillOutcome::Filled => {
                self.state = OnValue(value);
                self.set_event(StreamEvent::ValueReady)
            }
            FillOutcome::NeedsData => self.needs_data("the body of a value"),
            FillOutcome::Oversized => self.begin_skipping_oversized(required),
        }
    }

    fn end_stream(&mut self) -> IonResult<StreamEvent> {
        use CursorState::*;
        match self.state {
            Closed => return illegal_operation("the cursor has been closed"),
            Terminated => return self.set_event(StreamEvent::NeedsInstruction),
            _ => {}
        }
        if !self.parents.is_empty() {
            return illegal_operation("end_stream cannot be called below the top level");
        }
        match self.state {
            WaitingForData(_) | Skipping(_) | SkippingOversized(_) | OnSymbolTable(_)
            | SteppingOut { .. } => {
                return incomplete_data_error(
                    "a value interrupted by the end of the stream",
                    self.buffer.total_consumed(),
                );
            }
            OnValue(value) => {
                self.is_eos = true;
                self.buffer.release_source();
                let available = self.buffer.total_consumed() + self.buffer.remaining();
                if value.value_end_exclusive() > available {
                    return incomplete_data_error(
                        "a container truncated by the end of the stream",
                        self.buffer.total_consumed(),
                    );
                }
                Ok(self.current_event)
            }
            Ready => {
                self.is_eos = true;
                self.buffer.release_source();
                if self.buffer.remaining() > 0 {
                    // Leftover bytes must form at least one complete item; otherwise the
                    // stream was truncated mid-value and no amount of retrying will help.
                    let mut parser = TxParser::new(self.buffer.view(), self.parents.last());
                    match parser.read_next_item() {
                        Err(IonError::Incomplete(_)) => {
                            return incomplete_data_error(
                                "a value truncated by the end of the stream",
                                self.buffer.total_consumed(),
                            );
                        }
                        Err(error) => return Err(error),
                        Ok(TxItem::Value(value)) => {
                            let available = self.buffer.total_consumed() + self.buffer.remaining();
                            if !value.ion_type().is_container()
                                && value.value_end_exclusive() > available
                            {
                                return incomplete_data_error(
                                    "a value truncated by the end of the stream",
                                    self.buffer.total_consumed(),
                                );
                            }
                        }
                        Ok(_) => {}
                    }
                }
                self.set_event(StreamEvent::NeedsData)
            }
            Closed | Terminated => unreachable!("handled above"),
        }
    }

    fn current_event(&self) -> StreamEvent {
        self.current_event
    }

    fn depth(&self) -> usize {
        self.parents.len()
    }

    fn ion_type(&self) -> Option<IonType> {
        self.encoded_value().map(|value| value.ion_type())
    }

    fn close(&mut self) -> IonResult<()> {
        self.buffer.release_source();
        self.state = CursorState::Closed;
        Ok(())
    }

    fn span_provider(&self) -> Option<&dyn SpanProvider> {
        Some(self)
    }
}

impl<R: Read> SpanProvider for BinaryCursor<R> {
    fn value_span(&self) -> Option<Range<usize>> {
        let value = match &self.state {
            CursorState::OnValue(value) | CursorState::WaitingForData(value) => value,
            _ => return None,
        };
        Some(value.start_offset()..value.value_end_exclusive())
    }

    fn position(&self) -> Position {
        self.buffer.position()
    }
}

/// The kinds of stream items the transaction parser can identify.
#[derive(Debug, PartialEq)]
enum TxItem {
    VersionMarker(u8, u8),
    Value(EncodedValue),
    /// Only NOP padding was found before the end of the buffered data or the enclosing
    /// container.
    Nothing,
}

/// A disposable parser over a view of the cursor's buffer.
///
/// By parsing a slice (view) of the buffer, the parser is able to read ahead without
/// affecting the cursor. If it finds the next item, the cursor applies the result; if it
/// runs out of data partway through, the parser is simply discarded, and the cursor's state
/// is exactly as it was before the attempt. In this way the cursor is never left in a bad
/// intermediate state.
struct TxParser<'a> {
    tx_buffer: BinaryBuffer<&'a [u8]>,
    parent: Option<&'a Container>,
    encoded_value: EncodedValue,
    annotations: SmallVec<[SymbolId; 2]>,
    nop_bytes_count: usize,
}

impl<'a> TxParser<'a> {
    fn new(tx_buffer: BinaryBuffer<&'a [u8]>, parent: Option<&'a Container>) -> TxParser<'a> {
        TxParser {
            tx_buffer,
            parent,
            encoded_value: EncodedValue::default(),
            annotations: SmallVec::new(),
            nop_bytes_count: 0,
        }
    }

    /// Begins reading ahead to find the next item.
    #[inline]
    fn read_next_item(&mut self) -> IonResult<TxItem> {
        let type_descriptor = self.tx_buffer.peek_type_descriptor()?;

        match self.parent.map(|p| p.kind) {
            // We're at the top level; check to see if this is the start of an IVM.
            None if type_descriptor.is_ivm_start() => self.read_ivm(),
            // We're inside a struct; the next item must be a (fieldID, value_header) pair.
            Some(ContainerType::Struct) => self.read_struct_field_header(),
            // We're at the top level (but not at an IVM), or inside a list or s-expression.
            // The next item must be a (potentially annotated) value.
            _ => self.read_sequence_item(type_descriptor),
        }
    }

    /// Looks for zero or more NOP pads followed by either an annotated value or a value.
    #[inline]
    fn read_sequence_item(
        &mut self,
        mut type_descriptor: TypeDescriptor,
    ) -> IonResult<TxItem> {
        if type_descriptor.is_nop() {
            if let Some(item) = self.consume_nop_padding(&mut type_descriptor)? {
                // The end of the buffered data or the enclosing container was reached while
                // reading NOP padding.
                return Ok(item);
            }
            // `consume_nop_padding` has updated `type_descriptor` to the first
            // non-padding byte.
            if self.parent.is_none() && type_descriptor.is_ivm_start() {
                return self.read_ivm();
            }
        }

        if type_descriptor.is_annotation_wrapper() {
            self.read_annotated_value_header(type_descriptor)
        } else {
            self.read_unannotated_value_header(type_descriptor, None)
        }
    }

    /// Looks for zero or more (fieldId, NOP pad) pairs followed by a (fieldId, value) pair.
    fn read_struct_field_header(&mut self) -> IonResult<TxItem> {
        let mut field_id;
        // NOP padding makes this slightly convoluted. We always read the field ID, but if
        // the following value is a NOP then the field ID is discarded and the process
        // starts over.
        let mut type_descriptor;
        loop {
            // A struct can be empty (no values) but still contain NOP pads; if we've
            // reached the end of the parent struct, return `Nothing`.
            if self.is_at_end_of_container() {
                return Ok(TxItem::Nothing);
            }
            // If there are any bytes in this container (even NOP bytes), there must be a
            // field ID.
            field_id = self.tx_buffer.read_var_uint()?;
            // If there was a field ID, there must be at least one more byte for the NOP
            // or value.
            type_descriptor = self.tx_buffer.peek_type_descriptor()?;
            if type_descriptor.is_nop() {
                let bytes_skipped = self.tx_buffer.read_nop_pad()?;
                self.nop_bytes_count += field_id.size_in_bytes() + bytes_skipped;
            } else {
                // We've moved beyond any NOP pads. The last field ID we read was a real
                // one; record its length and offset information.
                self.encoded_value.field_id_length = u8::try_from(field_id.size_in_bytes())
                    .map_err(|_| decoding_error_raw("found a field ID with more than 255 bytes"))?;
                self.encoded_value.field_id = Some(field_id.value());
                return if type_descriptor.is_annotation_wrapper() {
                    self.read_annotated_value_header(type_descriptor)
                } else {
                    self.read_unannotated_value_header(type_descriptor, None)
                };
            }
        }
    }

    /// Reads an annotation wrapper followed by a mandatory unannotated value.
    fn read_annotated_value_header(
        &mut self,
        mut type_descriptor: TypeDescriptor,
    ) -> IonResult<TxItem> {
        // Read the annotations envelope from the buffer.
        let expected_value_length = self.read_annotations_wrapper(type_descriptor)?;
        // If there's no type descriptor after the annotations envelope, this will report
        // Incomplete and the attempt will be retried once more data arrives.
        type_descriptor = self.tx_buffer.peek_type_descriptor()?;
        // Read the value's header from the buffer.
        self.read_unannotated_value_header(type_descriptor, Some(expected_value_length))
    }

    /// Reads the unannotated header byte (and any length bytes) for the next value.
    fn read_unannotated_value_header(
        &mut self,
        type_descriptor: TypeDescriptor,
        expected_length: Option<usize>,
    ) -> IonResult<TxItem> {
        // Resolve the TypeDescriptor to a value Header. A Header holds the same information
        // but, because we know it's a value (not a NOP, IVM, or annotation wrapper), it
        // holds an `IonType` instead of an `Option<IonType>`.
        let header: Header = type_descriptor
            .to_header()
            .ok_or_else(|| decoding_error_raw("found a non-value in value position"))?;

        self.encoded_value.header = header;
        // Record the *absolute* offset of the type descriptor—its offset from the
        // beginning of the stream.
        self.encoded_value.header_offset = self.tx_buffer.total_consumed();
        // Advance beyond the type descriptor.
        self.tx_buffer.consume(1);

        // Record the header's offset/length information.
        let length = self.tx_buffer.read_value_length(header)?;
        self.encoded_value.header_length = u8::try_from(length.size_in_bytes()).map_err(|_| {
            decoding_error_raw("found a value with a header length field over 255 bytes long")
        })?;
        self.encoded_value.value_length = length.value();
        self.encoded_value.total_length = self.encoded_value.field_id_length as usize
            + self.encoded_value.annotations_header_length as usize
            + self.encoded_value.header_length()
            + self.encoded_value.value_length();

        // If this value was annotated, make sure that the length declared in the header
        // matches the one that was declared in the preceding annotations wrapper.
        if let Some(expected_length) = expected_length {
            if expected_length
                != self.encoded_value.header_length() + self.encoded_value.value_length()
            {
                return decoding_error("annotations wrapper length did not align with value length");
            }
        }

        Ok(TxItem::Value(self.encoded_value))
    }

    #[inline(never)]
    // NOP padding is not widely used in Ion 1.0. This method is annotated with
    // `inline(never)` to avoid the compiler bloating other methods on the hot path with its
    // rarely used instructions.
    fn consume_nop_padding(
        &mut self,
        type_descriptor: &mut TypeDescriptor,
    ) -> IonResult<Option<TxItem>> {
        // Skip over any number of NOP regions.
        while type_descriptor.is_nop() {
            let bytes_skipped = self.tx_buffer.read_nop_pad()?;
            self.nop_bytes_count += bytes_skipped;
            // If the reader hasn't reached a value header by the end of this method, the
            // cursor will discard these NOP bytes before the next parse attempt so that
            // they don't need to be held in the buffer.
            if self.is_eof() || self.is_at_end_of_container() {
                return Ok(Some(TxItem::Nothing));
            }
            *type_descriptor = self.tx_buffer.peek_type_descriptor()?;
        }
        Ok(None)
    }

    /// Reads an annotations wrapper's envelope and the symbol IDs inside it, populating the
    /// annotations-related lengths in the `EncodedValue`. Returns the expected length of
    /// the annotated value nested inside the envelope.
    fn read_annotations_wrapper(&mut self, type_descriptor: TypeDescriptor) -> IonResult<usize> {
        let initial_consumed = self.tx_buffer.total_consumed();
        // Consume the first byte; its contents are already in the `type_descriptor`
        // parameter.
        self.tx_buffer.consume(1);

        // Read the combined length of the annotations sequence and the value that follows it.
        let annotations_and_value_length = match type_descriptor.length_code {
            crate::binary::constants::v1_0::length_codes::NULL => 0,
            crate::binary::constants::v1_0::length_codes::VAR_UINT => {
                self.tx_buffer.read_var_uint()?.value()
            }
            length => length as usize,
        };

        // Read the length of the annotations sequence.
        let annotations_length = self.tx_buffer.read_var_uint()?;

        // Validate that the annotations sequence is not empty.
        if annotations_length.value() == 0 {
            return decoding_error("found an annotations wrapper with no annotations");
        }

        // Validate that the annotated value is not missing.
        let expected_value_length = annotations_and_value_length
            .checked_sub(annotations_length.size_in_bytes() + annotations_length.value())
            .ok_or_else(|| {
                decoding_error_raw("found an annotations wrapper whose lengths were inconsistent")
            })?;

        if expected_value_length == 0 {
            return decoding_error("found an annotation wrapper with no value");
        }

        // Read the VarUInt symbol IDs that make up the annotations sequence.
        let sequence_length = annotations_length.value();
        let mut sequence_consumed = 0;
        while sequence_consumed < sequence_length {
            let sid = self.tx_buffer.read_var_uint()?;
            sequence_consumed += sid.size_in_bytes();
            if sequence_consumed > sequence_length {
                return decoding_error(
                    "found an annotation that exceeded the wrapper's declared length",
                );
            }
            self.annotations.push(sid.value());
        }

        // Record the wrapper's length so the value's total extent can be computed.
        self.encoded_value.annotations_header_length =
            u8::try_from(self.tx_buffer.total_consumed() - initial_consumed).map_err(|_| {
                decoding_error_raw("found an annotations header greater than 255 bytes long")
            })?;

        Ok(expected_value_length)
    }

    /// Reads a four-byte Ion v1.0 version marker.
    #[inline(never)]
    fn read_ivm(&mut self) -> IonResult<TxItem> {
        if let Some(container) = self.parent {
            return decoding_error(format!("found an Ion version marker inside a {container:?}"));
        };
        let (major, minor) = self.tx_buffer.read_ivm()?;
        if !matches!((major, minor), (1, 0)) {
            return decoding_error(format!("unsupported Ion version {major:X}.{minor:X}"));
        }
        Ok(TxItem::VersionMarker(major, minor))
    }

    /// Returns `true` if the parser is inside a container and has consumed enough bytes to
    /// have reached its end.
    fn is_at_end_of_container(&self) -> bool {
        if let Some(parent) = self.parent {
            if self.tx_buffer.total_consumed() >= parent.exclusive_end {
                return true;
            }
        }
        false
    }

    /// Returns `true` if, at this point in the read attempt, the parser is at the top
    /// level, not inside an annotations wrapper (where a value would be expected), and out
    /// of buffered bytes.
    fn is_eof(&self) -> bool {
        self.parent.is_none()
            && self.encoded_value.annotations_header_length == 0
            && self.tx_buffer.is_empty()
    }
}

#[cfg(test)]
mod binary_cursor_tests {
    use super::*;
    use crate::cursor::StreamEvent::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const IVM_BYTES: &[u8] = &[0xE0, 0x01, 0x00, 0xEA];

    fn stream(value_bytes: &[u8]) -> Vec<u8> {
        let mut bytes = IVM_BYTES.to_vec();
        bytes.extend_from_slice(value_bytes);
        bytes
    }

    fn cursor_over(bytes: Vec<u8>) -> BinaryCursor<std::io::Cursor<Vec<u8>>> {
        BinaryCursor::new(std::io::Cursor::new(bytes))
    }

    #[test]
    fn read_top_level_scalars() -> IonResult<()> {
        let mut cursor = cursor_over(stream(&[0x21, 0x01, 0x21, 0x02, 0x11]));
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.ion_type(), Some(IonType::Int));
        assert_eq!(cursor.read_i64()?, 1);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 2);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert!(cursor.read_bool()?);
        // The source is dry; the stream may simply not have ended yet.
        assert_eq!(cursor.next_value()?, NeedsData);
        Ok(())
    }

    #[test]
    fn traverse_a_list() -> IonResult<()> {
        // [1, [2], 3] true
        let mut cursor = cursor_over(stream(&[
            0xB7, 0x21, 0x01, 0xB2, 0x21, 0x02, 0x21, 0x03, 0x11,
        ]));
        assert_eq!(cursor.next_value()?, StartContainer);
        assert_eq!(cursor.ion_type(), Some(IonType::List));
        assert_eq!(cursor.step_into_container()?, NeedsInstruction);
        assert_eq!(cursor.depth(), 1);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 1);
        assert_eq!(cursor.next_value()?, StartContainer);
        // Skip the nested list without stepping in.
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 3);
        assert_eq!(cursor.next_value()?, EndContainer);
        assert_eq!(cursor.step_out_of_container()?, NeedsInstruction);
        assert_eq!(cursor.depth(), 0);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert!(cursor.read_bool()?);
        Ok(())
    }

    #[test]
    fn struct_fields_have_ids() -> IonResult<()> {
        // {$4: 5}  ($4 is "name")
        let mut cursor = cursor_over(stream(&[0xD3, 0x84, 0x21, 0x05]));
        assert_eq!(cursor.next_value()?, StartContainer);
        cursor.step_into_container()?;
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.field_id(), Some(4));
        assert_eq!(cursor.symbol_table().text_for(4), Some("name"));
        assert_eq!(cursor.read_i64()?, 5);
        assert_eq!(cursor.next_value()?, EndContainer);
        Ok(())
    }

    #[test]
    fn step_out_skips_unread_values() -> IonResult<()> {
        // [1, 2, 3] true
        let mut cursor = cursor_over(stream(&[
            0xB6, 0x21, 0x01, 0x21, 0x02, 0x21, 0x03, 0x11,
        ]));
        assert_eq!(cursor.next_value()?, StartContainer);
        cursor.step_into_container()?;
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.step_out_of_container()?, NeedsInstruction);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert!(cursor.read_bool()?);
        Ok(())
    }

    #[test]
    fn step_out_at_top_level_is_a_fault() {
        let mut cursor = cursor_over(stream(&[0x21, 0x01]));
        let result = cursor.step_out_of_container();
        assert!(matches!(result, Err(IonError::IllegalOperation(_))));
    }

    #[test]
    fn annotations_are_surfaced() -> IonResult<()> {
        // $10::11  (annotation sid 10 on int 11), preceded by an LST declaring "a"
        let mut cursor = cursor_over(stream(&[
            // $ion_symbol_table::{symbols:["a"]}
            0xE7, 0x81, 0x83, 0xD4, 0x87, 0xB2, 0x81, 0x61,
            // $10::11
            0xE4, 0x81, 0x8A, 0x21, 0x0B,
        ]));
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.annotations(), &[10]);
        assert_eq!(cursor.resolve_symbol(10)?.text(), Some("a"));
        assert_eq!(cursor.read_i64()?, 11);
        Ok(())
    }

    #[test]
    fn symbol_tables_are_consumed_and_installed() -> IonResult<()> {
        // $ion_symbol_table::{symbols:["hello"]} $10
        let mut cursor = cursor_over(stream(&[
            0xEB, 0x81, 0x83, 0xD8, 0x87, 0xB6, 0x85, 0x68, 0x65, 0x6C, 0x6C, 0x6F, // LST
            0x71, 0x0A, // $10
        ]));
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.ion_type(), Some(IonType::Symbol));
        assert_eq!(cursor.read_symbol()?.text(), Some("hello"));
        Ok(())
    }

    #[test]
    fn ivm_resets_the_symbol_table() -> IonResult<()> {
        // LST defines "hello" as $10; a second IVM resets the context, after which $10 is
        // undefined.
        let mut bytes = stream(&[
            0xEB, 0x81, 0x83, 0xD8, 0x87, 0xB6, 0x85, 0x68, 0x65, 0x6C, 0x6C, 0x6F,
            0x71, 0x0A,
        ]);
        bytes.extend_from_slice(IVM_BYTES);
        bytes.extend_from_slice(&[0x71, 0x0A]);
        let mut cursor = cursor_over(bytes);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_symbol()?.text(), Some("hello"));
        assert_eq!(cursor.next_value()?, StartScalar);
        match cursor.read_symbol() {
            Err(IonError::UnknownSymbol(e)) => assert_eq!(e.symbol_id(), 10),
            other => panic!("expected an unknown symbol error, found {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn nop_padding_is_skipped() -> IonResult<()> {
        // NOP pads interleaved with values at the top level and inside a struct.
        let mut cursor = cursor_over(stream(&[
            0x00, // 1-byte NOP
            0x03, 0x00, 0x00, 0x00, // 4-byte NOP
            0xD6, 0x84, 0x01, 0x00, 0x84, 0x21, 0x05, // {$4: NOP, $4: 5}
            0x20, // 0
        ]));
        assert_eq!(cursor.next_value()?, StartContainer);
        cursor.step_into_container()?;
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 5);
        assert_eq!(cursor.next_value()?, EndContainer);
        cursor.step_out_of_container()?;
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 0);
        Ok(())
    }

    #[test]
    fn fill_value_buffers_a_container() -> IonResult<()> {
        let mut cursor = cursor_over(stream(&[0xB2, 0x21, 0x07]));
        assert_eq!(cursor.next_value()?, StartContainer);
        assert_eq!(cursor.fill_value()?, ValueReady);
        assert_eq!(cursor.raw_value_bytes(), Some(&[0x21, 0x07][..]));
        Ok(())
    }

    #[test]
    fn value_spans_are_reported() -> IonResult<()> {
        let mut cursor = cursor_over(stream(&[0x21, 0x01, 0x21, 0x02]));
        cursor.next_value()?;
        let provider = cursor.span_provider().unwrap();
        assert_eq!(provider.value_span(), Some(4..6));
        cursor.next_value()?;
        let provider = cursor.span_provider().unwrap();
        assert_eq!(provider.value_span(), Some(6..8));
        Ok(())
    }

    #[test]
    fn end_stream_mid_value_is_a_fault() -> IonResult<()> {
        // A string of declared length 4 with only two bytes of data.
        let mut cursor = cursor_over(stream(&[0x84, 0x68, 0x69]));
        assert_eq!(cursor.next_value()?, NeedsData);
        match cursor.end_stream() {
            Err(IonError::Incomplete(_)) => Ok(()),
            other => panic!("expected an incomplete error, found {other:?}"),
        }
    }

    #[test]
    fn end_stream_at_a_clean_boundary_is_a_no_op() -> IonResult<()> {
        let mut cursor = cursor_over(stream(&[0x21, 0x01]));
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 1);
        assert_eq!(cursor.next_value()?, NeedsData);
        assert_eq!(cursor.end_stream()?, NeedsData);
        // The stream is over; the cursor stays parked.
        assert_eq!(cursor.next_value()?, NeedsData);
        Ok(())
    }

    #[test]
    fn close_is_idempotent() -> IonResult<()> {
        let mut cursor = cursor_over(stream(&[0x21, 0x01]));
        cursor.close()?;
        cursor.close()?;
        assert!(matches!(
            cursor.next_value(),
            Err(IonError::IllegalOperation(_))
        ));
        Ok(())
    }

    fn bounded_config(
        maximum: usize,
        oversized_values: Rc<RefCell<usize>>,
        oversized_tables: Rc<RefCell<usize>>,
    ) -> BufferConfiguration {
        BufferConfiguration::builder()
            .with_initial_buffer_size(8)
            .with_maximum_buffer_size(maximum)
            .on_oversized_value(Box::new(move || {
                *oversized_values.borrow_mut() += 1;
                Ok(())
            }))
            .on_oversized_symbol_table(Box::new(move || {
                *oversized_tables.borrow_mut() += 1;
                Ok(())
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn oversized_value_is_skipped_and_reported_once() -> IonResult<()> {
        let value_count = Rc::new(RefCell::new(0));
        let table_count = Rc::new(RefCell::new(0));
        let config = bounded_config(16, Rc::clone(&value_count), Rc::clone(&table_count));
        // A 20-byte string (too large), then the int 3.
        let mut bytes = vec![0x8E, 0x94];
        bytes.extend_from_slice(&[b'x'; 20]);
        bytes.extend_from_slice(&[0x21, 0x03]);
        let mut cursor =
            BinaryCursor::with_configuration(std::io::Cursor::new(stream(&bytes)), config);

        assert_eq!(cursor.next_value()?, NeedsInstruction);
        assert_eq!(*value_count.borrow(), 1);
        // Decoding resumes cleanly at the next value.
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 3);
        assert_eq!(*value_count.borrow(), 1);
        assert_eq!(*table_count.borrow(), 0);
        Ok(())
    }

    #[test]
    fn oversized_symbol_table_terminates_the_cursor() -> IonResult<()> {
        let value_count = Rc::new(RefCell::new(0));
        let table_count = Rc::new(RefCell::new(0));
        let config = bounded_config(16, Rc::clone(&value_count), Rc::clone(&table_count));
        // An LST whose struct is 21 bytes long: $ion_symbol_table::{symbols:["aaa...a"]}
        let mut bytes = vec![0xEE, 0x98, 0x81, 0x83, 0xDE, 0x94, 0x87, 0xBE, 0x91, 0x8E, 0x8F];
        bytes.extend_from_slice(&[b'a'; 15]);
        bytes.extend_from_slice(&[0x21, 0x03]);
        let mut cursor =
            BinaryCursor::with_configuration(std::io::Cursor::new(stream(&bytes)), config);

        assert_eq!(cursor.next_value()?, NeedsInstruction);
        assert_eq!(*table_count.borrow(), 1);
        // The cursor is permanently inert; the handler does not fire again.
        assert_eq!(cursor.next_value()?, NeedsInstruction);
        assert_eq!(cursor.fill_value()?, NeedsInstruction);
        assert_eq!(*table_count.borrow(), 1);
        assert_eq!(*value_count.borrow(), 0);
        Ok(())
    }
}
