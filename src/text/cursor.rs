use std::io::Read;
use std::ops::Range;

use delegate::delegate;
use smallvec::SmallVec;

use crate::cursor::{IonCursor, SpanProvider, StreamEvent};
use crate::position::Position;
use crate::result::unknown_symbol::UnknownSymbolError;
use crate::result::{
    decoding_error, decoding_error_at, decoding_error_raw, illegal_operation,
    illegal_operation_raw, incomplete_data_error, IonResult,
};
use crate::symbol::{Symbol, SymbolToken};
use crate::symtab::imports::install_declaration;
use crate::symtab::{Catalog, EmptyCatalog, LocalSymbolTable};
use crate::text::buffer::TextBuffer;
use crate::text::lexer::{
    annotation, field_name, raw_token, value_token, whitespace_or_comments, RawToken, ScalarToken,
    SymbolKind, Token,
};
use crate::text::lst::parse_local_symbol_table_text;
use crate::types::{IonType, SymbolId};

/// A container the cursor has stepped into, along with whether the next item at this depth
/// must be preceded by a separator.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TextParent {
    kind: IonType,
    needs_separator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TextState {
    /// Between values: expecting a field name, a value, or the enclosing container's
    /// closing delimiter.
    Ready,
    /// Positioned on a scalar whose lexeme has been consumed and materialized.
    OnScalar,
    /// Positioned on a container whose opening delimiter has been consumed.
    /// `filled_extent` is the byte length of its remaining body and closer, once known.
    OnContainer {
        kind: IonType,
        filled_extent: Option<usize>,
    },
    /// Consuming tokens to move past an unread container; `depth` counts the closing
    /// delimiters still owed.
    SkippingToClose { depth: usize },
    /// Consuming tokens to leave a container that has already been popped.
    SteppingOut { depth: usize },
    /// Scanning ahead (without consuming) to find the end of the current container.
    FillingContainer {
        kind: IonType,
        scanned: usize,
        depth: usize,
    },
    /// Positioned at the `{` of a `$ion_symbol_table` struct whose annotations have been
    /// consumed.
    OnSymbolTable,
    Closed,
}

// What one scan attempt over the buffered text found. Scanning is pure: nothing is
// consumed until the cursor applies an outcome, which is what makes attempts retryable.
enum ScanOutcome {
    NeedsData,
    /// Whitespace and any separator were recognized up to the enclosing container's
    /// closing delimiter. The delimiter itself is not consumed until step-out.
    EndContainer { consumed: usize },
    Ivm { consumed: usize },
    /// Consumed everything up to (but not including) the symbol table struct's `{`.
    SymbolTableStart { consumed: usize },
    Scalar {
        consumed: usize,
        token_start: usize,
        scalar: ScalarToken,
        field: Option<SymbolToken>,
        annotations: SmallVec<[SymbolToken; 2]>,
    },
    ContainerStart {
        consumed: usize,
        kind: IonType,
        field: Option<SymbolToken>,
        annotations: SmallVec<[SymbolToken; 2]>,
    },
}

/// An incremental cursor over a text Ion stream.
///
/// The cursor lexes values out of a growable UTF-8 buffer using streaming parsers: a token
/// that may extend beyond the buffered text reports [`StreamEvent::NeedsData`], and the
/// same operation is retried once more text is available. Because some tokens can only be
/// terminated by what follows them (a bare `true` could be the prefix of a longer symbol),
/// [`end_stream`](IonCursor::end_stream) is how the caller resolves the final token of a
/// stream; it may promote a pending token to [`StreamEvent::StartScalar`].
///
/// System constructs are handled internally, exactly as on the binary path: a top-level
/// `$ion_1_0` identifier resets the symbol table, and a `$ion_symbol_table::{...}` struct
/// is parsed, resolved against the catalog, and installed before further events are
/// surfaced.
///
/// The buffer-bound/oversize machinery of [`BufferConfiguration`](crate::BufferConfiguration)
/// applies only to the binary path; text has no length prefixes to skip by, so this
/// cursor's buffer simply grows as needed.
pub struct TextCursor<R: Read> {
    buffer: TextBuffer<R>,
    state: TextState,
    current_event: StreamEvent,
    parents: Vec<TextParent>,
    annotations: SmallVec<[SymbolToken; 2]>,
    current_scalar: Option<ScalarToken>,
    current_field: Option<SymbolToken>,
    current_span: Option<Range<usize>>,
    symbol_table: LocalSymbolTable,
    catalog: Box<dyn Catalog>,
    is_eos: bool,
}

impl<R: Read> TextCursor<R> {
    pub fn new(source: R) -> TextCursor<R> {
        Self::with_catalog(source, Box::new(EmptyCatalog))
    }

    pub fn with_catalog(source: R, catalog: Box<dyn Catalog>) -> TextCursor<R> {
        TextCursor {
            buffer: TextBuffer::new(source),
            state: TextState::Ready,
            current_event: StreamEvent::NeedsInstruction,
            parents: Vec::new(),
            annotations: SmallVec::new(),
            current_scalar: None,
            current_field: None,
            current_span: None,
            symbol_table: LocalSymbolTable::new(),
            catalog,
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

    /// The symbol table currently in effect.
    pub fn symbol_table(&self) -> &LocalSymbolTable {
        &self.symbol_table
    }

    /// The current value's annotations, in order of appearance.
    pub fn annotations(&self) -> &[SymbolToken] {
        &self.annotations
    }

    /// If the current value is a struct field, its field name.
    pub fn field_name(&self) -> Option<&SymbolToken> {
        self.current_field.as_ref()
    }

    /// The type of the container the cursor is currently traversing, if any.
    pub fn parent_type(&self) -> Option<IonType> {
        self.parents.last().map(|parent| parent.kind)
    }

    pub fn is_null(&self) -> bool {
        self.current_scalar
            .as_ref()
            .map(|scalar| scalar.is_null)
            .unwrap_or(false)
    }

    fn set_event(&mut self, event: StreamEvent) -> IonResult<StreamEvent> {
        self.current_event = event;
        Ok(event)
    }

    // Reports NeedsData, unless end_stream has already been called—in which case the
    // missing text can never arrive and the truncation is a fatal error.
    fn needs_data(&mut self, label: &'static str) -> IonResult<StreamEvent> {
        if self.is_eos {
            return incomplete_data_error(label, self.buffer.total_consumed());
        }
        self.set_event(StreamEvent::NeedsData)
    }

    fn refill(&mut self) -> IonResult<bool> {
        Ok(self.buffer.fill()? > 0)
    }

    fn clear_current_value(&mut self) {
        self.annotations.clear();
        self.current_scalar = None;
        self.current_field = None;
        self.current_span = None;
    }

    // A value has been surfaced at the current depth; the next item here must be preceded
    // by a separator (in lists and structs).
    fn mark_value_at_current_depth(&mut self) {
        if let Some(parent) = self.parents.last_mut() {
            parent.needs_separator = true;
        }
    }

    fn advance(&mut self) -> IonResult<StreamEvent> {
        use TextState::*;
        loop {
            match self.state {
                Closed => return illegal_operation("the cursor has been closed"),
                OnScalar => {
                    // The scalar's lexeme was consumed when it was surfaced; simply move on.
                    self.clear_current_value();
                    self.state = Ready;
                }
                OnContainer {
                    filled_extent: Some(extent),
                    ..
                } => {
                    self.buffer.consume(extent);
                    self.clear_current_value();
                    self.state = Ready;
                }
                OnContainer {
                    filled_extent: None,
                    ..
                }
                | FillingContainer { .. } => {
                    // Skip the unread container: its opener has been consumed, so one
                    // closing delimiter is owed.
                    self.clear_current_value();
                    self.state = SkippingToClose { depth: 1 };
                }
                SkippingToClose { depth } => {
                    match self.consume_to_close(depth)? {
                        None => self.state = Ready,
                        Some(remaining_depth) => {
                            self.state = SkippingToClose {
                                depth: remaining_depth,
                            };
                            return self.needs_data("the remainder of a container being skipped");
                        }
                    }
                }
                SteppingOut { depth } => {
                    match self.consume_to_close(depth)? {
                        None => self.state = Ready,
                        Some(remaining_depth) => {
                            self.state = SteppingOut {
                                depth: remaining_depth,
                            };
                            return self.needs_data("the remainder of a container");
                        }
                    }
                }
                OnSymbolTable => {
                    if let Some(event) = self.process_symbol_table()? {
                        return Ok(event);
                    }
                }
                Ready => {
                    if let Some(event) = self.scan_and_apply()? {
                        return Ok(event);
                    }
                }
            }
        }
    }

    // Consumes raw tokens until `depth` closing delimiters have been matched. Returns
    // `None` when done, or `Some(remaining)` if the source ran dry first.
    fn consume_to_close(&mut self, mut depth: usize) -> IonResult<Option<usize>> {
        loop {
            let step = {
                let text = self.buffer.remaining_text();
                match raw_token(text) {
                    Ok((rest, token)) => Some((text.len() - rest.len(), token)),
                    Err(nom::Err::Incomplete(_)) => None,
                    Err(_) => {
                        return decoding_error_at(
                            "encountered malformed data while skipping a value",
                            self.buffer.position(),
                        )
                    }
                }
            };
            match step {
                Some((consumed, token)) => {
                    self.buffer.consume(consumed);
                    match token {
                        RawToken::Open => depth += 1,
                        RawToken::Close => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(None);
                            }
                        }
                        RawToken::Other => {}
                    }
                }
                None => {
                    if !self.refill()? {
                        return Ok(Some(depth));
                    }
                }
            }
        }
    }

    // Parses the symbol table struct the cursor is positioned on, retrying from its `{`
    // until the whole declaration is buffered. Returns Some(event) if the caller must
    // surface an event first.
    fn process_symbol_table(&mut self) -> IonResult<Option<StreamEvent>> {
        loop {
            let parsed = parse_local_symbol_table_text(self.buffer.remaining_text())?;
            match parsed {
                Some((consumed, declaration)) => {
                    install_declaration(
                        &mut self.symbol_table,
                        declaration,
                        self.catalog.as_ref(),
                    )?;
                    self.buffer.consume(consumed);
                    self.state = TextState::Ready;
                    return Ok(None);
                }
                None => {
                    if !self.refill()? {
                        return Ok(Some(self.needs_data("a symbol table")?));
                    }
                }
            }
        }
    }

    // Runs one scan over the buffered text and applies the outcome. Returns Some(event)
    // to surface, or None when a system construct was consumed and scanning should resume.
    fn scan_and_apply(&mut self) -> IonResult<Option<StreamEvent>> {
        loop {
            match self.scan_next()? {
                ScanOutcome::NeedsData => {
                    if self.refill()? {
                        continue;
                    }
                    if self.is_eos {
                        if self.parents.is_empty()
                            && is_only_whitespace(self.buffer.remaining_text())
                        {
                            // A clean end of stream.
                            return Ok(Some(self.set_event(StreamEvent::NeedsData)?));
                        }
                        return incomplete_data_error(
                            "a value truncated by the end of the stream",
                            self.buffer.total_consumed(),
                        );
                    }
                    return Ok(Some(self.set_event(StreamEvent::NeedsData)?));
                }
                ScanOutcome::EndContainer { consumed } => {
                    self.buffer.consume(consumed);
                    return Ok(Some(self.set_event(StreamEvent::EndContainer)?));
                }
                ScanOutcome::Ivm { consumed } => {
                    self.buffer.consume(consumed);
                    self.symbol_table = LocalSymbolTable::new();
                    return Ok(None);
                }
                ScanOutcome::SymbolTableStart { consumed } => {
                    self.buffer.consume(consumed);
                    self.state = TextState::OnSymbolTable;
                    return Ok(None);
                }
                ScanOutcome::Scalar {
                    consumed,
                    token_start,
                    scalar,
                    field,
                    annotations,
                } => {
                    let span_start = self.buffer.total_consumed() + token_start;
                    let span_end = self.buffer.total_consumed() + consumed;
                    self.buffer.consume(consumed);
                    self.current_scalar = Some(scalar);
                    self.current_field = field;
                    self.annotations = annotations;
                    self.current_span = Some(span_start..span_end);
                    self.state = TextState::OnScalar;
                    self.mark_value_at_current_depth();
                    return Ok(Some(self.set_event(StreamEvent::StartScalar)?));
                }
                ScanOutcome::ContainerStart {
                    consumed,
                    kind,
                    field,
                    annotations,
                } => {
                    self.buffer.consume(consumed);
                    self.current_scalar = None;
                    self.current_field = field;
                    self.annotations = annotations;
                    self.current_span = None;
                    self.state = TextState::OnContainer {
                        kind,
                        filled_extent: None,
                    };
                    self.mark_value_at_current_depth();
                    return Ok(Some(self.set_event(StreamEvent::StartContainer)?));
                }
            }
        }
    }

    // One pure scan over the buffered text: whitespace, separator, field name,
    // annotations, then a value token. Consumes nothing.
    fn scan_next(&self) -> IonResult<ScanOutcome> {
        let text = self.buffer.remaining_text();
        let parent = self.parents.last();
        let in_struct = parent.map(|p| p.kind) == Some(IonType::Struct);
        let in_sexp = parent.map(|p| p.kind) == Some(IonType::SExp);
        let needs_separator = parent.map(|p| p.needs_separator).unwrap_or(false);

        let mut remaining = match lex(whitespace_or_comments(text))? {
            Some((rest, _)) => rest,
            None => return Ok(ScanOutcome::NeedsData),
        };

        if let Some(parent) = parent {
            let closer = closing_delimiter(parent.kind);
            if remaining.starts_with(closer) {
                return Ok(ScanOutcome::EndContainer {
                    consumed: text.len() - remaining.len(),
                });
            }
            // Lists and structs separate their values with commas; s-expressions do not.
            if needs_separator && parent.kind != IonType::SExp {
                if !remaining.starts_with(',') {
                    return decoding_error_at(
                        format!("expected a ',' or '{closer}' between values"),
                        self.buffer.total_consumed() + (text.len() - remaining.len()),
                    );
                }
                remaining = &remaining[1..];
                remaining = match lex(whitespace_or_comments(remaining))? {
                    Some((rest, _)) => rest,
                    None => return Ok(ScanOutcome::NeedsData),
                };
                // A trailing comma before the closing delimiter is legal.
                if remaining.starts_with(closer) {
                    return Ok(ScanOutcome::EndContainer {
                        consumed: text.len() - remaining.len(),
                    });
                }
            }
        }

        let field = if in_struct {
            let (rest, token) = match lex_expecting(field_name(remaining), "a field name")? {
                Some(found) => found,
                None => return Ok(ScanOutcome::NeedsData),
            };
            remaining = match lex(whitespace_or_comments(rest))? {
                Some((rest, _)) => rest,
                None => return Ok(ScanOutcome::NeedsData),
            };
            Some(token)
        } else {
            None
        };

        let mut annotations: SmallVec<[SymbolToken; 2]> = SmallVec::new();
        loop {
            match annotation(remaining) {
                Ok((rest, (token, _kind))) => {
                    annotations.push(token);
                    remaining = match lex(whitespace_or_comments(rest))? {
                        Some((rest, _)) => rest,
                        None => return Ok(ScanOutcome::NeedsData),
                    };
                }
                // The probe for a `::` is inconclusive with the text buffered so far. Once
                // the stream has ended the `::` can never arrive, so what was found is a
                // value, not an annotation.
                Err(nom::Err::Incomplete(_)) if !self.is_eos => {
                    return Ok(ScanOutcome::NeedsData)
                }
                Err(_) => break,
            }
        }

        let token_start = text.len() - remaining.len();
        let (rest, token) =
            match lex_expecting(value_token(remaining, in_sexp, self.is_eos), "a value")? {
                Some(found) => found,
                None => return Ok(ScanOutcome::NeedsData),
            };
        let consumed = text.len() - rest.len();

        // System constructs only occur unadorned at the top level.
        if self.parents.is_empty() && field.is_none() {
            if annotations.is_empty() {
                if let Token::Scalar(scalar) = &token {
                    if scalar.symbol.as_ref().map(|(_, kind)| *kind) == Some(SymbolKind::Identifier)
                        && scalar.text == "$ion_1_0"
                    {
                        return Ok(ScanOutcome::Ivm { consumed });
                    }
                }
            } else if token == Token::StructStart {
                let first = &annotations[0];
                if first.text() == Some("$ion_symbol_table") || first.sid() == Some(3) {
                    return Ok(ScanOutcome::SymbolTableStart {
                        consumed: token_start,
                    });
                }
            }
        }

        let outcome = match token {
            Token::Scalar(scalar) => ScanOutcome::Scalar {
                consumed,
                token_start,
                scalar,
                field,
                annotations,
            },
            Token::StructStart => ScanOutcome::ContainerStart {
                consumed,
                kind: IonType::Struct,
                field,
                annotations,
            },
            Token::ListStart => ScanOutcome::ContainerStart {
                consumed,
                kind: IonType::List,
                field,
                annotations,
            },
            Token::SExpStart => ScanOutcome::ContainerStart {
                consumed,
                kind: IonType::SExp,
                field,
                annotations,
            },
        };
        Ok(outcome)
    }

    fn scalar(&self) -> IonResult<&ScalarToken> {
        match self.state {
            TextState::OnScalar => Ok(self.current_scalar.as_ref().unwrap()),
            _ => illegal_operation("the cursor is not positioned on a scalar value"),
        }
    }

    fn typed_scalar(&self, expected: IonType) -> IonResult<&ScalarToken> {
        let scalar = self.scalar()?;
        if scalar.ion_type != expected {
            return illegal_operation(format!(
                "type mismatch: expected a(n) {} but positioned over a(n) {}",
                expected, scalar.ion_type
            ));
        }
        if scalar.is_null {
            return illegal_operation(format!("cannot read a null value as a(n) {expected}"));
        }
        Ok(scalar)
    }

    /// If the cursor is positioned on a boolean, returns its value.
    pub fn read_bool(&mut self) -> IonResult<bool> {
        Ok(self.typed_scalar(IonType::Bool)?.text == "true")
    }

    /// If the cursor is positioned on an integer that fits in an `i64`, returns it.
    pub fn read_i64(&mut self) -> IonResult<i64> {
        let lexeme = self.typed_scalar(IonType::Int)?.text.as_str();
        let digits: String = lexeme.chars().filter(|c| *c != '_').collect();
        let (sign, magnitude) = match digits.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, digits.as_str()),
        };
        let parsed = if let Some(hex) = magnitude
            .strip_prefix("0x")
            .or_else(|| magnitude.strip_prefix("0X"))
        {
            i64::from_str_radix(hex, 16)
        } else if let Some(bin) = magnitude
            .strip_prefix("0b")
            .or_else(|| magnitude.strip_prefix("0B"))
        {
            i64::from_str_radix(bin, 2)
        } else {
            magnitude.parse::<i64>()
        };
        parsed
            .map(|value| sign * value)
            .map_err(|_| decoding_error_raw("integer was too large to fit in an i64"))
    }

    /// If the cursor is positioned on a float, returns its value.
    pub fn read_f64(&mut self) -> IonResult<f64> {
        let lexeme = self.typed_scalar(IonType::Float)?.text.as_str();
        match lexeme {
            "nan" => Ok(f64::NAN),
            "+inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            _ => lexeme
                .replace('_', "")
                .parse::<f64>()
                .map_err(|_| decoding_error_raw("encountered an unreadable float")),
        }
    }

    /// If the cursor is positioned on a string, returns its (unescaped) text.
    pub fn read_str(&mut self) -> IonResult<&str> {
        Ok(self.typed_scalar(IonType::String)?.text.as_str())
    }

    /// If the cursor is positioned on a symbol value, returns it as a [SymbolToken]:
    /// text for identifiers and quoted symbols, a symbol ID for `$n` literals.
    pub fn read_symbol_token(&mut self) -> IonResult<SymbolToken> {
        let scalar = self.typed_scalar(IonType::Symbol)?;
        let (token, _kind) = scalar
            .symbol
            .as_ref()
            .ok_or_else(|| illegal_operation_raw("the current symbol has no token"))?;
        Ok(token.clone())
    }

    /// If the cursor is positioned on a symbol value, resolves it to a [Symbol] with
    /// known text, consulting the symbol table for `$n` literals.
    pub fn read_symbol(&mut self) -> IonResult<Symbol> {
        let token = self.read_symbol_token()?;
        match (token.text(), token.sid()) {
            (Some(text), _) => Ok(Symbol::owned(text)),
            (None, Some(sid)) => self.resolve_symbol(sid),
            (None, None) => unreachable!("symbol tokens always have text or a sid"),
        }
    }

    /// Resolves a symbol ID against the table currently in effect.
    pub fn resolve_symbol(&self, sid: SymbolId) -> IonResult<Symbol> {
        self.symbol_table
            .find_known_symbol(sid)
            .ok_or_else(|| UnknownSymbolError::undefined(sid).into())
    }

    /// The raw text of the current scalar: the decoded content for strings and symbols,
    /// the lexeme for everything else.
    pub fn raw_value_text(&self) -> Option<&str> {
        match self.state {
            TextState::OnScalar => self
                .current_scalar
                .as_ref()
                .map(|scalar| scalar.text.as_str()),
            _ => None,
        }
    }
}

impl<R: Read> IonCursor for TextCursor<R> {
    fn next_value(&mut self) -> IonResult<StreamEvent> {
        self.advance()
    }

    fn step_into_container(&mut self) -> IonResult<StreamEvent> {
        use TextState::*;
        let kind = match self.state {
            Closed => return illegal_operation("the cursor has been closed"),
            OnContainer { kind, .. } => kind,
            _ => {
                return illegal_operation(
                    "cannot step in; the cursor is not positioned over a container",
                )
            }
        };
        self.parents.push(TextParent {
            kind,
            needs_separator: false,
        });
        self.clear_current_value();
        self.state = Ready;
        self.set_event(StreamEvent::NeedsInstruction)
    }

    fn step_out_of_container(&mut self) -> IonResult<StreamEvent> {
        use TextState::*;
        let extra_closers_owed = match self.state {
            Closed => return illegal_operation("the cursor has been closed"),
            // A previous step-out is still consuming tokens; finish it.
            SteppingOut { depth } => {
                return match self.consume_to_close(depth)? {
                    None => {
                        self.state = Ready;
                        self.set_event(StreamEvent::NeedsInstruction)
                    }
                    Some(remaining_depth) => {
                        self.state = SteppingOut {
                            depth: remaining_depth,
                        };
                        self.needs_data("the remainder of a container")
                    }
                };
            }
            // The value being abandoned may itself be a partially-read container.
            OnContainer {
                filled_extent: Some(extent),
                ..
            } => {
                self.buffer.consume(extent);
                0
            }
            OnContainer {
                filled_extent: None,
                ..
            }
            | FillingContainer { .. } => 1,
            SkippingToClose { depth } => depth,
            _ => 0,
        };
        if self.parents.pop().is_none() {
            return illegal_operation("cannot step out at the top level (depth=0)");
        }
        self.clear_current_value();
        match self.consume_to_close(1 + extra_closers_owed)? {
            None => {
                self.state = Ready;
                self.set_event(StreamEvent::NeedsInstruction)
            }
            Some(remaining_depth) => {
                self.state = SteppingOut {
                    depth: remaining_depth,
                };
                self.needs_data("the remainder of a container")
            }
        }
    }

    fn fill_value(&mut self) -> IonResult<StreamEvent> {
        use TextState::*;
        let (kind, mut scanned, mut depth) = match self.state {
            Closed => return illegal_operation("the cursor has been closed"),
            OnScalar => return self.set_event(StreamEvent::ValueReady),
            OnContainer {
                filled_extent: Some(_),
                ..
            } => return self.set_event(StreamEvent::ValueReady),
            OnContainer {
                kind,
                filled_extent: None,
            } => (kind, 0, 1),
            FillingContainer {
                kind,
                scanned,
                depth,
            } => (kind, scanned, depth),
            _ => {
                return illegal_operation(
                    "fill_value requires the cursor to be positioned on a value",
                )
            }
        };
        // Scan ahead without consuming until the container's closing delimiter is found.
        loop {
            let step = {
                let text = &self.buffer.remaining_text()[scanned..];
                match raw_token(text) {
                    Ok((rest, token)) => Some((text.len() - rest.len(), token)),
                    Err(nom::Err::Incomplete(_)) => None,
                    Err(_) => {
                        return decoding_error_at(
                            "encountered malformed data in a container",
                            self.buffer.position(),
                        )
                    }
                }
            };
            match step {
                Some((consumed, token)) => {
                    scanned += consumed;
                    match token {
                        RawToken::Open => depth += 1,
                        RawToken::Close => {
                            depth -= 1;
                            if depth == 0 {
                                self.state = OnContainer {
                                    kind,
                                    filled_extent: Some(scanned),
                                };
                                return self.set_event(StreamEvent::ValueReady);
                            }
                        }
                        RawToken::Other => {}
                    }
                }
                None => {
                    if !self.refill()? {
                        self.state = FillingContainer {
                            kind,
                            scanned,
                            depth,
                        };
                        return self.needs_data("the body of a container");
                    }
                }
            }
        }
    }

    fn end_stream(&mut self) -> IonResult<StreamEvent> {
        use TextState::*;
        if self.state == Closed {
            return illegal_operation("the cursor has been closed");
        }
        if !self.parents.is_empty() {
            return illegal_operation("end_stream cannot be called below the top level");
        }
        self.is_eos = true;
        if self.buffer.has_incomplete_utf8() {
            return incomplete_data_error(
                "a multi-byte UTF-8 sequence truncated by the end of the stream",
                self.buffer.total_consumed(),
            );
        }
        self.buffer.append_end_of_stream_padding();
        self.buffer.release_source();
        match self.state {
            // A value the cursor is already parked on is unaffected. (If an unfilled
            // container turns out to be truncated, traversal discovers that.)
            OnScalar | OnContainer { .. } => Ok(self.current_event),
            // Everything else makes one more attempt at the buffered text. This is where a
            // pending token (`true`, a number, a timestamp) that was lexically ambiguous
            // becomes complete and is promoted to its event; text that still cannot be
            // completed is a truncation fault.
            _ => self.advance(),
        }
    }

    fn current_event(&self) -> StreamEvent {
        self.current_event
    }

    fn depth(&self) -> usize {
        self.parents.len()
    }

    fn ion_type(&self) -> Option<IonType> {
        match self.state {
            TextState::OnScalar => self.current_scalar.as_ref().map(|scalar| scalar.ion_type),
            TextState::OnContainer { kind, .. } => Some(kind),
            TextState::FillingContainer { kind, .. } => Some(kind),
            _ => None,
        }
    }

    fn close(&mut self) -> IonResult<()> {
        self.buffer.release_source();
        self.state = TextState::Closed;
        Ok(())
    }

    fn span_provider(&self) -> Option<&dyn SpanProvider> {
        Some(self)
    }
}

impl<R: Read> SpanProvider for TextCursor<R> {
    fn value_span(&self) -> Option<Range<usize>> {
        self.current_span.clone()
    }

    fn position(&self) -> Position {
        self.buffer.position()
    }
}

fn closing_delimiter(kind: IonType) -> char {
    match kind {
        IonType::Struct => '}',
        IonType::List => ']',
        IonType::SExp => ')',
        _ => unreachable!("only containers are pushed onto the parent stack"),
    }
}

// Maps a streaming parse result into "found", "need more data" (Incomplete), or a
// decoding fault.
fn lex<T>(result: nom::IResult<&str, T>) -> IonResult<Option<(&str, T)>> {
    match result {
        Ok((rest, value)) => Ok(Some((rest, value))),
        Err(nom::Err::Incomplete(_)) => Ok(None),
        Err(_) => decoding_error("encountered malformed text"),
    }
}

fn lex_expecting<'a, T>(
    result: nom::IResult<&'a str, T>,
    label: &str,
) -> IonResult<Option<(&'a str, T)>> {
    match result {
        Ok((rest, value)) => Ok(Some((rest, value))),
        Err(nom::Err::Incomplete(_)) => Ok(None),
        Err(_) => decoding_error(format!("expected {label}")),
    }
}

// Returns true if `text` contains only whitespace and comments. Used to tell a clean end
// of stream from a truncated value once `end_stream` has been called.
fn is_only_whitespace(mut text: &str) -> bool {
    loop {
        text = text.trim_start_matches(|c: char| " \t\r\n\x0B\x0C".contains(c));
        if text.is_empty() {
            return true;
        }
        if let Some(rest) = text.strip_prefix("//") {
            match rest.find('\n') {
                Some(index) => text = &rest[index + 1..],
                None => return true,
            }
        } else if let Some(rest) = text.strip_prefix("/*") {
            match rest.find("*/") {
                Some(index) => text = &rest[index + 2..],
                // An unterminated block comment is not "only whitespace".
                None => return false,
            }
        } else {
            return false;
        }
    }
}

#[cfg(test)]
mod text_cursor_tests {
    use super::*;
    use crate::cursor::StreamEvent::*;
    use crate::IonError;

    fn cursor_over(text: &str) -> TextCursor<std::io::Cursor<Vec<u8>>> {
        TextCursor::new(std::io::Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn read_top_level_scalars() -> IonResult<()> {
        let mut cursor = cursor_over("1 2.5e0 \"three\" four ");
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 1);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_f64()?, 2.5);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_str()?, "three");
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_symbol()?.text(), Some("four"));
        assert_eq!(cursor.next_value()?, NeedsData);
        Ok(())
    }

    #[test]
    fn traverse_containers() -> IonResult<()> {
        let mut cursor = cursor_over("{a: [1, 2], b: (c + 1)} true ");
        assert_eq!(cursor.next_value()?, StartContainer);
        assert_eq!(cursor.ion_type(), Some(IonType::Struct));
        cursor.step_into_container()?;
        assert_eq!(cursor.next_value()?, StartContainer);
        assert_eq!(cursor.field_name().unwrap().text(), Some("a"));
        assert_eq!(cursor.ion_type(), Some(IonType::List));
        cursor.step_into_container()?;
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 1);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 2);
        assert_eq!(cursor.next_value()?, EndContainer);
        cursor.step_out_of_container()?;
        assert_eq!(cursor.next_value()?, StartContainer);
        assert_eq!(cursor.field_name().unwrap().text(), Some("b"));
        assert_eq!(cursor.ion_type(), Some(IonType::SExp));
        // Skip the s-expression without stepping in.
        assert_eq!(cursor.next_value()?, EndContainer);
        cursor.step_out_of_container()?;
        assert_eq!(cursor.depth(), 0);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert!(cursor.read_bool()?);
        Ok(())
    }

    #[test]
    fn annotations_and_field_names() -> IonResult<()> {
        let mut cursor = cursor_over("{x: a::b::5} ");
        cursor.next_value()?;
        cursor.step_into_container()?;
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.field_name().unwrap().text(), Some("x"));
        let annotations: Vec<_> = cursor
            .annotations()
            .iter()
            .map(|a| a.text().unwrap().to_string())
            .collect();
        assert_eq!(annotations, vec!["a", "b"]);
        assert_eq!(cursor.read_i64()?, 5);
        Ok(())
    }

    #[test]
    fn end_stream_promotes_a_pending_token() -> IonResult<()> {
        let mut cursor = cursor_over("true");
        // `true` could be the prefix of a longer symbol; the cursor cannot classify it yet.
        assert_eq!(cursor.next_value()?, NeedsData);
        // Declaring the end of the stream resolves the ambiguity.
        assert_eq!(cursor.end_stream()?, StartScalar);
        assert!(cursor.read_bool()?);
        Ok(())
    }

    #[test]
    fn end_stream_promotes_a_pending_symbol() -> IonResult<()> {
        // `waffle` could be the prefix of a longer symbol, or annotate a following value.
        let mut cursor = cursor_over("waffle");
        assert_eq!(cursor.next_value()?, NeedsData);
        assert_eq!(cursor.end_stream()?, StartScalar);
        assert_eq!(cursor.read_symbol()?.text(), Some("waffle"));
        Ok(())
    }

    #[test]
    fn end_stream_promotes_a_pending_long_string() -> IonResult<()> {
        // Another `'''…'''` segment could follow; only the end of the stream rules it out.
        let mut cursor = cursor_over("'''seg1''' '''seg2'''");
        assert_eq!(cursor.next_value()?, NeedsData);
        assert_eq!(cursor.end_stream()?, StartScalar);
        assert_eq!(cursor.read_str()?, "seg1seg2");
        Ok(())
    }

    #[test]
    fn end_stream_with_unterminated_string_is_a_fault() -> IonResult<()> {
        let mut cursor = cursor_over("\"abc");
        assert_eq!(cursor.next_value()?, NeedsData);
        match cursor.end_stream() {
            Err(IonError::Incomplete(_)) => Ok(()),
            other => panic!("expected an incomplete error, found {other:?}"),
        }
    }

    #[test]
    fn end_stream_with_truncated_utf8_is_a_fault() -> IonResult<()> {
        // The final byte begins a two-byte UTF-8 sequence that never completes.
        let mut cursor = TextCursor::new(std::io::Cursor::new(vec![b'5', b' ', 0xC3]));
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 5);
        assert_eq!(cursor.next_value()?, NeedsData);
        match cursor.end_stream() {
            Err(IonError::Incomplete(_)) => Ok(()),
            other => panic!("expected an incomplete error, found {other:?}"),
        }
    }

    #[test]
    fn end_stream_at_a_clean_boundary() -> IonResult<()> {
        let mut cursor = cursor_over("5 // trailing comment");
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 5);
        assert_eq!(cursor.next_value()?, NeedsData);
        assert_eq!(cursor.end_stream()?, NeedsData);
        Ok(())
    }

    #[test]
    fn ivm_resets_the_symbol_table() -> IonResult<()> {
        let mut cursor = cursor_over(
            "$ion_symbol_table::{symbols: [\"hello\"]} $10 $ion_1_0 $10 ",
        );
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
    fn symbol_tables_support_appends() -> IonResult<()> {
        let mut cursor = cursor_over(
            "$ion_symbol_table::{symbols: [\"a\"]} \
             $ion_symbol_table::{imports: $ion_symbol_table, symbols: [\"b\"]} \
             $10 $11 ",
        );
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_symbol()?.text(), Some("a"));
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_symbol()?.text(), Some("b"));
        Ok(())
    }

    #[test]
    fn fill_value_reports_container_extents() -> IonResult<()> {
        let mut cursor = cursor_over("[1, [2, 3], \"]\"] 7 ");
        assert_eq!(cursor.next_value()?, StartContainer);
        assert_eq!(cursor.fill_value()?, ValueReady);
        // The cursor can still move past the filled container correctly.
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 7);
        Ok(())
    }

    #[test]
    fn missing_separators_are_a_fault() {
        let mut cursor = cursor_over("[1 2] ");
        cursor.next_value().unwrap();
        cursor.step_into_container().unwrap();
        cursor.next_value().unwrap();
        assert!(matches!(
            cursor.next_value(),
            Err(IonError::Decoding(_))
        ));
    }

    #[test]
    fn step_out_at_top_level_is_a_fault() {
        let mut cursor = cursor_over("5 ");
        assert!(matches!(
            cursor.step_out_of_container(),
            Err(IonError::IllegalOperation(_))
        ));
    }

    #[test]
    fn comments_are_transparent() -> IonResult<()> {
        let mut cursor = cursor_over("/* a */ 1 // b\n 2 ");
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 1);
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.read_i64()?, 2);
        Ok(())
    }

    #[test]
    fn null_values_are_scalars() -> IonResult<()> {
        let mut cursor = cursor_over("null.list null ");
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.ion_type(), Some(IonType::List));
        assert!(cursor.is_null());
        assert_eq!(cursor.next_value()?, StartScalar);
        assert_eq!(cursor.ion_type(), Some(IonType::Null));
        Ok(())
    }
}
