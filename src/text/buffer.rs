use std::io::Read;

use crate::position::Position;
use crate::result::{decoding_error, IonResult};

// Bytes are pulled from the source in chunks of this size.
const READ_CHUNK_SIZE: usize = 4 * 1024;
// Consumed text is drained from the front of the buffer once it exceeds this size.
const COMPACTION_THRESHOLD: usize = 8 * 1024;

/// A growable lookahead buffer of validated UTF-8 text over a byte source.
///
/// Like the binary [`LookaheadBuffer`](crate::binary::lookahead::LookaheadBuffer), a source
/// `read` that returns zero bytes means "no data available right now"; end of stream is
/// declared out of band. Unlike the binary buffer, text has no length prefixes to skip by,
/// so the buffer-bound/oversize machinery does not apply here and the buffer simply grows
/// as needed.
///
/// Bytes that arrive mid-way through a multi-byte UTF-8 sequence are held back until the
/// rest of the sequence arrives; genuinely invalid UTF-8 is a decoding fault.
pub(crate) struct TextBuffer<R: Read> {
    source: Option<R>,
    // Validated text. The bytes before `start` have been consumed.
    text: String,
    start: usize,
    // Bytes read from the source that are not yet known to be valid UTF-8.
    pending: Vec<u8>,
    // The absolute stream offset of the byte at `start`.
    total_consumed: usize,
    // 1-based line and column of the next unconsumed character.
    line_number: usize,
    column: usize,
    padding_appended: bool,
}

impl<R: Read> TextBuffer<R> {
    pub fn new(source: R) -> TextBuffer<R> {
        TextBuffer {
            source: Some(source),
            text: String::new(),
            start: 0,
            pending: Vec::new(),
            total_consumed: 0,
            line_number: 1,
            column: 1,
            padding_appended: false,
        }
    }

    /// The unconsumed text currently available for lexing.
    pub fn remaining_text(&self) -> &str {
        &self.text[self.start..]
    }

    pub fn total_consumed(&self) -> usize {
        self.total_consumed
    }

    pub fn position(&self) -> Position {
        Position::with_offset(self.total_consumed)
            .with_line_and_column(self.line_number, self.column)
    }

    /// Marks `num_bytes` of the remaining text as read, updating line/column tracking.
    /// `num_bytes` must land on a character boundary (it always does when it comes from a
    /// lexer that consumed a prefix of [`remaining_text`](Self::remaining_text)).
    pub fn consume(&mut self, num_bytes: usize) {
        debug_assert!(self.text.is_char_boundary(self.start + num_bytes));
        for character in self.text[self.start..self.start + num_bytes].chars() {
            if character == '\n' {
                self.line_number += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.start += num_bytes;
        self.total_consumed += num_bytes;
        if self.start > COMPACTION_THRESHOLD {
            self.text.drain(..self.start);
            self.start = 0;
        }
    }

    /// Pulls one chunk of bytes from the source, validating them as UTF-8. Returns the
    /// number of new text bytes made available.
    pub fn fill(&mut self) -> IonResult<usize> {
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return Ok(0),
        };
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let bytes_read = source.read(&mut chunk)?;
        if bytes_read == 0 {
            return Ok(0);
        }
        self.pending.extend_from_slice(&chunk[..bytes_read]);
        self.validate_pending()
    }

    // Moves the longest valid UTF-8 prefix of `pending` into `text`. A truncated multi-byte
    // sequence at the tail is retained for the next fill; anything else non-UTF-8 is a
    // decoding fault.
    fn validate_pending(&mut self) -> IonResult<usize> {
        let (valid_up_to, invalid) = match std::str::from_utf8(&self.pending) {
            Ok(_) => (self.pending.len(), false),
            Err(error) => (error.valid_up_to(), error.error_len().is_some()),
        };
        if invalid {
            let offset = self.total_consumed + (self.text.len() - self.start) + valid_up_to;
            return decoding_error(format!(
                "encountered invalid UTF-8 in the input stream at byte offset {offset}"
            ));
        }
        // The prefix was validated above.
        let valid = std::str::from_utf8(&self.pending[..valid_up_to]).unwrap();
        self.text.push_str(valid);
        self.pending.drain(..valid_up_to);
        Ok(valid_up_to)
    }

    /// Appends a single newline so that tokens which can only be terminated by a stop
    /// character (a bare `true`, a number, a timestamp) become lexically complete at the
    /// end of the stream. Whitespace between top-level values carries no meaning, so the
    /// padding never changes the value sequence. Idempotent.
    pub fn append_end_of_stream_padding(&mut self) {
        if !self.padding_appended {
            self.text.push('\n');
            self.padding_appended = true;
        }
    }

    /// Returns `true` if bytes pulled from the source are still waiting for the rest of a
    /// multi-byte UTF-8 sequence. Once the stream has ended, this means its final
    /// character was truncated.
    pub fn has_incomplete_utf8(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Releases the input source.
    pub fn release_source(&mut self) {
        self.source = None;
    }
}

#[cfg(test)]
mod text_buffer_tests {
    use super::*;

    #[test]
    fn consume_tracks_lines_and_columns() -> IonResult<()> {
        let mut buffer = TextBuffer::new(std::io::Cursor::new("abc\ndef".as_bytes().to_vec()));
        while buffer.fill()? > 0 {}
        assert_eq!(buffer.remaining_text(), "abc\ndef");
        buffer.consume(5);
        assert_eq!(buffer.remaining_text(), "ef");
        let position = buffer.position();
        assert_eq!(position.byte_offset(), 5);
        assert_eq!(position.line_and_column(), Some((2, 2)));
        Ok(())
    }

    #[test]
    fn partial_utf8_sequences_are_held_back() -> IonResult<()> {
        // '√©' is 0xC3 0xA9; split the sequence across two reads.
        let bytes: Vec<u8> = vec![b'a', 0xC3];
        let mut buffer = TextBuffer::new(std::io::Cursor::new(bytes));
        while buffer.fill()? > 0 {}
        assert_eq!(buffer.remaining_text(), "a");
        Ok(())
    }

    #[test]
    fn invalid_utf8_is_a_decoding_fault() {
        let bytes: Vec<u8> = vec![b'a', 0xFF, b'b'];
        let mut buffer = TextBuffer::new(std::io::Cursor::new(bytes));
        let mut result = Ok(0);
        for _ in 0..4 {
            result = buffer.fill();
            if result.is_err() {
                break;
            }
        }
        assert!(result.is_err());
    }

    #[test]
    fn end_of_stream_padding_is_idempotent() -> IonResult<()> {
        let mut buffer = TextBuffer::new(std::io::Cursor::new("5".as_bytes().to_vec()));
        while buffer.fill()? > 0 {}
        buffer.append_end_of_stream_padding();
        buffer.append_end_of_stream_padding();
        assert_eq!(buffer.remaining_text(), "5\n");
        Ok(())
    }
}
