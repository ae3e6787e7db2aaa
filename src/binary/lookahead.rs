use std::io::Read;

use crate::binary::buffer::BinaryBuffer;
use crate::config::BufferConfiguration;
use crate::position::Position;
use crate::result::IonResult;

/// The outcome of asking the buffer to make a span of bytes available.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub(crate) enum FillOutcome {
    /// The requested number of bytes is buffered and ready to read.
    Filled,
    /// The input source had no data available; the caller should retry once it does.
    NeedsData,
    /// The requested span can never fit within the configured maximum buffer size.
    /// Nothing was consumed; the caller decides whether to discard or to fault.
    Oversized,
}

/// A growable, bounded lookahead buffer over an input source.
///
/// The buffer pulls bytes from the source on demand, growing (by doubling) from the
/// configured initial size up to the configured maximum and never shrinking within a
/// session. A source `read` that returns zero bytes is interpreted as "no data available
/// right now", not end of stream—true end of stream is declared out of band via the
/// cursor's `end_stream` operation.
///
/// Every byte the buffer ingests is reported to the configuration's data handler exactly
/// once, whether the byte is ultimately parsed or discarded. This gives callers an exact
/// account of stream progress that is independent of parse outcomes.
pub(crate) struct LookaheadBuffer<R: Read> {
    source: Option<R>,
    config: BufferConfiguration,
    // Storage. Bytes in `start..end` are valid and unread; `data.len()` is the high-water
    // allocation, zero-filled beyond `end` so it can serve as read capacity.
    data: Vec<u8>,
    start: usize,
    end: usize,
    // The absolute stream offset of the byte at `start`.
    total_consumed: usize,
}

impl<R: Read> LookaheadBuffer<R> {
    pub fn new(source: R, config: BufferConfiguration) -> LookaheadBuffer<R> {
        LookaheadBuffer {
            source: Some(source),
            config,
            data: Vec::new(),
            start: 0,
            end: 0,
            total_consumed: 0,
        }
    }

    /// Returns the number of unread bytes currently buffered.
    pub fn remaining(&self) -> usize {
        self.end - self.start
    }

    /// The absolute stream offset of the next unread byte.
    pub fn total_consumed(&self) -> usize {
        self.total_consumed
    }

    pub fn position(&self) -> Position {
        Position::with_offset(self.total_consumed)
    }

    pub fn config_mut(&mut self) -> &mut BufferConfiguration {
        &mut self.config
    }

    /// Creates a disposable parsing view over the buffered bytes. The view tracks its own
    /// consumption; the underlying buffer is unaffected until [`consume`](Self::consume)
    /// is called.
    pub fn view(&self) -> BinaryBuffer<&[u8]> {
        BinaryBuffer::new_at_offset(&self.data[self.start..self.end], self.total_consumed)
    }

    /// Creates a parsing view over `length` buffered bytes beginning at the stream-absolute
    /// offset `absolute_start`. The caller must have confirmed that the requested range is
    /// buffered (it lies between the current position and the end of the buffer).
    pub fn view_range(&self, absolute_start: usize, length: usize) -> BinaryBuffer<&[u8]> {
        debug_assert!(absolute_start >= self.total_consumed);
        let from = self.start + (absolute_start - self.total_consumed);
        BinaryBuffer::new_at_offset(&self.data[from..from + length], absolute_start)
    }

    /// Returns `length` buffered bytes beginning at the stream-absolute offset
    /// `absolute_start`. The caller must have confirmed that the range is buffered.
    pub fn bytes_range(&self, absolute_start: usize, length: usize) -> &[u8] {
        debug_assert!(absolute_start >= self.total_consumed);
        let from = self.start + (absolute_start - self.total_consumed);
        &self.data[from..from + length]
    }

    /// Marks `num_bytes` buffered bytes as read.
    pub fn consume(&mut self, num_bytes: usize) {
        debug_assert!(num_bytes <= self.remaining());
        self.start += num_bytes;
        self.total_consumed += num_bytes;
    }

    /// Releases the input source. Subsequent fills report `NeedsData` for any bytes that
    /// are not already buffered.
    pub fn release_source(&mut self) {
        self.source = None;
    }

    /// Makes at least `required` unread bytes available in the buffer, pulling from the
    /// source as needed. See [`FillOutcome`] for the possible results.
    pub fn fill_to(&mut self, required: usize) -> IonResult<FillOutcome> {
        if self.remaining() >= required {
            return Ok(FillOutcome::Filled);
        }
        if let Some(maximum) = self.config.maximum_buffer_size() {
            if required > maximum {
                return Ok(FillOutcome::Oversized);
            }
        }
        loop {
            self.make_room(required);
            let source = match self.source.as_mut() {
                Some(source) => source,
                None => return Ok(FillOutcome::NeedsData),
            };
            let bytes_read = source.read(&mut self.data[self.end..])?;
            if bytes_read == 0 {
                return Ok(FillOutcome::NeedsData);
            }
            self.end += bytes_read;
            self.config.notify_data(bytes_read)?;
            if self.remaining() >= required {
                return Ok(FillOutcome::Filled);
            }
        }
    }

    /// Discards up to `num_bytes` bytes from the stream without retaining them: buffered
    /// bytes are consumed, and any shortfall is drained directly from the source. Returns
    /// the number of bytes actually discarded; a short count means the source ran dry and
    /// the caller should retry with the balance once more data is available.
    pub fn discard(&mut self, num_bytes: usize) -> IonResult<usize> {
        let from_buffer = num_bytes.min(self.remaining());
        self.consume(from_buffer);
        let mut discarded = from_buffer;
        while discarded < num_bytes {
            // The buffer is empty here; its storage doubles as scratch space so that
            // draining an oversized value never grows the allocation.
            self.reset_storage();
            let source = match self.source.as_mut() {
                Some(source) => source,
                None => break,
            };
            let capacity = self.data.len().min(num_bytes - discarded);
            if capacity == 0 {
                // No storage has been allocated yet; a skip may precede any fill.
                self.make_room(self.config.initial_buffer_size().max(1));
                continue;
            }
            let bytes_read = source.read(&mut self.data[..capacity])?;
            if bytes_read == 0 {
                break;
            }
            self.config.notify_data(bytes_read)?;
            self.total_consumed += bytes_read;
            discarded += bytes_read;
        }
        Ok(discarded)
    }

    // Moves any unread bytes to the front of the storage and grows the allocation (doubling,
    // bounded by the configured maximum) until `required` unread bytes can be held.
    fn make_room(&mut self, required: usize) {
        if self.start > 0 {
            self.reset_storage();
        }
        let minimum = self.config.initial_buffer_size().max(1);
        let mut target = self.data.len().max(minimum);
        while target < required {
            target *= 2;
        }
        if let Some(maximum) = self.config.maximum_buffer_size() {
            target = target.min(maximum.max(required));
        }
        if target > self.data.len() {
            self.data.resize(target, 0);
        }
    }

    // Restacks the unread bytes to the front of the storage. The bytes remaining at this
    // point always represent an incomplete item, so the copy is typically small.
    fn reset_storage(&mut self) {
        let remaining = self.remaining();
        self.data.copy_within(self.start..self.end, 0);
        self.start = 0;
        self.end = remaining;
    }
}
