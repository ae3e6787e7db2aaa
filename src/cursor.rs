use std::fmt::{Display, Formatter};
use std::ops::Range;

use crate::position::Position;
use crate::result::IonResult;
use crate::types::IonType;

/// The possible outcomes of a cursor operation. Each cursor operation returns one of these
/// events; the event also remains observable through
/// [`current_event`](IonCursor::current_event) until the next operation.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum StreamEvent {
    /// The requested operation could not make progress with the data currently available.
    /// The caller should allow the input source to produce more data and then retry the
    /// *same* operation; no parser state has been lost.
    NeedsData,
    /// The cursor is between values and awaiting direction from the caller. This is also
    /// returned by `next_value` when a value had to be skipped because it exceeded the
    /// configured maximum buffer size—in that case the oversized-value handler has already
    /// been invoked.
    NeedsInstruction,
    /// The cursor is positioned on a scalar value whose bytes are fully buffered.
    StartScalar,
    /// The cursor is positioned on a container value. The container's body may not be
    /// buffered yet; call `step_into_container` to visit its children or `fill_value` to
    /// buffer it in full.
    StartContainer,
    /// The container the cursor was traversing has no further values.
    EndContainer,
    /// The current value's bytes are fully buffered and randomly accessible.
    ValueReady,
}

impl Display for StreamEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use StreamEvent::*;
        let text = match self {
            NeedsData => "NEEDS_DATA",
            NeedsInstruction => "NEEDS_INSTRUCTION",
            StartScalar => "START_SCALAR",
            StartContainer => "START_CONTAINER",
            EndContainer => "END_CONTAINER",
            ValueReady => "VALUE_READY",
        };
        write!(f, "{text}")
    }
}

/// An incremental, resumable cursor over a stream of Ion values.
///
/// The cursor is driven by repeated calls to the operations below. Any operation that
/// returns [`StreamEvent::NeedsData`] may be retried verbatim once more input is available;
/// retries never duplicate side effects. System constructs (version markers and symbol
/// tables) are consumed internally: the cursor resolves and installs symbol tables before
/// surfacing the events of the values that follow them.
pub trait IonCursor {
    /// Advances past the current value (if any) to the next sibling value at the current
    /// depth. Returns [`StreamEvent::StartScalar`] or [`StreamEvent::StartContainer`] when
    /// positioned on a value, [`StreamEvent::EndContainer`] when the enclosing container is
    /// exhausted, [`StreamEvent::NeedsData`] when more input is required, and
    /// [`StreamEvent::NeedsInstruction`] when an oversized value was skipped.
    fn next_value(&mut self) -> IonResult<StreamEvent>;

    /// Positions the cursor inside the container it is currently on. Only legal when the
    /// current event is [`StreamEvent::StartContainer`]. A subsequent `next_value` call
    /// will surface the container's first child.
    fn step_into_container(&mut self) -> IonResult<StreamEvent>;

    /// Leaves the container the cursor is currently traversing, skipping any unread
    /// siblings. Calling this at the top level (depth 0) is a programming error and fails
    /// without changing the cursor's state.
    fn step_out_of_container(&mut self) -> IonResult<StreamEvent>;

    /// Buffers the current value in full so that its bytes are randomly accessible.
    /// Returns [`StreamEvent::ValueReady`] on success, [`StreamEvent::NeedsData`] if the
    /// buffer cannot yet be filled, or [`StreamEvent::NeedsInstruction`] if the value
    /// exceeded the configured maximum buffer size and was skipped.
    fn fill_value(&mut self) -> IonResult<StreamEvent>;

    /// Declares that the input source will produce no further data. For binary streams a
    /// value's end is always unambiguous, so this either is a no-op or reports a truncated
    /// value as a fatal error. For text streams this resolves terminal lexical ambiguity
    /// and may promote a pending token to [`StreamEvent::StartScalar`]. Calling this below
    /// the top level is a programming error.
    fn end_stream(&mut self) -> IonResult<StreamEvent>;

    /// Returns the event produced by the most recent operation. Pure accessor.
    fn current_event(&self) -> StreamEvent;

    /// The number of containers the cursor has stepped into. `0` means top level.
    fn depth(&self) -> usize;

    /// The Ion type of the value the cursor is positioned on, if any.
    fn ion_type(&self) -> Option<IonType>;

    /// Releases the underlying input source. Idempotent; no other operation is legal after
    /// the first call.
    fn close(&mut self) -> IonResult<()>;

    /// Capability discovery: returns a [`SpanProvider`] view of this cursor if it tracks
    /// the byte spans of the values it visits. Cursors that do not support spans return
    /// `None`; there is no runtime downcasting involved.
    fn span_provider(&self) -> Option<&dyn SpanProvider> {
        None
    }
}

/// Optional cursor capability: reports where in the stream the current value lives.
pub trait SpanProvider {
    /// The stream-absolute byte range occupied by the current value (including its field
    /// name and annotations, if any), or `None` if the cursor is not positioned on a value.
    fn value_span(&self) -> Option<Range<usize>>;

    /// The cursor's current position in the stream, for diagnostics.
    fn position(&self) -> Position;
}
