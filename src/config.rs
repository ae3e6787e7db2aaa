use crate::result::{illegal_operation, IonResult};

/// The smallest legal value for [`BufferConfigurationBuilder::with_maximum_buffer_size`]:
/// a binary stream's four-byte version marker plus a one-byte value.
pub const MINIMUM_MAX_BUFFER_SIZE: usize = 5;

/// The default number of bytes that a cursor's buffer occupies before any growth is needed.
/// Large enough to hold a typical top-level value and the system values that precede it.
pub const DEFAULT_INITIAL_BUFFER_SIZE: usize = 32 * 1024;

/// Invoked when a user value (together with any system values immediately preceding it)
/// cannot fit in the configured maximum buffer size. Returning an `Err` aborts the
/// triggering cursor operation; the error is surfaced to the caller unmodified.
pub type OversizedValueHandler = Box<dyn FnMut() -> IonResult<()>>;

/// Invoked when a symbol table definition cannot fit in the configured maximum buffer size.
/// Unlike an oversized value, this poisons the rest of the stream: symbol IDs declared by
/// an unread table can never be resolved, so the cursor becomes permanently inert.
pub type OversizedSymbolTableHandler = Box<dyn FnMut() -> IonResult<()>>;

/// Invoked with the number of bytes ingested from the input source, once per byte, whether
/// the bytes are ultimately buffered or discarded. This enables exact rate/quota accounting
/// independent of parse outcomes.
pub type DataHandler = Box<dyn FnMut(usize) -> IonResult<()>>;

/// Configures the buffering behavior of an incremental cursor: how large its lookahead
/// buffer starts, how large it may grow, and what to do when the limit is breached.
///
/// ```
/// use ion_cursor::{BufferConfiguration, IonResult};
///
/// # fn main() -> IonResult<()> {
/// let config = BufferConfiguration::builder()
///     .with_initial_buffer_size(1024)
///     .with_maximum_buffer_size(64 * 1024)
///     .on_oversized_value(Box::new(|| Ok(())))
///     .on_oversized_symbol_table(Box::new(|| Ok(())))
///     .build()?;
/// assert_eq!(config.maximum_buffer_size(), Some(64 * 1024));
/// # Ok(())
/// # }
/// ```
pub struct BufferConfiguration {
    initial_buffer_size: usize,
    maximum_buffer_size: Option<usize>,
    oversized_value_handler: Option<OversizedValueHandler>,
    oversized_symbol_table_handler: Option<OversizedSymbolTableHandler>,
    data_handler: Option<DataHandler>,
}

impl Default for BufferConfiguration {
    /// An unbounded configuration: the buffer starts at
    /// [`DEFAULT_INITIAL_BUFFER_SIZE`] and grows as needed.
    fn default() -> Self {
        BufferConfiguration {
            initial_buffer_size: DEFAULT_INITIAL_BUFFER_SIZE,
            maximum_buffer_size: None,
            oversized_value_handler: None,
            oversized_symbol_table_handler: None,
            data_handler: None,
        }
    }
}

impl BufferConfiguration {
    pub fn builder() -> BufferConfigurationBuilder {
        BufferConfigurationBuilder::default()
    }

    pub fn initial_buffer_size(&self) -> usize {
        self.initial_buffer_size
    }

    /// The number of bytes the buffer may grow to. `None` means unbounded.
    pub fn maximum_buffer_size(&self) -> Option<usize> {
        self.maximum_buffer_size
    }

    pub(crate) fn notify_oversized_value(&mut self) -> IonResult<()> {
        match self.oversized_value_handler.as_mut() {
            Some(handler) => handler(),
            None => Ok(()),
        }
    }

    pub(crate) fn notify_oversized_symbol_table(&mut self) -> IonResult<()> {
        match self.oversized_symbol_table_handler.as_mut() {
            Some(handler) => handler(),
            None => Ok(()),
        }
    }

    pub(crate) fn notify_data(&mut self, number_of_bytes: usize) -> IonResult<()> {
        match self.data_handler.as_mut() {
            Some(handler) => handler(number_of_bytes),
            None => Ok(()),
        }
    }
}

/// Builds a validated [`BufferConfiguration`]. See the type-level documentation for the
/// invariants enforced by [`build`](Self::build).
#[derive(Default)]
pub struct BufferConfigurationBuilder {
    initial_buffer_size: Option<usize>,
    maximum_buffer_size: Option<usize>,
    oversized_value_handler: Option<OversizedValueHandler>,
    oversized_symbol_table_handler: Option<OversizedSymbolTableHandler>,
    data_handler: Option<DataHandler>,
}

impl BufferConfigurationBuilder {
    pub fn with_initial_buffer_size(mut self, number_of_bytes: usize) -> Self {
        self.initial_buffer_size = Some(number_of_bytes);
        self
    }

    pub fn with_maximum_buffer_size(mut self, number_of_bytes: usize) -> Self {
        self.maximum_buffer_size = Some(number_of_bytes);
        self
    }

    pub fn on_oversized_value(mut self, handler: OversizedValueHandler) -> Self {
        self.oversized_value_handler = Some(handler);
        self
    }

    pub fn on_oversized_symbol_table(mut self, handler: OversizedSymbolTableHandler) -> Self {
        self.oversized_symbol_table_handler = Some(handler);
        self
    }

    pub fn on_data(mut self, handler: DataHandler) -> Self {
        self.data_handler = Some(handler);
        self
    }

    pub fn build(self) -> IonResult<BufferConfiguration> {
        if let Some(maximum) = self.maximum_buffer_size {
            if maximum < MINIMUM_MAX_BUFFER_SIZE {
                return illegal_operation(format!(
                    "maximum buffer size must be at least {MINIMUM_MAX_BUFFER_SIZE} bytes (IVM + minimal value), found {maximum}"
                ));
            }
            if self.oversized_value_handler.is_none() {
                return illegal_operation(
                    "a maximum buffer size requires an oversized value handler",
                );
            }
            if self.oversized_symbol_table_handler.is_none() {
                return illegal_operation(
                    "a maximum buffer size requires an oversized symbol table handler",
                );
            }
        }
        let initial_buffer_size = match (self.initial_buffer_size, self.maximum_buffer_size) {
            (Some(initial), Some(maximum)) if initial > maximum => {
                return illegal_operation(format!(
                    "initial buffer size ({initial}) cannot exceed the maximum buffer size ({maximum})"
                ));
            }
            // When only a maximum is configured, start no larger than it.
            (None, Some(maximum)) => maximum.min(DEFAULT_INITIAL_BUFFER_SIZE),
            (initial, _) => initial.unwrap_or(DEFAULT_INITIAL_BUFFER_SIZE),
        };
        Ok(BufferConfiguration {
            initial_buffer_size,
            maximum_buffer_size: self.maximum_buffer_size,
            oversized_value_handler: self.oversized_value_handler,
            oversized_symbol_table_handler: self.oversized_symbol_table_handler,
            data_handler: self.data_handler,
        })
    }
}

#[cfg(test)]
mod configuration_tests {
    use super::*;
    use crate::IonError;

    fn bounded_builder(maximum: usize) -> BufferConfigurationBuilder {
        BufferConfiguration::builder()
            .with_maximum_buffer_size(maximum)
            .on_oversized_value(Box::new(|| Ok(())))
            .on_oversized_symbol_table(Box::new(|| Ok(())))
    }

    #[test]
    fn default_is_unbounded() {
        let config = BufferConfiguration::default();
        assert_eq!(config.initial_buffer_size(), DEFAULT_INITIAL_BUFFER_SIZE);
        assert_eq!(config.maximum_buffer_size(), None);
    }

    #[test]
    fn bounded_requires_handlers() {
        let result = BufferConfiguration::builder()
            .with_maximum_buffer_size(1024)
            .build();
        assert!(matches!(result, Err(IonError::IllegalOperation(_))));
    }

    #[test]
    fn maximum_below_floor_is_rejected() {
        let result = bounded_builder(MINIMUM_MAX_BUFFER_SIZE - 1).build();
        assert!(matches!(result, Err(IonError::IllegalOperation(_))));
    }

    #[test]
    fn initial_cannot_exceed_maximum() {
        let result = bounded_builder(16).with_initial_buffer_size(17).build();
        assert!(matches!(result, Err(IonError::IllegalOperation(_))));
    }

    #[test]
    fn initial_defaults_to_maximum_when_smaller() {
        let config = bounded_builder(16).build().unwrap();
        assert_eq!(config.initial_buffer_size(), 16);
    }
}
