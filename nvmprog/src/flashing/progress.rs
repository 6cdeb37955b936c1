use std::time::Duration;

/// A structure to manage the flashing procedure progress reporting.
///
/// This struct stores a handler closure which will be called everytime an event happens during
/// an erase or write operation.
///
/// # Example
///
/// ```
/// use nvmprog::flashing::FlashProgress;
///
/// // Print events
/// let progress = FlashProgress::new(|event| println!("Event: {:#?}", event));
/// ```
pub struct FlashProgress {
    handler: Box<dyn Fn(ProgressEvent)>,
}

impl FlashProgress {
    /// Create a new `FlashProgress` structure with a given `handler` to be called on events.
    pub fn new(handler: impl Fn(ProgressEvent) + 'static) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// Create a new `FlashProgress` structure with an empty handler.
    pub fn empty() -> Self {
        Self::new(|_| {})
    }

    fn emit(&self, event: ProgressEvent) {
        (self.handler)(event);
    }

    pub(super) fn started_erasing(&self) {
        self.emit(ProgressEvent::StartedErasing);
    }

    pub(super) fn sector_erased(&self, size: u64, time: Duration) {
        self.emit(ProgressEvent::SectorErased { size, time });
    }

    pub(super) fn failed_erasing(&self) {
        self.emit(ProgressEvent::FailedErasing);
    }

    pub(super) fn finished_erasing(&self) {
        self.emit(ProgressEvent::FinishedErasing);
    }

    pub(super) fn started_programming(&self, length: u64) {
        self.emit(ProgressEvent::StartedProgramming { length });
    }

    pub(super) fn page_programmed(&self, size: u64, time: Duration) {
        self.emit(ProgressEvent::PageProgrammed { size, time });
    }

    pub(super) fn failed_programming(&self) {
        self.emit(ProgressEvent::FailedProgramming);
    }

    pub(super) fn finished_programming(&self) {
        self.emit(ProgressEvent::FinishedProgramming);
    }
}

impl Default for FlashProgress {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for FlashProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashProgress").finish_non_exhaustive()
    }
}

/// Possible events during erasing and writing.
///
/// An erase emits `StartedErasing`, one `SectorErased` and `FinishedErasing`.
/// A write emits `StartedProgramming`, one `PageProgrammed` and `FinishedProgramming`.
///
/// If an error occurs, the matching `Failed*` event is emitted instead of the
/// `Finished*` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Erasing has started.
    StartedErasing,
    /// An area of flash was erased.
    SectorErased {
        /// Number of bytes erased.
        size: u64,
        /// Time it took to erase.
        time: Duration,
    },
    /// Erasing failed.
    FailedErasing,
    /// Erasing finished successfully.
    FinishedErasing,
    /// Programming has started.
    StartedProgramming {
        /// Number of bytes that will be written.
        length: u64,
    },
    /// Data was written to flash.
    PageProgrammed {
        /// Number of bytes written.
        size: u64,
        /// Time it took to write.
        time: Duration,
    },
    /// Programming failed.
    FailedProgramming,
    /// Programming finished successfully.
    FinishedProgramming,
}
