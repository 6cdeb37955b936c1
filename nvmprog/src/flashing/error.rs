use nvmprog_target::ConfigurationError;

use super::{MemorySpan, NvmcMode, RegionViolation};

/// The step of a flash operation which was waiting for the ready flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, docsplay::Display)]
pub enum FlashStep {
    /// entering {0} mode
    EnterMode(NvmcMode),
    /// {0}
    Command(&'static str),
    /// returning to read-only mode
    ReturnToReadOnly,
}

/// {page_size:#x} byte pages, {code_size:#x} bytes of code flash
#[derive(Debug, Copy, Clone, PartialEq, Eq, docsplay::Display)]
pub struct FlashGeometry {
    /// Size of an erasable page.
    pub page_size: u64,
    /// Total size of the code flash.
    pub code_size: u64,
}

/// Describes any error that happened during an erase or write operation,
/// or in preparation for one.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum FlashError {
    /// The flash controller did not become ready while {step} ({attempts} polls). The device state is suspect, consider re-attaching.
    Timeout {
        /// The step which was waiting.
        step: FlashStep,
        /// Number of polls performed.
        attempts: u32,
    },

    /// The memory region {span} cannot be written: {reason}
    Validation {
        /// The rejected span.
        span: MemorySpan,
        /// The first rule the span violates.
        #[source]
        reason: RegionViolation,
    },

    /// The page at {address:#010x} in region '{region}' is not a page of this device.
    ForeignPage {
        /// The region the page claims to belong to.
        region: String,
        /// Address of the page.
        address: u64,
    },

    /// The device description is inconsistent.
    Configuration(#[from] ConfigurationError),

    /// A ready policy needs to allow at least one poll.
    InvalidReadyPolicy,

    /// Something during memory interaction went wrong.
    Memory(#[from] crate::Error),

    /// Failed to read the data to be written.
    Io(#[source] std::io::Error),

    /// The device reports {actual}, but its description says {expected}.
    GeometryMismatch {
        /// Geometry from the device description.
        expected: FlashGeometry,
        /// Geometry read from the factory information registers.
        actual: FlashGeometry,
    },

    /// The device description has no factory information registers to read the geometry from.
    GeometryUnavailable,

    /// The operation completed, but the flash controller could not be returned to read-only mode.
    RecoveryFailed(#[source] Box<FlashError>),
}
