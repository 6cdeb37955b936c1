use crate::memory::MemoryNotAlignedError;

/// Errors raised by the memory interface to the target.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum Error {
    /// An error with the usage of the probe occurred.
    Probe(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// {0}
    MemoryNotAligned(#[from] MemoryNotAlignedError),

    /// Address {0:#010x} is not backed by any memory on the target.
    UnmappedAddress(u64),

    /// Some uncategorized error occurred.
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Wraps an error of the underlying debug probe transport.
    pub fn probe(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Probe(Box::new(e))
    }
}
