//! Device description schema
//!
//! Erasing and writing the internal flash of a device needs a small amount of
//! static knowledge about it: where its non-volatile memory controller lives,
//! the size of an erasable page, and which named flash regions exist. This
//! crate contains the schema structs for the YAML device description files,
//! the page model derived from them, and the descriptions built into nvmprog.
//!
#![warn(missing_docs)]

pub mod builtin;
mod device;
mod error;
mod memory;
pub(crate) mod serialize;

pub use device::{DescriptionSource, DeviceDescription, PERIPHERAL_SIZE};
pub use error::ConfigurationError;
pub use memory::{FlashPage, FlashRegion, MemoryRange, RegionKind};
