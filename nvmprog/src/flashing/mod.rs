//! Erasing and writing the internal flash of a device.
//!
//! The [`FlashController`] drives the NVMC peripheral of a device through a
//! [`MemoryInterface`](crate::MemoryInterface). Pages and regions come from a
//! [`DeviceDescription`](nvmprog_target::DeviceDescription):
//!
//! ```
//! use nvmprog::flashing::{FlashController, MemorySpan};
//!
//! let description = nvmprog::config::builtin::device("nRF51822_xxAA")?;
//! let controller = FlashController::new(description)?;
//!
//! assert_eq!(controller.firmware_region(), "flash1");
//! assert!(controller.check_region(&MemorySpan::new(0x1000, 0x100)).is_ok());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod controller;
mod error;
pub mod nvmc;
mod progress;
mod ready;
mod region;

pub use controller::FlashController;
pub use error::{FlashError, FlashGeometry, FlashStep};
pub use nvmc::NvmcMode;
pub use progress::{FlashProgress, ProgressEvent};
pub use ready::{wait_ready, Delay, ReadyError, ReadyPolicy, StdDelay};
pub use region::{MemorySpan, RegionViolation};
