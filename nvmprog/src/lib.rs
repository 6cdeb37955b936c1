//! # nvmprog
//!
//! A library for erasing and programming the internal flash of microcontrollers
//! through the memory access port of a debug probe.
//!
//! The debug probe transport is not part of this crate. Anything that can read
//! and write 32 bit words of target memory implements [`MemoryInterface`], and
//! the [`flashing::FlashController`] sequences the NVMC registers on top of it.
//!
//! For tests and dry runs, [`integration::FakeNvmc`] simulates a device.
#![warn(missing_docs)]

mod error;
pub mod flashing;
pub mod integration;
mod memory;

pub use crate::error::Error;
pub use crate::memory::{MemoryInterface, MemoryNotAlignedError};

pub use nvmprog_target as config;
