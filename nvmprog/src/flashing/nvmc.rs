//! Registers of the non-volatile memory controller (NVMC).
//!
//! Offsets are relative to the `nvmc_base` address of the device description.

use bitfield::bitfield;

use crate::{Error, MemoryInterface};

/// A register of the NVMC peripheral.
pub trait NvmcRegister: Clone + From<u32> + Into<u32> + Sized + std::fmt::Debug {
    /// Offset of the register from the peripheral base.
    const OFFSET: u64;
    /// The register's name.
    const NAME: &'static str;

    /// Read the register of the peripheral at `base`.
    fn read(memory: &mut dyn MemoryInterface, base: u64) -> Result<Self, Error> {
        let value = memory.read_word_32(base + Self::OFFSET)?;
        tracing::trace!("{} -> {:#010x}", Self::NAME, value);
        Ok(Self::from(value))
    }

    /// Write the register of the peripheral at `base`.
    fn write(self, memory: &mut dyn MemoryInterface, base: u64) -> Result<(), Error> {
        let value: u32 = self.into();
        tracing::trace!("{} <- {:#010x}", Self::NAME, value);
        memory.write_word_32(base + Self::OFFSET, value)
    }
}

macro_rules! nvmc_register {
    ($(#[$outer:meta])* $name:ident, $offset:literal, $reg_name:literal, { $($fields:tt)* }) => {
        bitfield! {
            $(#[$outer])*
            #[derive(Copy, Clone, PartialEq, Eq)]
            pub struct $name(u32);
            impl Debug;
            $($fields)*
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u32 {
            fn from(register: $name) -> Self {
                register.0
            }
        }

        impl NvmcRegister for $name {
            const OFFSET: u64 = $offset;
            const NAME: &'static str = $reg_name;
        }
    };
}

nvmc_register! {
    /// Ready flag. Set when the last commanded operation completed.
    Ready, 0x400, "NVMC/READY", {
        pub ready, _: 0;
    }
}

nvmc_register! {
    /// Configuration register, selects the access mode of the flash.
    Config, 0x504, "NVMC/CONFIG", {
        pub u8, wen, set_wen: 1, 0;
    }
}

nvmc_register! {
    /// Erases the code page the written address points into.
    ErasePage, 0x508, "NVMC/ERASEPAGE", {
        pub u32, address, set_address: 31, 0;
    }
}

nvmc_register! {
    /// Erases all code flash and the UICR.
    EraseAll, 0x50c, "NVMC/ERASEALL", {
        pub erase, set_erase: 0;
    }
}

nvmc_register! {
    /// Erases the UICR. A normal page erase does not reach it.
    EraseUicr, 0x514, "NVMC/ERASEUICR", {
        pub erase, set_erase: 0;
    }
}

impl Config {
    /// Returns the register value selecting `mode`.
    pub fn with_mode(mode: NvmcMode) -> Self {
        let mut config = Config(0);
        config.set_wen(mode.bits());
        config
    }

    /// Returns the selected mode, or `None` for a reserved encoding.
    pub fn mode(&self) -> Option<NvmcMode> {
        NvmcMode::from_bits(self.wen())
    }
}

impl EraseAll {
    /// Returns the register value starting an erase-all.
    pub fn start() -> Self {
        let mut erase = EraseAll(0);
        erase.set_erase(true);
        erase
    }
}

impl EraseUicr {
    /// Returns the register value starting an UICR erase.
    pub fn start() -> Self {
        let mut erase = EraseUicr(0);
        erase.set_erase(true);
        erase
    }
}

/// Access mode of the flash, selected through [`Config`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, docsplay::Display)]
pub enum NvmcMode {
    /// read-only
    ReadOnly,
    /// write-enabled
    WriteEnabled,
    /// erase-enabled
    EraseEnabled,
}

impl NvmcMode {
    /// The encoding of the mode in `CONFIG.WEN`.
    pub fn bits(self) -> u8 {
        match self {
            NvmcMode::ReadOnly => 0,
            NvmcMode::WriteEnabled => 1,
            NvmcMode::EraseEnabled => 2,
        }
    }

    /// Decodes `CONFIG.WEN`.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(NvmcMode::ReadOnly),
            1 => Some(NvmcMode::WriteEnabled),
            2 => Some(NvmcMode::EraseEnabled),
            _ => None,
        }
    }
}

/// Factory information configuration registers, holding the flash geometry.
pub mod ficr {
    /// Size of a code page in bytes.
    pub const CODEPAGESIZE: u64 = 0x010;
    /// Number of code pages.
    pub const CODESIZE: u64 = 0x014;
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test_case(NvmcMode::ReadOnly, 0)]
    #[test_case(NvmcMode::WriteEnabled, 1)]
    #[test_case(NvmcMode::EraseEnabled, 2)]
    fn config_encoding(mode: NvmcMode, raw: u32) {
        let config = Config::with_mode(mode);

        assert_eq!(u32::from(config), raw);
        assert_eq!(Config::from(raw).mode(), Some(mode));
    }

    #[test]
    fn reserved_config_encoding() {
        assert_eq!(Config::from(3).mode(), None);
    }

    #[test]
    fn erase_registers() {
        assert_eq!(u32::from(EraseAll::start()), 1);
        assert_eq!(u32::from(EraseUicr::start()), 1);

        let mut page = ErasePage(0);
        page.set_address(0x0000_3c00);
        assert_eq!(u32::from(page), 0x3c00);
    }

    #[test]
    fn ready_flag() {
        assert!(Ready::from(1).ready());
        assert!(!Ready::from(0xffff_fffe).ready());
    }
}
