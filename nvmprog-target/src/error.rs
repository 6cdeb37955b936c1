/// The device description is inconsistent.
///
/// These errors are not recoverable at runtime, they mean the static
/// description of the device itself is wrong.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum ConfigurationError {
    /// The page size {page_size:#x} is not a non-zero power of two.
    InvalidPageSize {
        /// The offending page size.
        page_size: u64,
    },

    /// Region '{region}' ({base_address:#010x}, {size:#x} bytes) cannot be split into pages of {page_size:#x} bytes.
    RegionNotPageAligned {
        /// Name of the region.
        region: String,
        /// Base address of the region.
        base_address: u64,
        /// Size of the region.
        size: u64,
        /// The configured page size.
        page_size: u64,
    },

    /// Region '{region}' ({base_address:#x}, {size:#x} bytes) extends past the end of the address space.
    RegionOutOfAddressSpace {
        /// Name of the region.
        region: String,
        /// Base address of the region.
        base_address: u64,
        /// Size of the region.
        size: u64,
    },

    /// The {peripheral} registers at {base_address:#x} extend past the end of the address space.
    PeripheralOutOfAddressSpace {
        /// Name of the peripheral, `NVMC` or `FICR`.
        peripheral: &'static str,
        /// The configured base address.
        base_address: u64,
    },

    /// Region '{0}' is declared more than once.
    DuplicateRegion(String),

    /// Regions '{0}' and '{1}' overlap.
    OverlappingRegions(String, String),

    /// The device '{0}' does not declare any flash region.
    NoRegions(String),

    /// The firmware region '{0}' is not a code region of this device.
    UnknownFirmwareRegion(String),

    /// The device '{0}' is not known. Use a device description file instead.
    UnknownDevice(String),

    /// The device description could not be parsed.
    Yaml(#[from] serde_yaml::Error),
}
