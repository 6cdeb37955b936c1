use crate::memory::{FlashPage, FlashRegion, MemoryRange, RegionKind};
use crate::serialize::{hex_option, hex_u_int};
use crate::ConfigurationError;

use serde::{Deserialize, Serialize};

/// Size of the register window of the NVMC and FICR peripherals.
pub const PERIPHERAL_SIZE: u64 = 0x1000;

/// Source of a device description.
///
/// This is used for diagnostics, when an error related to a device
/// description occurs.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum DescriptionSource {
    /// The description is built into nvmprog.
    BuiltIn,
    /// The description was loaded at runtime, e.g. from a YAML file.
    #[default]
    External,
}

/// Describes the non-volatile memory controller of one device.
///
/// The geometry in here is trusted configuration. It is never probed from
/// the hardware, but it can be compared against the factory information
/// registers with an explicit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceDescription {
    /// The name of the device, e.g. `nRF51822_xxAA`.
    pub name: String,
    /// Base address of the NVMC peripheral.
    #[serde(with = "hex_u_int")]
    pub nvmc_base: u64,
    /// Base address of the factory information registers, if the device has them.
    #[serde(
        default,
        with = "hex_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ficr_base: Option<u64>,
    /// Size of an erasable page, shared by all regions.
    #[serde(with = "hex_u_int")]
    pub page_size: u64,
    /// The region firmware images are written to when nothing else is requested.
    pub firmware_region: String,
    /// The flash regions, in declaration order.
    pub regions: Vec<FlashRegion>,
    /// Where the description came from.
    #[serde(skip)]
    pub source: DescriptionSource,
}

impl DeviceDescription {
    /// Parses a description from YAML and validates it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        let description: Self = serde_yaml::from_str(yaml)?;
        description.validate()?;
        Ok(description)
    }

    /// Parses a description from a YAML reader and validates it.
    pub fn from_yaml_reader(reader: impl std::io::Read) -> Result<Self, ConfigurationError> {
        let description: Self = serde_yaml::from_reader(reader)?;
        description.validate()?;
        Ok(description)
    }

    /// Serializes the description to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigurationError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validates the description such that the flash controller can rely on
    /// its geometry without checking it again.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.regions.is_empty() {
            return Err(ConfigurationError::NoRegions(self.name.clone()));
        }

        let peripherals = [("NVMC", Some(self.nvmc_base)), ("FICR", self.ficr_base)];
        for (peripheral, base_address) in peripherals {
            if let Some(base_address) = base_address {
                if base_address.checked_add(PERIPHERAL_SIZE).is_none() {
                    return Err(ConfigurationError::PeripheralOutOfAddressSpace {
                        peripheral,
                        base_address,
                    });
                }
            }
        }

        for region in &self.regions {
            region.pages(self.page_size)?;
        }

        for (index, region) in self.regions.iter().enumerate() {
            for other in &self.regions[index + 1..] {
                if other.name == region.name {
                    return Err(ConfigurationError::DuplicateRegion(region.name.clone()));
                }
                if region.range().intersects_range(&other.range()) {
                    return Err(ConfigurationError::OverlappingRegions(
                        region.name.clone(),
                        other.name.clone(),
                    ));
                }
            }
        }

        match self.region(&self.firmware_region) {
            Some(region) if region.kind == RegionKind::Code => Ok(()),
            _ => Err(ConfigurationError::UnknownFirmwareRegion(
                self.firmware_region.clone(),
            )),
        }
    }

    /// Looks up a region by name.
    pub fn region(&self, name: &str) -> Option<&FlashRegion> {
        self.regions.iter().find(|region| region.name == name)
    }

    /// Returns all pages of all regions, in region declaration order.
    pub fn pages(&self) -> Result<Vec<FlashPage>, ConfigurationError> {
        let mut pages = Vec::new();
        for region in &self.regions {
            pages.extend(region.pages(self.page_size)?);
        }
        Ok(pages)
    }

    /// Total size of all code regions, in bytes.
    pub fn code_size(&self) -> u64 {
        self.regions
            .iter()
            .filter(|region| region.kind == RegionKind::Code)
            .map(|region| region.size)
            .sum()
    }
}
