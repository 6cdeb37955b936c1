//! Device descriptions compiled into nvmprog.

use crate::{ConfigurationError, DescriptionSource, DeviceDescription};

const BUILTIN_DEVICES: &[&str] = &[
    include_str!("../targets/nRF51822_xxAA.yaml"),
    include_str!("../targets/nRF52832_xxAA.yaml"),
];

/// Returns all built-in device descriptions.
pub fn devices() -> Result<Vec<DeviceDescription>, ConfigurationError> {
    BUILTIN_DEVICES
        .iter()
        .map(|yaml| {
            let mut description = DeviceDescription::from_yaml(yaml)?;
            description.source = DescriptionSource::BuiltIn;
            Ok(description)
        })
        .collect()
}

/// Looks up a built-in device by name, ignoring case.
pub fn device(name: &str) -> Result<DeviceDescription, ConfigurationError> {
    devices()?
        .into_iter()
        .find(|description| description.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ConfigurationError::UnknownDevice(name.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builtin_devices_are_valid() {
        let devices = devices().unwrap();

        assert_eq!(devices.len(), BUILTIN_DEVICES.len());
        for device in devices {
            assert_eq!(device.source, DescriptionSource::BuiltIn);
            device.validate().unwrap();
        }
    }

    #[test]
    fn lookup_ignores_case() {
        let device = device("nrf51822_xxaa").unwrap();

        assert_eq!(device.name, "nRF51822_xxAA");
        assert_eq!(device.page_size, 0x400);
        assert_eq!(device.pages().unwrap().len(), 256 + 4);
    }

    #[test]
    fn unknown_device() {
        assert!(matches!(
            device("nRF9999"),
            Err(ConfigurationError::UnknownDevice(name)) if name == "nRF9999"
        ));
    }
}
