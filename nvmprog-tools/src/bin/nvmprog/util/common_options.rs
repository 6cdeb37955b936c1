use std::fs::File;
use std::path::PathBuf;

use nvmprog::config::{builtin, ConfigurationError, DeviceDescription};
use nvmprog::flashing::{FlashController, FlashError, FlashProgress};
use nvmprog::integration::FakeNvmc;
use nvmprog::MemoryInterface;

use crate::config::Config;

/// Selects the device description to work with.
#[derive(clap::Parser, Debug, Default)]
pub struct DeviceOptions {
    /// The name of a built-in device. See `nvmprog list`.
    #[arg(long, help_heading = "DEVICE CONFIGURATION")]
    pub device: Option<String>,
    /// A YAML device description. Takes precedence over `--device`.
    #[arg(
        value_name = "device description file path",
        long,
        help_heading = "DEVICE CONFIGURATION"
    )]
    pub device_description: Option<PathBuf>,
}

impl DeviceOptions {
    /// Loads the device description.
    ///
    /// The command line takes precedence over the configuration. In both, a
    /// description file takes precedence over a device name.
    pub fn load(&self, config: &Config) -> Result<DeviceDescription, OperationError> {
        if let Some(path) = &self.device_description {
            return load_description(path);
        }
        if let Some(name) = &self.device {
            return builtin_device(name);
        }
        if let Some(path) = &config.general.device_description {
            return load_description(path);
        }
        if let Some(name) = &config.general.device {
            return builtin_device(name);
        }

        Err(OperationError::NoDeviceSelected)
    }
}

fn load_description(path: &PathBuf) -> Result<DeviceDescription, OperationError> {
    let file = File::open(path).map_err(|source| OperationError::DeviceDescriptionNotFound {
        source,
        path: path.clone(),
    })?;

    let description = DeviceDescription::from_yaml_reader(file).map_err(|source| {
        OperationError::FailedDeviceDescriptionParsing {
            source,
            path: path.clone(),
        }
    })?;

    tracing::info!("Loaded device description '{}' from {:?}", description.name, path);
    Ok(description)
}

fn builtin_device(name: &str) -> Result<DeviceDescription, OperationError> {
    builtin::device(name).map_err(|source| OperationError::DeviceNotFound {
        source,
        name: name.to_string(),
    })
}

/// Common options and logic for commands which access the flash of a device.
#[derive(clap::Parser, Debug)]
pub struct TargetOptions {
    #[clap(flatten)]
    pub device: DeviceOptions,
    /// Run against a simulated device instead of real hardware.
    #[arg(long, help_heading = "DEVICE CONFIGURATION")]
    pub dry_run: bool,
    /// Compare the flash geometry of the device with its description first.
    #[arg(long, help_heading = "DEVICE CONFIGURATION")]
    pub verify_geometry: bool,
    #[arg(long, help_heading = "DEVICE CONFIGURATION")]
    pub disable_progressbars: bool,
}

/// A flash controller with the memory interface it works through.
pub struct Attached {
    pub controller: FlashController,
    pub memory: Box<dyn MemoryInterface>,
}

impl TargetOptions {
    /// Loads the device description, opens the memory interface and sets up
    /// the flash controller.
    ///
    /// Checks the flash geometry first if requested on the command line or in
    /// the configuration.
    pub fn attach(&self, config: &Config) -> Result<Attached, OperationError> {
        let mut attached = self.attach_unchecked(config)?;

        if self.verify_geometry || config.flashing.verify_geometry {
            let geometry = attached
                .controller
                .verify_geometry(attached.memory.as_mut())?;
            tracing::info!("Flash geometry verified: {geometry}");
        }

        Ok(attached)
    }

    /// Like [`TargetOptions::attach`], but never checks the flash geometry.
    pub fn attach_unchecked(&self, config: &Config) -> Result<Attached, OperationError> {
        let description = self.device.load(config)?;
        let memory = self.open(&description)?;

        let controller = FlashController::new(description)?
            .with_ready_policy(config.flashing.ready.policy())?;

        Ok(Attached { controller, memory })
    }

    /// Sets up the progress handler of the controller.
    pub fn progress(
        &self,
        erase_total: u64,
        program_total: u64,
    ) -> (FlashProgress, Option<std::rc::Rc<super::progress::CliProgressBars>>) {
        super::progress::flash_progress(self.disable_progressbars, erase_total, program_total)
    }

    fn open(
        &self,
        description: &DeviceDescription,
    ) -> Result<Box<dyn MemoryInterface>, OperationError> {
        if self.dry_run {
            tracing::info!("Dry run, simulating {}", description.name);
            return Ok(Box::new(FakeNvmc::new(description)));
        }

        Err(OperationError::NoProbeTransport)
    }
}

#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum OperationError {
    /// No device was selected. Use `--device`, `--device-description` or set `general.device` in the configuration.
    NoDeviceSelected,
    /// The device description file '{path}' could not be opened.
    DeviceDescriptionNotFound {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    /// The device description file '{path}' could not be parsed.
    FailedDeviceDescriptionParsing {
        #[source]
        source: ConfigurationError,
        path: PathBuf,
    },
    /// The device '{name}' could not be found.
    DeviceNotFound {
        #[source]
        source: ConfigurationError,
        name: String,
    },
    /// This build has no debug probe transport. Use `--dry-run` to work with a simulated device.
    NoProbeTransport,
    /// The flash operation failed.
    Flash(#[from] FlashError),
}
