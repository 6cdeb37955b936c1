use nvmprog::flashing::{FlashController, MemorySpan};

use crate::config::Config;
use crate::util::common_options::DeviceOptions;
use crate::util::{logging, parse_u64};

/// Check whether a memory span is a legal write target, without touching the device
#[derive(clap::Parser)]
pub struct Cmd {
    #[clap(flatten)]
    device: DeviceOptions,
    /// The start address of the span.
    /// Takes an integer as an argument, and can be specified in decimal (16), hexadecimal (0x10) or octal (0o20) format.
    #[clap(value_parser = parse_u64)]
    address: u64,
    /// The size of the span in bytes.
    #[clap(value_parser = parse_u64)]
    size: u64,
}

impl Cmd {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let controller = FlashController::new(self.device.load(config)?)?;
        let span = MemorySpan::new(self.address, self.size);

        logging::println(check(&controller, &span)?);
        Ok(())
    }
}

/// Returns a description of the region `span` would be written to.
pub fn check(controller: &FlashController, span: &MemorySpan) -> anyhow::Result<String> {
    if let Err(reason) = controller.check_region(span) {
        anyhow::bail!("{span} cannot be written: {reason}");
    }

    let region = controller
        .regions()
        .iter()
        .find(|region| region.contains_range(&span.range()))
        .map(|region| region.name.as_str())
        .unwrap_or_default();

    Ok(format!("{span} can be written, it lies in region '{region}'"))
}
