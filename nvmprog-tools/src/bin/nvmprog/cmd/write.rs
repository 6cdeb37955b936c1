use std::path::PathBuf;

use anyhow::Context;
use nvmprog::config::{FlashPage, MemoryRange};
use nvmprog::flashing::{FlashController, MemorySpan};

use super::erase::{erase_list, erase_pages};
use crate::config::Config;
use crate::util::common_options::TargetOptions;
use crate::util::parse_u64;

/// Value of erased flash, used to pad images to whole words.
const ERASED: u8 = 0xff;

/// Write a raw binary image to flash
///
/// e.g. nvmprog write --device nRF51822_xxAA --erase firmware.bin
///      Erases the pages covered by firmware.bin and writes it to the start of the firmware region.
#[derive(clap::Parser)]
#[clap(verbatim_doc_comment)]
pub struct Cmd {
    #[clap(flatten)]
    target: TargetOptions,
    /// The binary image to write.
    path: PathBuf,
    /// The address to write the image to. Defaults to the start of the firmware region.
    /// Takes an integer as an argument, and can be specified in decimal (16), hexadecimal (0x10) or octal (0o20) format.
    #[clap(long, value_parser = parse_u64)]
    address: Option<u64>,
    /// Erase the pages covered by the image before writing it.
    #[arg(long)]
    erase: bool,
}

impl Cmd {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let image = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let image = pad_to_words(image);

        let attached = self.target.attach(config)?;
        let mut memory = attached.memory;

        let address = match self.address {
            Some(address) => address,
            None => firmware_base(&attached.controller)?,
        };
        let span = MemorySpan::new(address, image.len() as u64);

        // Nothing is erased for an image which could not be written anyway.
        if let Err(reason) = attached.controller.check_region(&span) {
            anyhow::bail!("{} cannot be written to {span}: {reason}", self.path.display());
        }

        let pages = if self.erase || config.flashing.erase_before_write {
            erase_list(covered_pages(&attached.controller, &span))
        } else {
            Vec::new()
        };

        let erase_total = pages.iter().map(|page| page.size).sum();
        let (progress, bars) = self.target.progress(erase_total, span.size);
        let mut controller = attached.controller.with_progress(progress);

        erase_pages(&mut controller, memory.as_mut(), &pages)?;
        controller.write(memory.as_mut(), &span, &mut image.as_slice())?;

        if let Some(bars) = bars {
            bars.finish();
        }
        tracing::info!("Wrote {} bytes to {span}", span.size);
        Ok(())
    }
}

/// Pads `image` with erased bytes to a whole number of words.
fn pad_to_words(mut image: Vec<u8>) -> Vec<u8> {
    let padded = image.len().next_multiple_of(4);
    if padded != image.len() {
        tracing::debug!("Padding image with {} bytes", padded - image.len());
        image.resize(padded, ERASED);
    }
    image
}

fn firmware_base(controller: &FlashController) -> anyhow::Result<u64> {
    controller
        .region(controller.firmware_region())
        .map(|region| region.base_address)
        .context("The firmware region is missing from the device description")
}

/// Returns all pages `span` touches.
fn covered_pages(controller: &FlashController, span: &MemorySpan) -> Vec<FlashPage> {
    controller
        .sector_list()
        .iter()
        .filter(|page| page.address_range().intersects_range(&span.range()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use nvmprog::config::builtin;
    use pretty_assertions::assert_eq;

    fn controller() -> FlashController {
        FlashController::new(builtin::device("nRF51822_xxAA").unwrap()).unwrap()
    }

    #[test]
    fn padding() {
        assert_eq!(pad_to_words(vec![1, 2, 3, 4]), vec![1, 2, 3, 4]);
        assert_eq!(pad_to_words(vec![1, 2, 3, 4, 5]), vec![1, 2, 3, 4, 5, 0xff, 0xff, 0xff]);
        assert_eq!(pad_to_words(vec![]), Vec::<u8>::new());
    }

    #[test]
    fn default_address_is_the_firmware_region() {
        assert_eq!(firmware_base(&controller()).unwrap(), 0x0);
    }

    #[test]
    fn pages_covered_by_a_span() {
        let controller = controller();

        let pages = covered_pages(&controller, &MemorySpan::new(0x3fc, 0x408));
        let addresses: Vec<u64> = pages.iter().map(|page| page.address).collect();

        assert_eq!(addresses, vec![0x0, 0x400, 0x800]);
    }
}
