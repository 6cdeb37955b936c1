use std::collections::HashSet;

use nvmprog::config::{FlashPage, RegionKind};
use nvmprog::flashing::FlashController;
use nvmprog::MemoryInterface;

use crate::config::Config;
use crate::util::common_options::TargetOptions;
use crate::util::parse_u64;

/// Erase single flash pages
#[derive(clap::Parser)]
pub struct Cmd {
    #[clap(flatten)]
    target: TargetOptions,
    /// The start addresses of the pages to erase.
    #[clap(value_parser = parse_u64, required_unless_present = "region")]
    pages: Vec<u64>,
    /// Erase all pages of this region instead.
    #[arg(long, conflicts_with = "pages")]
    region: Option<String>,
}

impl Cmd {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let attached = self.target.attach(config)?;
        let mut memory = attached.memory;

        let pages = match &self.region {
            Some(name) => region_pages(&attached.controller, name)?,
            None => self
                .pages
                .iter()
                .map(|address| page_at(&attached.controller, *address))
                .collect::<anyhow::Result<_>>()?,
        };
        let pages = erase_list(pages);

        let total = pages.iter().map(|page| page.size).sum();
        let (progress, bars) = self.target.progress(total, 0);
        let mut controller = attached.controller.with_progress(progress);

        erase_pages(&mut controller, memory.as_mut(), &pages)?;

        if let Some(bars) = bars {
            bars.finish();
        }
        Ok(())
    }
}

/// Returns the page starting at `address`.
fn page_at(controller: &FlashController, address: u64) -> anyhow::Result<FlashPage> {
    match controller.page_containing(address) {
        Some(page) if page.address == address => Ok(page.clone()),
        Some(page) => anyhow::bail!(
            "{address:#010x} is not the start of a page, did you mean {:#010x}?",
            page.address
        ),
        None => anyhow::bail!("{address:#010x} is not inside any flash region"),
    }
}

fn region_pages(controller: &FlashController, name: &str) -> anyhow::Result<Vec<FlashPage>> {
    if controller.region(name).is_none() {
        let names: Vec<&str> = controller.regions().iter().map(|r| r.name.as_str()).collect();
        anyhow::bail!(
            "There is no region '{name}' (available regions: {})",
            names.join(", ")
        );
    }

    Ok(controller
        .sector_list()
        .iter()
        .filter(|page| page.region == name)
        .cloned()
        .collect())
}

/// Removes duplicates from `pages`.
///
/// A configuration area is erased as a whole, so only its first page is kept.
pub fn erase_list(pages: Vec<FlashPage>) -> Vec<FlashPage> {
    let mut seen_pages = HashSet::new();
    let mut seen_config = HashSet::new();

    pages
        .into_iter()
        .filter(|page| match page.kind {
            RegionKind::Code => seen_pages.insert(page.address),
            RegionKind::Config => seen_config.insert(page.region.clone()),
        })
        .collect()
}

/// Erases `pages` one by one.
pub fn erase_pages(
    controller: &mut FlashController,
    memory: &mut dyn MemoryInterface,
    pages: &[FlashPage],
) -> anyhow::Result<()> {
    for page in pages {
        if page.kind == RegionKind::Config {
            tracing::info!("Erasing page {page} clears all of region '{}'", page.region);
        }
        controller.erase(memory, page)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use nvmprog::config::builtin;
    use nvmprog::integration::FakeNvmc;
    use pretty_assertions::assert_eq;

    fn setup() -> (FlashController, FakeNvmc) {
        let description = builtin::device("nRF51822_xxAA").unwrap();
        let fake = FakeNvmc::new(&description);
        (FlashController::new(description).unwrap(), fake)
    }

    #[test]
    fn page_addresses_must_be_page_starts() {
        let (controller, _) = setup();

        assert_eq!(page_at(&controller, 0x800).unwrap().address, 0x800);

        let error = page_at(&controller, 0x810).unwrap_err();
        assert_eq!(
            error.to_string(),
            "0x00000810 is not the start of a page, did you mean 0x00000800?"
        );

        assert!(page_at(&controller, 0x2000_0000).is_err());
    }

    #[test]
    fn unknown_region() {
        let (controller, _) = setup();

        let error = region_pages(&controller, "flash2").unwrap_err();

        assert_eq!(
            error.to_string(),
            "There is no region 'flash2' (available regions: flash1, UICR)"
        );
    }

    #[test]
    fn config_area_is_erased_once() {
        let (mut controller, mut fake) = setup();
        let pages = region_pages(&controller, "UICR").unwrap();
        assert_eq!(pages.len(), 4);

        let pages = erase_list(pages);
        erase_pages(&mut controller, &mut fake, &pages).unwrap();

        assert_eq!(fake.erase_commands(), vec![(0x514, 1)]);
    }

    #[test]
    fn duplicate_pages_are_erased_once() {
        let (mut controller, mut fake) = setup();
        let page = page_at(&controller, 0x400).unwrap();

        let pages = erase_list(vec![page.clone(), page]);
        erase_pages(&mut controller, &mut fake, &pages).unwrap();

        assert_eq!(fake.erase_commands(), vec![(0x508, 0x400)]);
    }
}
