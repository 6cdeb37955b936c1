use std::io::Write;

use bytesize::ByteSize;
use nvmprog::config::{DescriptionSource, FlashPage, RegionKind};
use nvmprog::flashing::FlashController;

use crate::config::Config;
use crate::util::common_options::DeviceOptions;

#[derive(clap::Parser)]
pub struct Cmd {
    #[clap(flatten)]
    device: DeviceOptions,
    /// Also list all pages.
    #[arg(long)]
    pages: bool,
    /// Number of columns of the page list.
    #[arg(long, default_value = "4")]
    columns: usize,
}

impl Cmd {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let controller = FlashController::new(self.device.load(config)?)?;
        let mut output = std::io::stdout().lock();

        print_device_info(&mut output, &controller)?;
        if self.pages {
            writeln!(output, "Pages:")?;
            print_pages(&mut output, controller.sector_list(), self.columns)?;
        }

        Ok(())
    }
}

/// Prints the flash layout of the device behind `controller`.
pub fn print_device_info(
    mut output: impl Write,
    controller: &FlashController,
) -> anyhow::Result<()> {
    let description = controller.description();
    let source = match description.source {
        DescriptionSource::BuiltIn => "built-in",
        DescriptionSource::External => "external",
    };

    writeln!(output, "{} ({source})", description.name)?;
    writeln!(output, "NVMC: {:#010x}", description.nvmc_base)?;
    match description.ficr_base {
        Some(ficr_base) => writeln!(output, "FICR: {ficr_base:#010x}")?,
        None => writeln!(output, "FICR: none, the flash geometry cannot be checked")?,
    }
    writeln!(
        output,
        "Page size: {}",
        ByteSize(description.page_size).display().iec()
    )?;
    writeln!(output, "Firmware region: {}", controller.firmware_region())?;

    writeln!(output, "Regions ({}):", controller.regions().len())?;
    for region in controller.regions() {
        let kind = match region.kind {
            RegionKind::Code => "code",
            RegionKind::Config => "config",
        };
        let pages = controller
            .sector_list()
            .iter()
            .filter(|page| page.region == region.name)
            .count();

        writeln!(
            output,
            "    - {} ({kind}): {:#010x?} ({}, {pages} pages)",
            region.name,
            region.range(),
            ByteSize(region.size).display().iec(),
        )?;
    }

    Ok(())
}

/// Prints `pages` in `columns` columns, row by row.
pub fn print_pages(
    mut output: impl Write,
    pages: &[FlashPage],
    columns: usize,
) -> anyhow::Result<()> {
    let cells: Vec<String> = pages.iter().map(|page| page.to_string()).collect();
    let width = cells.iter().map(String::len).max().unwrap_or(0);

    for row in cells.chunks(columns.max(1)) {
        let line = row
            .iter()
            .map(|cell| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(output, "{}", line.trim_end())?;
    }

    Ok(())
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
    fn page_columns() {
        let controller = controller();
        let uicr: Vec<FlashPage> = controller
            .sector_list()
            .iter()
            .filter(|page| page.kind == RegionKind::Config)
            .cloned()
            .collect();

        let mut buff = Vec::new();
        print_pages(&mut buff, &uicr, 3).unwrap();

        assert_eq!(
            String::from_utf8(buff).unwrap(),
            "UICR 0x10001000 1K  UICR 0x10001400 1K  UICR 0x10001800 1K\n\
             UICR 0x10001c00 1K\n"
        );
    }

    #[test]
    fn columns_are_padded_to_the_widest_page() {
        let controller = controller();
        let pages = &controller.sector_list()[255..257];

        let mut buff = Vec::new();
        print_pages(&mut buff, pages, 2).unwrap();

        assert_eq!(
            String::from_utf8(buff).unwrap(),
            "flash1 0x0003fc00 1K  UICR 0x10001000 1K\n"
        );
    }

    #[test]
    fn device_info() {
        let mut buff = Vec::new();
        print_device_info(&mut buff, &controller()).unwrap();

        let output = String::from_utf8(buff).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], "nRF51822_xxAA (built-in)");
        assert_eq!(lines[1], "NVMC: 0x4001e000");
        assert_eq!(lines[2], "FICR: 0x10000000");
        assert_eq!(lines[4], "Firmware region: flash1");
        assert_eq!(lines[5], "Regions (2):");
        assert!(lines[6].contains("flash1 (code)"));
        assert!(lines[6].ends_with("256 pages)"));
        assert!(lines[7].contains("UICR (config)"));
        assert!(lines[7].ends_with("4 pages)"));
    }
}
