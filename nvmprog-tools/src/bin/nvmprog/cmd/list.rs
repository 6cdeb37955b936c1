use std::io::Write;

use bytesize::ByteSize;
use nvmprog::config::builtin;

#[derive(clap::Parser)]
pub struct Cmd {}

impl Cmd {
    pub fn run(self) -> anyhow::Result<()> {
        print_devices(std::io::stdout().lock())
    }
}

/// Prints all built-in devices with their flash size.
pub fn print_devices(mut output: impl Write) -> anyhow::Result<()> {
    writeln!(output, "Built-in devices:")?;
    for device in builtin::devices()? {
        writeln!(
            output,
            "    {:<16} {} code flash in {} pages",
            device.name,
            ByteSize(device.code_size()).display().iec(),
            ByteSize(device.page_size).display().iec(),
        )?;
    }
    Ok(())
}

#[test]
fn lists_all_builtin_devices() {
    let mut buff = Vec::new();
    print_devices(&mut buff).unwrap();

    let output = String::from_utf8(buff).unwrap();
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[1].trim_start().starts_with("nRF51822_xxAA"));
    assert!(lines[2].trim_start().starts_with("nRF52832_xxAA"));
}
