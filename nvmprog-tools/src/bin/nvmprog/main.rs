mod cmd;
mod config;
mod util;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{Config, Configs};
use crate::util::logging::{setup_logging, LevelFilter, LogSettings};

#[derive(clap::Parser)]
#[clap(
    name = "nvmprog",
    about = "Erase and program the internal flash of microcontrollers",
    version = env!("NVMPROG_VERSION"),
    long_version = env!("NVMPROG_LONG_VERSION")
)]
struct Cli {
    /// Location for the log file, or a directory to create one in
    #[clap(long, global = true, help_heading = "LOG CONFIGURATION")]
    log_file: Option<PathBuf>,
    /// The log level. Overrides the configuration and RUST_LOG.
    #[clap(
        long,
        global = true,
        value_enum,
        ignore_case = true,
        help_heading = "LOG CONFIGURATION"
    )]
    log_level: Option<LevelFilter>,
    /// A config file merged on top of the ones in the working directory.
    #[clap(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

impl Subcommand {
    fn run(self, config: &Config) -> Result<()> {
        match self {
            Subcommand::List(cmd) => cmd.run(),
            Subcommand::Info(cmd) => cmd.run(config),
            Subcommand::Check(cmd) => cmd.run(config),
            Subcommand::Erase(cmd) => cmd.run(config),
            Subcommand::EraseAll(cmd) => cmd.run(config),
            Subcommand::Write(cmd) => cmd.run(config),
            Subcommand::VerifyGeometry(cmd) => cmd.run(config),
        }
    }
}

#[derive(clap::Subcommand)]
enum Subcommand {
    /// List all built-in devices
    List(cmd::list::Cmd),
    /// Show the flash layout of a device
    Info(cmd::info::Cmd),
    Check(cmd::check::Cmd),
    Erase(cmd::erase::Cmd),
    EraseAll(cmd::erase_all::Cmd),
    Write(cmd::write::Cmd),
    VerifyGeometry(cmd::verify_geometry::Cmd),
}

fn load_config(extra: Option<PathBuf>) -> Result<Config> {
    let mut configs = Configs::new(std::env::current_dir()?);
    if let Some(path) = extra {
        configs.merge(path)?;
    }
    configs.extract()
}

fn main() -> Result<()> {
    let Cli {
        log_file,
        log_level,
        config,
        subcommand,
    } = Cli::parse();

    let config = load_config(config).context("Failed to load configuration.")?;

    let log_settings = LogSettings::resolve(log_level, log_file, &config.general);
    let _logger_guard = setup_logging(&log_settings)?;

    subcommand.run(&config)
}

#[cfg(test)]
mod test {
    use super::Cli;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn erase_needs_pages_or_region() {
        assert!(Cli::try_parse_from(["nvmprog", "erase", "--device", "nRF51822_xxAA"]).is_err());
        assert!(Cli::try_parse_from(["nvmprog", "erase", "0x400", "0x800"]).is_ok());
        assert!(Cli::try_parse_from(["nvmprog", "erase", "--region", "UICR"]).is_ok());
        assert!(Cli::try_parse_from(["nvmprog", "erase", "--region", "UICR", "0x400"]).is_err());
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let cli = Cli::try_parse_from(["nvmprog", "list", "--log-level", "debug"]).unwrap();

        assert_eq!(cli.log_level, Some(crate::util::logging::LevelFilter::Debug));
    }

    #[test]
    fn log_options_feed_log_settings() {
        let Cli {
            log_file,
            log_level,
            subcommand,
            ..
        } = Cli::try_parse_from(["nvmprog", "list", "--log-file", "run.log"]).unwrap();
        let general = crate::config::General {
            device: None,
            device_description: None,
            log_level: Some(crate::util::logging::LevelFilter::Info),
            log_file: Some("config.log".into()),
        };

        let settings = crate::util::logging::LogSettings::resolve(log_level, log_file, &general);

        assert!(matches!(subcommand, super::Subcommand::List(_)));
        assert_eq!(settings.file, Some("run.log".into()));
        assert_eq!(
            settings.level,
            Some(crate::util::logging::LevelFilter::Info)
        );
    }
}
