use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use nvmprog::flashing::ReadyPolicy;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::util::logging::LevelFilter;

/// A struct which holds all config layers.
#[derive(Debug, Clone)]
pub struct Configs {
    figment: Figment,
}

/// The main struct holding all the possible config options.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub general: General,
    pub flashing: Flashing,
}

/// The general config struct, selecting the device and the logging.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct General {
    pub device: Option<String>,
    pub device_description: Option<PathBuf>,
    pub log_level: Option<LevelFilter>,
    /// A log file, or a directory receiving one log file per run.
    pub log_file: Option<PathBuf>,
}

/// The flashing config struct holding all the possible flashing options.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Flashing {
    pub verify_geometry: bool,
    pub erase_before_write: bool,
    pub ready: Ready,
}

/// Polling of the flash controller ready flag.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Ready {
    pub attempts: u32,
    /// Delay between two polls in ms.
    #[serde(with = "duration_ms")]
    pub interval: Duration,
}

impl Ready {
    pub fn policy(&self) -> ReadyPolicy {
        ReadyPolicy::new(self.attempts, self.interval)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl Configs {
    pub fn new(conf_dir: PathBuf) -> Configs {
        // Start off by merging in the default configuration file.
        let mut figment = Figment::new().merge(Toml::string(include_str!("default.toml")));

        // Project specific files first, personal ones override them.
        let config_files = ["Nvmprog", ".nvmprog"];

        for file in &config_files {
            figment = figment
                .merge(Toml::file(conf_dir.join(format!("{file}.toml"))))
                .merge(Json::file(conf_dir.join(format!("{file}.json"))))
                .merge(Yaml::file(conf_dir.join(format!("{file}.yaml"))))
                .merge(Yaml::file(conf_dir.join(format!("{file}.yml"))));
        }

        Configs { figment }
    }

    /// Merges an explicitly requested config file on top of the others.
    pub fn merge(&mut self, conf_file: PathBuf) -> anyhow::Result<()> {
        let original = self.figment.clone();
        self.figment = match conf_file.extension().and_then(|e| e.to_str()) {
            Some("toml") => original.merge(Toml::file(conf_file)),
            Some("json") => original.merge(Json::file(conf_file)),
            Some("yml" | "yaml") => original.merge(Yaml::file(conf_file)),
            _ => anyhow::bail!(
                "File format not recognized from extension (supported: .toml, .json, .yaml / .yml)"
            ),
        };
        Ok(())
    }

    /// Extracts the config, with `NVMPROG_` environment variables applied last.
    ///
    /// Sections are separated by a double underscore, e.g.
    /// `NVMPROG_GENERAL__DEVICE=nRF52832_xxAA`.
    pub fn extract(&self) -> anyhow::Result<Config> {
        let env = Env::prefixed("NVMPROG_")
            .filter(|key| key.as_str().contains("__"))
            .split("__");

        self.figment
            .clone()
            .merge(env)
            .extract()
            .map_err(|error| {
                anyhow::anyhow!(
                    "Failed to parse supplied configuration:\n{}",
                    error
                        .into_iter()
                        .map(|e| e.to_string())
                        .collect::<Vec<String>>()
                        .join("\n")
                )
            })
    }
}

#[cfg(test)]
mod test {
    use super::Configs;
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn extract(jail: &Jail) -> figment::error::Result<super::Config> {
        Configs::new(jail.directory().to_path_buf())
            .extract()
            .map_err(|error| error.to_string().into())
    }

    #[test]
    fn default_config() {
        Jail::expect_with(|jail| {
            let config = extract(jail)?;

            assert_eq!(config.general.device, None);
            assert!(!config.flashing.verify_geometry);
            assert!(!config.flashing.erase_before_write);
            assert_eq!(config.flashing.ready.attempts, 5);
            assert_eq!(config.flashing.ready.interval, Duration::from_millis(100));
            Ok(())
        });
    }

    #[test]
    fn project_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "Nvmprog.toml",
                r#"
                [general]
                device = "nRF52832_xxAA"
                log_level = "DEBUG"
                log_file = "logs"

                [flashing]
                erase_before_write = true
                "#,
            )?;

            let config = extract(jail)?;

            assert_eq!(config.general.device.as_deref(), Some("nRF52832_xxAA"));
            assert_eq!(
                config.general.log_level,
                Some(crate::util::logging::LevelFilter::Debug)
            );
            assert_eq!(config.general.log_file, Some("logs".into()));
            assert!(config.flashing.erase_before_write);
            assert_eq!(config.flashing.ready.attempts, 5);
            Ok(())
        });
    }

    #[test]
    fn personal_file_overrides_project_file() {
        Jail::expect_with(|jail| {
            jail.create_file("Nvmprog.toml", "[general]\ndevice = \"nRF51822_xxAA\"")?;
            jail.create_file(".nvmprog.yaml", "general:\n  device: nRF52832_xxAA")?;

            let config = extract(jail)?;

            assert_eq!(config.general.device.as_deref(), Some("nRF52832_xxAA"));
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_files() {
        Jail::expect_with(|jail| {
            jail.create_file("Nvmprog.toml", "[flashing.ready]\nattempts = 10")?;
            jail.set_env("NVMPROG_FLASHING__READY__ATTEMPTS", "20");
            jail.set_env("NVMPROG_GENERAL__DEVICE", "nRF51822_xxAA");
            // Not a config key, ignored.
            jail.set_env("NVMPROG_DRY_RUN", "true");

            let config = extract(jail)?;

            assert_eq!(config.flashing.ready.attempts, 20);
            assert_eq!(config.general.device.as_deref(), Some("nRF51822_xxAA"));
            Ok(())
        });
    }

    #[test]
    fn unknown_config_items_fail() {
        Jail::expect_with(|jail| {
            jail.create_file("Nvmprog.toml", "[flashing]\nbogus_item = true")?;

            assert!(Configs::new(jail.directory().to_path_buf())
                .extract()
                .is_err());
            Ok(())
        });
    }

    #[test]
    fn file_name_patterns() {
        // Existence of files is not tested here.
        Configs::new(std::env::current_dir().unwrap())
            .merge("nonexistent-file.yml".into())
            .unwrap();
        Configs::new(std::env::current_dir().unwrap())
            .merge("nonexistent-file.unknown".into())
            .unwrap_err();
    }
}
