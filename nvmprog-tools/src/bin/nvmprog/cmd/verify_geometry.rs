use crate::config::Config;
use crate::util::common_options::TargetOptions;
use crate::util::logging;

/// Compare the flash geometry reported by the device with its description
#[derive(clap::Parser)]
pub struct Cmd {
    #[clap(flatten)]
    target: TargetOptions,
}

impl Cmd {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let mut attached = self.target.attach_unchecked(config)?;

        let geometry = attached
            .controller
            .verify_geometry(attached.memory.as_mut())?;

        logging::println(format!(
            "{} matches its description: {geometry}",
            attached.controller.description().name
        ));
        Ok(())
    }
}
