use crate::config::Config;
use crate::util::common_options::TargetOptions;

/// Erase all code flash and the configuration area
#[derive(clap::Parser)]
pub struct Cmd {
    #[clap(flatten)]
    target: TargetOptions,
}

impl Cmd {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let attached = self.target.attach(config)?;
        let mut memory = attached.memory;

        let total = attached.controller.regions().iter().map(|r| r.size).sum();
        let (progress, bars) = self.target.progress(total, 0);
        let mut controller = attached.controller.with_progress(progress);

        controller.erase_all(memory.as_mut())?;

        if let Some(bars) = bars {
            bars.finish();
        }
        Ok(())
    }
}
