use std::io::Read;
use std::time::Instant;

use nvmprog_target::{DeviceDescription, FlashPage, FlashRegion, RegionKind};

use super::nvmc::{
    ficr, Config, EraseAll, ErasePage, EraseUicr, NvmcMode, NvmcRegister, Ready,
};
use super::ready::{wait_ready, Delay, ReadyError, ReadyPolicy, StdDelay};
use super::region::{check_region, MemorySpan, RegionViolation};
use super::{FlashError, FlashGeometry, FlashProgress, FlashStep};
use crate::memory::words_from_le_bytes;
use crate::MemoryInterface;

/// Drives erase and write operations through the NVMC registers of one device.
///
/// The controller owns the region and page tables of the device. It does not
/// own the debug link: every operation borrows a [`MemoryInterface`] for its
/// duration, and other users of the link may run between operations.
///
/// Every operation selects an access mode, waits for the ready flag, issues its
/// command, waits again and switches back to read-only mode. The switch back
/// also happens when a step in between fails.
pub struct FlashController {
    description: DeviceDescription,
    pages: Vec<FlashPage>,
    policy: ReadyPolicy,
    delay: Box<dyn Delay>,
    progress: FlashProgress,
}

impl FlashController {
    /// Creates a controller for the device in `description`.
    pub fn new(description: DeviceDescription) -> Result<Self, FlashError> {
        description.validate()?;
        let pages = description.pages()?;

        tracing::debug!(
            "Flash controller for {}: {} regions, {} pages of {:#x} bytes",
            description.name,
            description.regions.len(),
            pages.len(),
            description.page_size
        );

        Ok(Self {
            description,
            pages,
            policy: ReadyPolicy::default(),
            delay: Box::new(StdDelay),
            progress: FlashProgress::empty(),
        })
    }

    /// Replaces the default ready policy.
    pub fn with_ready_policy(mut self, policy: ReadyPolicy) -> Result<Self, FlashError> {
        if policy.max_attempts == 0 {
            return Err(FlashError::InvalidReadyPolicy);
        }
        self.policy = policy;
        Ok(self)
    }

    /// Replaces the delay used between two polls of the ready flag.
    pub fn with_delay(mut self, delay: impl Delay + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    /// Sets the handler for progress events.
    pub fn with_progress(mut self, progress: FlashProgress) -> Self {
        self.progress = progress;
        self
    }

    /// The description of the device.
    pub fn description(&self) -> &DeviceDescription {
        &self.description
    }

    /// The flash regions, in declaration order.
    pub fn regions(&self) -> &[FlashRegion] {
        &self.description.regions
    }

    /// Looks up a region by name.
    pub fn region(&self, name: &str) -> Option<&FlashRegion> {
        self.description.region(name)
    }

    /// All pages of all regions, in region declaration order.
    pub fn sector_list(&self) -> &[FlashPage] {
        &self.pages
    }

    /// The page which contains `address`.
    pub fn page_containing(&self, address: u64) -> Option<&FlashPage> {
        self.pages
            .iter()
            .find(|page| page.address_range().contains(&address))
    }

    /// The name of the region firmware images are written to by default.
    pub fn firmware_region(&self) -> &str {
        &self.description.firmware_region
    }

    /// Checks whether `span` is a legal write target.
    ///
    /// This never touches the hardware.
    pub fn check_region(&self, span: &MemorySpan) -> Result<(), RegionViolation> {
        check_region(&self.description.regions, span)
    }

    /// Erases all code flash and the configuration area.
    ///
    /// This is the only way to clear the configuration area on devices where it
    /// does not respond to a page erase.
    pub fn erase_all(&mut self, memory: &mut dyn MemoryInterface) -> Result<(), FlashError> {
        tracing::debug!("Erasing all flash of {}", self.description.name);

        let size = self.description.regions.iter().map(|r| r.size).sum();
        self.erasing(size, |this| {
            this.run_in_mode(memory, NvmcMode::EraseEnabled, "erasing all flash", |memory, base| {
                EraseAll::start().write(memory, base)
            })
        })
    }

    /// Erases a single page.
    ///
    /// The erase command is picked by the kind of the region the page belongs
    /// to. Pages which are not part of this device are rejected before any
    /// register is written.
    pub fn erase(
        &mut self,
        memory: &mut dyn MemoryInterface,
        page: &FlashPage,
    ) -> Result<(), FlashError> {
        let page_address = self.own_page_address(page)?;

        tracing::debug!(
            "Erasing page {:#010x} of region '{}'",
            page.address,
            page.region
        );

        self.erasing(page.size, |this| match page.kind {
            RegionKind::Code => this.run_in_mode(
                memory,
                NvmcMode::EraseEnabled,
                "erasing a code page",
                |memory, base| {
                    let mut erase = ErasePage::from(0);
                    erase.set_address(page_address);
                    erase.write(memory, base)
                },
            ),
            RegionKind::Config => this.run_in_mode(
                memory,
                NvmcMode::EraseEnabled,
                "erasing the configuration area",
                |memory, base| EraseUicr::start().write(memory, base),
            ),
        })
    }

    /// Writes `span.size` bytes from `source` to flash at `span.address`.
    ///
    /// The span is validated first, and the data is read completely before the
    /// hardware is touched. The target area must have been erased before.
    pub fn write(
        &mut self,
        memory: &mut dyn MemoryInterface,
        span: &MemorySpan,
        source: &mut dyn Read,
    ) -> Result<(), FlashError> {
        self.check_region(span)
            .map_err(|reason| FlashError::Validation {
                span: *span,
                reason,
            })?;

        let mut data = vec![0u8; span.size as usize];
        source.read_exact(&mut data).map_err(FlashError::Io)?;
        let words = words_from_le_bytes(&data);

        tracing::debug!("Writing {} words to {}", words.len(), span);

        self.progress.started_programming(span.size);
        let start = Instant::now();

        let address = span.address;
        let result = self.run_in_mode(memory, NvmcMode::WriteEnabled, "writing data", |memory, _| {
            memory.write_32(address, &words)?;
            memory.flush()
        });

        match result {
            Ok(()) => {
                self.progress.page_programmed(span.size, start.elapsed());
                self.progress.finished_programming();
                Ok(())
            }
            Err(error) => {
                self.progress.failed_programming();
                Err(error)
            }
        }
    }

    /// Writes `data` to flash at `address`.
    pub fn write_bytes(
        &mut self,
        memory: &mut dyn MemoryInterface,
        address: u64,
        mut data: &[u8],
    ) -> Result<(), FlashError> {
        let span = MemorySpan::new(address, data.len() as u64);
        self.write(memory, &span, &mut data)
    }

    /// Compares the flash geometry in the factory information registers with
    /// the device description.
    ///
    /// This is never done implicitly, the description is trusted otherwise.
    pub fn verify_geometry(
        &self,
        memory: &mut dyn MemoryInterface,
    ) -> Result<FlashGeometry, FlashError> {
        let ficr_base = self
            .description
            .ficr_base
            .ok_or(FlashError::GeometryUnavailable)?;

        let page_size = memory.read_word_32(ficr_base + ficr::CODEPAGESIZE)? as u64;
        let page_count = memory.read_word_32(ficr_base + ficr::CODESIZE)? as u64;

        let actual = FlashGeometry {
            page_size,
            code_size: page_size * page_count,
        };
        let expected = FlashGeometry {
            page_size: self.description.page_size,
            code_size: self.description.code_size(),
        };

        if actual != expected {
            tracing::warn!("Flash geometry mismatch: device reports {actual}, expected {expected}");
            return Err(FlashError::GeometryMismatch { expected, actual });
        }

        Ok(actual)
    }

    /// Returns the page address as written to ERASEPAGE, if `page` is one of ours.
    fn own_page_address(&self, page: &FlashPage) -> Result<u32, FlashError> {
        let foreign = || FlashError::ForeignPage {
            region: page.region.clone(),
            address: page.address,
        };

        let is_own = self.pages.iter().any(|own| own == page);
        if !is_own {
            return Err(foreign());
        }

        u32::try_from(page.address).map_err(|_| foreign())
    }

    /// Emits the erase progress events around `erase`.
    fn erasing(
        &mut self,
        size: u64,
        erase: impl FnOnce(&mut Self) -> Result<(), FlashError>,
    ) -> Result<(), FlashError> {
        self.progress.started_erasing();
        let start = Instant::now();

        match erase(self) {
            Ok(()) => {
                self.progress.sector_erased(size, start.elapsed());
                self.progress.finished_erasing();
                Ok(())
            }
            Err(error) => {
                self.progress.failed_erasing();
                Err(error)
            }
        }
    }

    /// Runs `command` with the flash in `mode`, and always returns to read-only mode.
    ///
    /// The first error is returned. If only the return to read-only mode fails,
    /// that is reported as [`FlashError::RecoveryFailed`].
    fn run_in_mode(
        &mut self,
        memory: &mut dyn MemoryInterface,
        mode: NvmcMode,
        command: &'static str,
        action: impl FnOnce(&mut dyn MemoryInterface, u64) -> Result<(), crate::Error>,
    ) -> Result<(), FlashError> {
        let result = self.run_command(memory, mode, command, action);
        let restore = self.set_mode(memory, NvmcMode::ReadOnly, FlashStep::ReturnToReadOnly);

        match (result, restore) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(error)) => {
                tracing::error!("Failed to return the flash to read-only mode: {error}");
                Err(FlashError::RecoveryFailed(Box::new(error)))
            }
            (Err(error), Ok(())) => {
                tracing::warn!("{command} failed, flash was returned to read-only mode");
                Err(error)
            }
            (Err(error), Err(restore_error)) => {
                tracing::error!(
                    "{command} failed, and the flash could not be returned to read-only mode: \
                     {restore_error}"
                );
                Err(error)
            }
        }
    }

    fn run_command(
        &mut self,
        memory: &mut dyn MemoryInterface,
        mode: NvmcMode,
        command: &'static str,
        action: impl FnOnce(&mut dyn MemoryInterface, u64) -> Result<(), crate::Error>,
    ) -> Result<(), FlashError> {
        self.set_mode(memory, mode, FlashStep::EnterMode(mode))?;
        action(memory, self.description.nvmc_base)?;
        self.wait_ready(memory, FlashStep::Command(command))
    }

    fn set_mode(
        &mut self,
        memory: &mut dyn MemoryInterface,
        mode: NvmcMode,
        step: FlashStep,
    ) -> Result<(), FlashError> {
        tracing::trace!("Switching flash to {mode} mode");
        Config::with_mode(mode).write(memory, self.description.nvmc_base)?;
        self.wait_ready(memory, step)
    }

    fn wait_ready(
        &mut self,
        memory: &mut dyn MemoryInterface,
        step: FlashStep,
    ) -> Result<(), FlashError> {
        let base = self.description.nvmc_base;
        let result = wait_ready(
            || Ok(Ready::read(memory, base)?.ready()),
            &self.policy,
            self.delay.as_mut(),
        );

        match result {
            Ok(attempt) => {
                tracing::trace!("Ready after {attempt} polls while {step}");
                Ok(())
            }
            Err(ReadyError::Timeout { attempts }) => {
                tracing::error!("Timed out waiting for flash ready while {step}");
                Err(FlashError::Timeout { step, attempts })
            }
            Err(ReadyError::Memory(error)) => Err(FlashError::Memory(error)),
        }
    }
}

impl std::fmt::Debug for FlashController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashController")
            .field("description", &self.description)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
