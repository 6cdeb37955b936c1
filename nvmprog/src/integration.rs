//! A simulated device for tests and dry runs.

use std::collections::BTreeMap;
use std::ops::Range;

use nvmprog_target::{DeviceDescription, RegionKind, PERIPHERAL_SIZE};

use crate::flashing::nvmc::{
    ficr, Config, EraseAll, ErasePage, EraseUicr, NvmcMode, NvmcRegister, Ready,
};
use crate::memory::check_alignment;
use crate::{Error, MemoryInterface};

const ERASED_WORD: u32 = 0xffff_ffff;

/// A simulated NVMC peripheral with the flash behind it.
///
/// Flash starts out erased. Writes only clear bits, like real flash. Writes to
/// flash outside write-enabled mode and erase commands outside erase-enabled
/// mode are ignored and counted as protocol violations.
///
/// After every register write or flash write, the ready flag reads low for a
/// configurable number of polls.
#[derive(Debug)]
pub struct FakeNvmc {
    nvmc_base: u64,
    ficr_base: Option<u64>,
    page_size: u64,
    regions: Vec<(RegionKind, Range<u64>)>,
    flash: BTreeMap<u64, u32>,
    ficr: BTreeMap<u64, u32>,
    config: u32,
    busy_polls: u32,
    polls_until_ready: u32,
    stuck: bool,
    stall_on: Option<u64>,
    stall_on_flash_write: bool,
    flash_write_stalled: bool,
    register_writes: Vec<(u64, u32)>,
    ready_polls: usize,
    violations: Vec<String>,
}

impl FakeNvmc {
    /// Creates a simulated device matching `description`.
    pub fn new(description: &DeviceDescription) -> Self {
        let mut ficr = BTreeMap::new();
        if let Some(base) = description.ficr_base {
            ficr.insert(base + ficr::CODEPAGESIZE, description.page_size as u32);
            ficr.insert(
                base + ficr::CODESIZE,
                (description.code_size() / description.page_size) as u32,
            );
        }

        Self {
            nvmc_base: description.nvmc_base,
            ficr_base: description.ficr_base,
            page_size: description.page_size,
            regions: description
                .regions
                .iter()
                .map(|region| (region.kind, region.range()))
                .collect(),
            flash: BTreeMap::new(),
            ficr,
            config: 0,
            busy_polls: 0,
            polls_until_ready: 0,
            stuck: false,
            stall_on: None,
            stall_on_flash_write: false,
            flash_write_stalled: false,
            register_writes: Vec::new(),
            ready_polls: 0,
            violations: Vec::new(),
        }
    }

    /// The ready flag reads low for `polls` polls after every operation.
    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    /// Keeps the ready flag low forever.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    /// The ready flag stays low after the register at `offset` is written, until
    /// CONFIG is written again.
    pub fn stall_on_register(&mut self, offset: u64) {
        self.stall_on = Some(offset);
    }

    /// The ready flag stays low after a flash write, until CONFIG is written again.
    pub fn stall_on_flash_write(&mut self) {
        self.stall_on_flash_write = true;
    }

    /// Overrides the geometry in the factory information registers.
    pub fn set_ficr_geometry(&mut self, page_size: u32, page_count: u32) {
        if let Some(base) = self.ficr_base {
            self.ficr.insert(base + ficr::CODEPAGESIZE, page_size);
            self.ficr.insert(base + ficr::CODESIZE, page_count);
        }
    }

    /// The mode currently selected in CONFIG.
    pub fn mode(&self) -> Option<NvmcMode> {
        Config::from(self.config).mode()
    }

    /// All register writes as `(offset, value)` pairs, oldest first.
    pub fn register_writes(&self) -> &[(u64, u32)] {
        &self.register_writes
    }

    /// Writes to the erase command registers, oldest first.
    pub fn erase_commands(&self) -> Vec<(u64, u32)> {
        self.register_writes
            .iter()
            .copied()
            .filter(|(offset, _)| *offset != Config::OFFSET)
            .collect()
    }

    /// Number of reads of the ready flag.
    pub fn ready_polls(&self) -> usize {
        self.ready_polls
    }

    /// Accesses which would have been rejected or ignored by real hardware.
    pub fn protocol_violations(&self) -> &[String] {
        &self.violations
    }

    /// Reads a word of flash.
    pub fn flash_word(&self, address: u64) -> u32 {
        self.flash.get(&address).copied().unwrap_or(ERASED_WORD)
    }

    /// Reads `length` bytes of flash starting at the word aligned `address`.
    pub fn flash_bytes(&self, address: u64, length: usize) -> Vec<u8> {
        (address..)
            .step_by(4)
            .take(length.div_ceil(4))
            .flat_map(|address| self.flash_word(address).to_le_bytes())
            .take(length)
            .collect()
    }

    /// Programs flash directly, bypassing the NVMC.
    pub fn preload(&mut self, address: u64, words: &[u32]) {
        for (index, word) in words.iter().enumerate() {
            self.flash.insert(address + 4 * index as u64, *word);
        }
    }

    fn region_of(&self, address: u64) -> Option<(RegionKind, Range<u64>)> {
        self.regions
            .iter()
            .find(|(_, range)| range.contains(&address))
            .cloned()
    }

    fn start_operation(&mut self) {
        self.polls_until_ready = self.busy_polls;
    }

    fn is_erase_enabled(&self) -> bool {
        self.mode() == Some(NvmcMode::EraseEnabled)
    }

    fn erase_range(&mut self, range: Range<u64>) {
        let addresses: Vec<u64> = self.flash.range(range).map(|(address, _)| *address).collect();
        for address in addresses {
            self.flash.remove(&address);
        }
    }

    fn read_register(&mut self, offset: u64) -> u32 {
        if offset == Ready::OFFSET {
            self.ready_polls += 1;
            if self.stuck || self.stalled() {
                return 0;
            }
            if self.polls_until_ready > 0 {
                self.polls_until_ready -= 1;
                return 0;
            }
            return 1;
        }

        if offset == Config::OFFSET {
            return self.config;
        }

        0
    }

    fn stalled(&self) -> bool {
        if self.flash_write_stalled {
            return true;
        }
        match (self.stall_on, self.register_writes.last()) {
            (Some(stall_offset), Some((last_offset, _))) => stall_offset == *last_offset,
            _ => false,
        }
    }

    fn write_register(&mut self, offset: u64, value: u32) {
        self.register_writes.push((offset, value));
        self.start_operation();

        match offset {
            Config::OFFSET => {
                self.config = value;
                self.flash_write_stalled = false;
            }
            ErasePage::OFFSET => {
                let address = ErasePage::from(value).address() as u64;
                match self.region_of(address) {
                    Some((RegionKind::Code, _)) if self.is_erase_enabled() => {
                        let start = address - address % self.page_size;
                        self.erase_range(start..start + self.page_size);
                    }
                    Some((RegionKind::Code, _)) => self
                        .violations
                        .push(format!("page erase of {address:#010x} outside erase mode")),
                    _ => self
                        .violations
                        .push(format!("page erase of {address:#010x}, which is no code page")),
                }
            }
            EraseAll::OFFSET if EraseAll::from(value).erase() => {
                if self.is_erase_enabled() {
                    self.flash.clear();
                } else {
                    self.violations.push("erase all outside erase mode".to_string());
                }
            }
            EraseUicr::OFFSET if EraseUicr::from(value).erase() => {
                if self.is_erase_enabled() {
                    let config_ranges: Vec<Range<u64>> = self
                        .regions
                        .iter()
                        .filter(|(kind, _)| *kind == RegionKind::Config)
                        .map(|(_, range)| range.clone())
                        .collect();
                    for range in config_ranges {
                        self.erase_range(range);
                    }
                } else {
                    self.violations.push("UICR erase outside erase mode".to_string());
                }
            }
            _ => {}
        }
    }

    fn write_flash(&mut self, address: u64, value: u32) {
        if self.mode() != Some(NvmcMode::WriteEnabled) {
            self.violations
                .push(format!("flash write to {address:#010x} outside write mode"));
            return;
        }

        self.start_operation();
        self.flash_write_stalled = self.stall_on_flash_write;
        let current = self.flash_word(address);
        self.flash.insert(address, current & value);
    }

    fn nvmc_offset(&self, address: u64) -> Option<u64> {
        (self.nvmc_base..self.nvmc_base + PERIPHERAL_SIZE)
            .contains(&address)
            .then(|| address - self.nvmc_base)
    }
}

impl MemoryInterface for FakeNvmc {
    fn read_32(&mut self, address: u64, data: &mut [u32]) -> Result<(), Error> {
        check_alignment(address, 4)?;

        for (index, word) in data.iter_mut().enumerate() {
            let address = address + 4 * index as u64;

            *word = if let Some(offset) = self.nvmc_offset(address) {
                self.read_register(offset)
            } else if let Some(value) = self.ficr.get(&address) {
                *value
            } else if self.region_of(address).is_some() {
                self.flash_word(address)
            } else {
                return Err(Error::UnmappedAddress(address));
            };
        }

        Ok(())
    }

    fn write_32(&mut self, address: u64, data: &[u32]) -> Result<(), Error> {
        check_alignment(address, 4)?;

        for (index, value) in data.iter().enumerate() {
            let address = address + 4 * index as u64;

            if let Some(offset) = self.nvmc_offset(address) {
                self.write_register(offset, *value);
            } else if self.region_of(address).is_some() {
                self.write_flash(address, *value);
            } else {
                return Err(Error::UnmappedAddress(address));
            }
        }

        Ok(())
    }
}
