//! Power sequencing for the two amplifier endpoints
//!
//! Power-up writes the bypass sequence to link 0, then to link 1. Both
//! operations take the [`Hardware`] state by `&mut`, so the caller holds the
//! device's hardware lock for the whole sequence and can update state guarded
//! alongside it before releasing the lock. The sequence is fail-fast and not
//! transactional:
//! - the first failing write aborts the remaining writes
//! - writes that already landed are not rolled back
//! - the power flag is only set after all writes succeeded
//!
//! Power-down clears the power flag without touching the chip.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::bus::I2cTarget;
use crate::error::{DriverError, Result};
use crate::link::I2cLink;
use crate::registers::{RegisterSetting, BYPASS_SEQUENCE};
use crate::resources::I2C_CONNECTION_COUNT;

/// State guarded by the hardware lock: both links and the power flag
pub struct Hardware<T> {
    links: [Option<I2cLink<T>>; I2C_CONNECTION_COUNT],
    powered_on: bool,
    power_cycles: u32,
}

impl<T: I2cTarget> Hardware<T> {
    pub fn new() -> Self {
        Self {
            links: [None, None],
            powered_on: false,
            power_cycles: 0,
        }
    }

    /// Track an opened link in `slot`
    pub(crate) fn install_link(&mut self, slot: usize, link: I2cLink<T>) {
        match self.links.get_mut(slot) {
            Some(entry) => *entry = Some(link),
            None => log::error!("no link slot {} for {}", slot, link.path()),
        }
    }

    pub fn link(&self, slot: usize) -> Option<&I2cLink<T>> {
        self.links.get(slot).and_then(Option::as_ref)
    }

    /// True once every link slot holds an open link
    pub fn links_open(&self) -> bool {
        self.links
            .iter()
            .all(|slot| slot.as_ref().is_some_and(I2cLink::is_open))
    }

    /// Close and forget whatever links were opened. Unopened slots are skipped.
    pub fn close_links(&mut self) {
        for slot in self.links.iter_mut() {
            if let Some(mut link) = slot.take() {
                link.close();
            }
        }
        self.powered_on = false;
    }

    pub fn is_powered_on(&self) -> bool {
        self.powered_on
    }

    /// Number of completed power-on sequences
    pub fn power_cycles(&self) -> u32 {
        self.power_cycles
    }
}

impl<T: I2cTarget> Default for Hardware<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Issues the power-up register sequence on both links
#[derive(Debug, Clone)]
pub struct PowerSequencer {
    sequence: Vec<RegisterSetting>,
    write_timeout: Option<Duration>,
}

impl PowerSequencer {
    pub fn new(sequence: Vec<RegisterSetting>, write_timeout: Option<Duration>) -> Self {
        Self {
            sequence,
            write_timeout,
        }
    }

    /// Settings written to each link, in order
    pub fn sequence(&self) -> &[RegisterSetting] {
        &self.sequence
    }

    /// Put both endpoints into bypass mode
    ///
    /// Returns the first failure unchanged; the power flag is left cleared
    /// in that case.
    pub fn power_on<T: I2cTarget>(&self, hw: &mut Hardware<T>) -> Result<()> {
        hw.powered_on = false;

        for (slot, link) in hw.links.iter_mut().enumerate() {
            let link = link.as_mut().ok_or_else(|| DriverError::LinkClosed {
                path: format!("link{}", slot),
            })?;

            for setting in &self.sequence {
                link.write_setting(*setting, self.write_timeout)?;
            }
        }

        hw.powered_on = true;
        hw.power_cycles += 1;
        log::info!("power-on sequence complete on {} links", I2C_CONNECTION_COUNT);
        Ok(())
    }

    /// Mark the device powered off. No register writes are issued.
    pub fn power_off<T: I2cTarget>(&self, hw: &mut Hardware<T>) {
        hw.powered_on = false;
        log::debug!("power flag cleared");
    }
}

impl Default for PowerSequencer {
    fn default() -> Self {
        Self::new(BYPASS_SEQUENCE.to_vec(), None)
    }
}

/// Lock `mutex`, recovering the guard if a previous holder panicked.
///
/// Guarded state is only updated after the fallible calls it depends on
/// have returned, so a poisoned lock still holds consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
