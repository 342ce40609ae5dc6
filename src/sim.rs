//! In-memory I2C transport
//!
//! [`SimulatedBus`] stands in for the platform transport when no hardware
//! is present: the host binary drives the driver against it, and the tests
//! use it to inject faults and inspect the exact bytes written. Every open,
//! write and close is recorded with a wall-clock timestamp.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::bus::{BusFault, I2cBus, I2cTarget};
use crate::power::lock;

/// One recorded bus transaction
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Opened {
        path: String,
        at: DateTime<Local>,
    },
    Write {
        path: String,
        bytes: Vec<u8>,
        at: DateTime<Local>,
    },
    WriteFailed {
        path: String,
        bytes: Vec<u8>,
        fault: BusFault,
        at: DateTime<Local>,
    },
    Closed {
        path: String,
        at: DateTime<Local>,
    },
}

impl BusEvent {
    pub fn path(&self) -> &str {
        match self {
            BusEvent::Opened { path, .. }
            | BusEvent::Write { path, .. }
            | BusEvent::WriteFailed { path, .. }
            | BusEvent::Closed { path, .. } => path,
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusEvent::Opened { path, at } => {
                write!(f, "{} OPEN  {}", at.format("%H:%M:%S%.3f"), path)
            }
            BusEvent::Write { path, bytes, at } => {
                write!(f, "{} WRITE {} [{}]", at.format("%H:%M:%S%.3f"), path, hex(bytes))
            }
            BusEvent::WriteFailed {
                path,
                bytes,
                fault,
                at,
            } => write!(
                f,
                "{} FAIL  {} [{}] ({})",
                at.format("%H:%M:%S%.3f"),
                path,
                hex(bytes),
                fault
            ),
            BusEvent::Closed { path, at } => {
                write!(f, "{} CLOSE {}", at.format("%H:%M:%S%.3f"), path)
            }
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    events: Vec<BusEvent>,
    open: Vec<String>,
    refused: HashMap<String, BusFault>,
    // (absolute attempt number, fault)
    pending_fault: Option<(usize, BusFault)>,
    attempts: usize,
    write_delay: Option<Duration>,
}

/// Shared handle to a simulated bus. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every open of `path` fail with `fault`
    pub fn refuse_open(&self, path: &str, fault: BusFault) {
        lock(&self.state).refused.insert(path.to_string(), fault);
    }

    /// Undo [`refuse_open`](Self::refuse_open) for `path`
    pub fn allow_open(&self, path: &str) {
        lock(&self.state).refused.remove(path);
    }

    /// Fail the `n`th write attempt counted from now (1-based)
    pub fn fail_write(&self, n: usize, fault: BusFault) {
        let mut state = lock(&self.state);
        let at = state.attempts + n.max(1);
        state.pending_fault = Some((at, fault));
    }

    /// Delay every write by `delay`, as a slow bus would
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        lock(&self.state).write_delay = delay;
    }

    pub fn events(&self) -> Vec<BusEvent> {
        lock(&self.state).events.clone()
    }

    /// Successful writes as (path, bytes), in bus order
    pub fn writes(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.state)
            .events
            .iter()
            .filter_map(|event| match event {
                BusEvent::Write { path, bytes, .. } => Some((path.clone(), bytes.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of write calls made, failed ones included
    pub fn write_attempts(&self) -> usize {
        lock(&self.state).attempts
    }

    /// Paths currently open
    pub fn open_targets(&self) -> Vec<String> {
        lock(&self.state).open.clone()
    }

    /// Formatted event log, one line per transaction
    pub fn transcript(&self) -> Vec<String> {
        lock(&self.state)
            .events
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn clear_events(&self) {
        lock(&self.state).events.clear();
    }
}

impl I2cBus for SimulatedBus {
    type Target = SimulatedTarget;

    fn open(&self, path: &str) -> Result<SimulatedTarget, BusFault> {
        let mut state = lock(&self.state);
        if let Some(fault) = state.refused.get(path) {
            return Err(fault.clone());
        }

        state.open.push(path.to_string());
        state.events.push(BusEvent::Opened {
            path: path.to_string(),
            at: Local::now(),
        });

        Ok(SimulatedTarget {
            path: path.to_string(),
            state: Arc::clone(&self.state),
        })
    }
}

/// Target opened on a [`SimulatedBus`]
#[derive(Debug)]
pub struct SimulatedTarget {
    path: String,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedTarget {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl I2cTarget for SimulatedTarget {
    fn write(&mut self, bytes: &[u8], timeout: Option<Duration>) -> Result<(), BusFault> {
        let (fault, delay) = {
            let mut state = lock(&self.state);
            state.attempts += 1;
            let attempt = state.attempts;
            let due = matches!(&state.pending_fault, Some((at, _)) if *at == attempt);
            let fault = if due {
                state.pending_fault.take().map(|(_, f)| f)
            } else {
                None
            };
            (fault, state.write_delay)
        };

        // The bus itself does not serialize callers; the delay is spent
        // outside the state lock.
        let fault = match (fault, delay) {
            (Some(fault), _) => Some(fault),
            (None, Some(delay)) => match timeout {
                Some(limit) if delay > limit => {
                    thread::sleep(limit);
                    Some(BusFault::Timeout(limit))
                }
                _ => {
                    thread::sleep(delay);
                    None
                }
            },
            (None, None) => None,
        };

        let mut state = lock(&self.state);
        let at = Local::now();
        match fault {
            Some(fault) => {
                state.events.push(BusEvent::WriteFailed {
                    path: self.path.clone(),
                    bytes: bytes.to_vec(),
                    fault: fault.clone(),
                    at,
                });
                Err(fault)
            }
            None => {
                state.events.push(BusEvent::Write {
                    path: self.path.clone(),
                    bytes: bytes.to_vec(),
                    at,
                });
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        let mut state = lock(&self.state);
        if let Some(index) = state.open.iter().position(|p| *p == self.path) {
            state.open.remove(index);
        }
        state.events.push(BusEvent::Closed {
            path: self.path.clone(),
            at: Local::now(),
        });
    }
}
