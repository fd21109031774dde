//! Emulated outputs that log what the device would do
//!
//! Every call is traced and recorded in a shared [`Journal`], which tests and
//! the interactive console read through a [`Probe`].

use super::{LedStrip, MidiOut, Step, SwitchedOutputs};
use crate::midi::{format_hex, MidiMessage};
use crate::model::OutputLine;
use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

/// One collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareCall {
    Midi(MidiMessage),
    ExpressionWrite(u16),
    ExpressionStep(Step),
    Output(OutputLine, bool),
    Pixel(usize, u32),
    Show,
}

/// Calls kept by a default journal
pub const JOURNAL_CAPACITY: usize = 1024;

/// Record of the most recent collaborator calls, shared by the emulated outputs
///
/// Holds at most `capacity` calls; the oldest are evicted first.
#[derive(Debug, Clone)]
pub struct Journal {
    calls: Arc<Mutex<VecDeque<HardwareCall>>>,
    capacity: usize,
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_capacity(JOURNAL_CAPACITY)
    }
}

impl Journal {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            calls: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(JOURNAL_CAPACITY)))),
            capacity,
        }
    }

    pub fn record(&self, call: HardwareCall) {
        if self.capacity == 0 {
            return;
        }
        let mut calls = self.calls.lock();
        if calls.len() == self.capacity {
            calls.pop_front();
        }
        calls.push_back(call);
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Read side of the journal
#[derive(Debug, Clone)]
pub struct Probe {
    journal: Journal,
}

impl Probe {
    pub(crate) fn new(journal: Journal) -> Self {
        Self { journal }
    }

    /// Calls still held by the journal, oldest first
    pub fn calls(&self) -> Vec<HardwareCall> {
        self.journal.calls.lock().iter().cloned().collect()
    }

    /// Drain the journal
    pub fn take(&self) -> Vec<HardwareCall> {
        self.journal.calls.lock().drain(..).collect()
    }

    pub fn midi_sent(&self) -> Vec<MidiMessage> {
        self.journal
            .calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                HardwareCall::Midi(message) => Some(*message),
                _ => None,
            })
            .collect()
    }

    pub fn expression_writes(&self) -> Vec<u16> {
        self.journal
            .calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                HardwareCall::ExpressionWrite(level) => Some(*level),
                _ => None,
            })
            .collect()
    }

    /// Level most recently driven onto `line`
    pub fn output_level(&self, line: OutputLine) -> Option<bool> {
        self.journal
            .calls
            .lock()
            .iter()
            .rev()
            .find_map(|call| match call {
                HardwareCall::Output(l, on) if *l == line => Some(*on),
                _ => None,
            })
    }
}

pub struct ConsoleMidi {
    journal: Journal,
    sent: u64,
}

impl ConsoleMidi {
    pub fn new(journal: Journal) -> Self {
        Self { journal, sent: 0 }
    }
}

impl MidiOut for ConsoleMidi {
    fn send(&mut self, message: &MidiMessage) -> Result<()> {
        self.sent += 1;
        info!(
            "[{}] MIDI out → {} | {} [#{}]",
            timestamp(),
            message,
            format_hex(&message.encode()),
            self.sent
        );
        self.journal.record(HardwareCall::Midi(*message));
        Ok(())
    }
}

/// Bypass relay, aux relay and analog switch
pub struct ConsoleOutputs {
    journal: Journal,
    levels: [bool; 3],
}

impl ConsoleOutputs {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            levels: [false; 3],
        }
    }

    fn slot(line: OutputLine) -> usize {
        match line {
            OutputLine::BypassRelay => 0,
            OutputLine::AuxRelay => 1,
            OutputLine::AnalogSwitch => 2,
        }
    }
}

impl SwitchedOutputs for ConsoleOutputs {
    fn set(&mut self, line: OutputLine, on: bool) -> Result<()> {
        let slot = &mut self.levels[Self::slot(line)];
        if *slot != on {
            info!(
                "[{}] {} {}",
                timestamp(),
                line,
                if on { "ON" } else { "OFF" }
            );
        } else {
            debug!("{} already {}", line, if on { "on" } else { "off" });
        }
        *slot = on;
        self.journal.record(HardwareCall::Output(line, on));
        Ok(())
    }
}

pub struct ConsoleLeds {
    journal: Journal,
    staged: Vec<u32>,
    shown: Vec<u32>,
}

impl ConsoleLeds {
    pub fn new(len: usize, journal: Journal) -> Self {
        Self {
            journal,
            staged: vec![0; len],
            shown: vec![0; len],
        }
    }
}

impl LedStrip for ConsoleLeds {
    fn len(&self) -> usize {
        self.staged.len()
    }

    fn set_pixel(&mut self, index: usize, colour: u32) -> Result<()> {
        let Some(pixel) = self.staged.get_mut(index) else {
            bail!("pixel {} beyond strip of {}", index, self.shown.len());
        };
        *pixel = colour & 0x00FF_FFFF;
        self.journal.record(HardwareCall::Pixel(index, *pixel));
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        for (index, (shown, staged)) in self.shown.iter_mut().zip(&self.staged).enumerate() {
            if shown != staged {
                info!("[{}] LED {} → #{:06X}", timestamp(), index, staged);
                *shown = *staged;
            }
        }
        self.journal.record(HardwareCall::Show);
        Ok(())
    }
}
