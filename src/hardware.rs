//! Collaborators driven by the dispatch engine
//!
//! The engine only sees these traits. The host build wires MIDI to a `midir`
//! port and emulates the rest in [`console`] and [`digipot`].

pub mod console;
pub mod digipot;
pub mod midi_port;

use crate::midi::MidiMessage;
use crate::model::OutputLine;
use anyhow::Result;
use std::fmt;

pub trait MidiOut: Send {
    fn send(&mut self, message: &MidiMessage) -> Result<()>;
}

/// Expression output (a 257-step digital potentiometer)
pub trait ExpressionControl: Send {
    /// Set the wiper to `level` (0..=256)
    fn write(&mut self, level: u16) -> Result<()>;

    fn increment(&mut self) -> Result<()>;

    fn decrement(&mut self) -> Result<()>;
}

/// Relays and the analog switch
pub trait SwitchedOutputs: Send {
    fn set(&mut self, line: OutputLine, on: bool) -> Result<()>;
}

pub trait LedStrip: Send {
    /// Number of pixels on the strip
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stage `colour` (0xRRGGBB) for pixel `index`; visible after [`show`](Self::show)
    fn set_pixel(&mut self, index: usize, colour: u32) -> Result<()>;

    fn show(&mut self) -> Result<()>;
}

/// Direction of a single expression step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Up => write!(f, "up"),
            Step::Down => write!(f, "down"),
        }
    }
}

/// Handles to every collaborator the engine drives
pub struct Hardware {
    pub midi: Box<dyn MidiOut>,
    pub expression: Box<dyn ExpressionControl>,
    pub outputs: Box<dyn SwitchedOutputs>,
    pub leds: Box<dyn LedStrip>,
}

impl Hardware {
    /// Fully emulated hardware plus a probe onto everything it was asked to do
    pub fn emulated(led_count: usize) -> (Self, console::Probe) {
        let journal = console::Journal::default();
        let hardware = Self::with_journal(led_count, journal.clone());
        (hardware, console::Probe::new(journal))
    }

    /// Emulated hardware that only logs, keeping no call history
    pub fn logged(led_count: usize) -> Self {
        Self::with_journal(led_count, console::Journal::with_capacity(0))
    }

    fn with_journal(led_count: usize, journal: console::Journal) -> Self {
        Self {
            midi: Box::new(console::ConsoleMidi::new(journal.clone())),
            expression: Box::new(digipot::VirtualDigipot::new(journal.clone())),
            outputs: Box::new(console::ConsoleOutputs::new(journal.clone())),
            leds: Box::new(console::ConsoleLeds::new(led_count, journal)),
        }
    }

    /// Replace the MIDI collaborator, keeping the rest
    pub fn with_midi(mut self, midi: Box<dyn MidiOut>) -> Self {
        self.midi = midi;
        self
    }
}

impl fmt::Debug for Hardware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hardware")
            .field("leds", &self.leds.len())
            .finish_non_exhaustive()
    }
}
