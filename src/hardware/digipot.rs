//! Emulated MCP41xx digital potentiometer
//!
//! Builds the SPI frames the real part expects and tracks the wiper position.
//! Volatile wiper 0 only.

use super::console::{HardwareCall, Journal};
use super::{ExpressionControl, Step};
use crate::EXPRESSION_MAX;
use anyhow::{bail, Result};
use tracing::{info, trace};

const VOLATILE_WIPER_0: u16 = 0x00;

const CMD_WRITE: u16 = 0b00;
const CMD_INCREMENT: u8 = 0b01;
const CMD_DECREMENT: u8 = 0b10;

/// 16-bit write frame: address, command, 9 data bits
pub fn write_frame(level: u16) -> u16 {
    (VOLATILE_WIPER_0 << 12) | (CMD_WRITE << 10) | (level & 0x1FF)
}

/// 8-bit increment/decrement frame
pub fn step_frame(step: Step) -> u8 {
    let command = match step {
        Step::Up => CMD_INCREMENT,
        Step::Down => CMD_DECREMENT,
    };
    ((VOLATILE_WIPER_0 as u8) << 4) | (command << 2)
}

pub struct VirtualDigipot {
    journal: Journal,
    wiper: u16,
}

impl VirtualDigipot {
    pub fn new(journal: Journal) -> Self {
        Self { journal, wiper: 0 }
    }

    pub fn wiper(&self) -> u16 {
        self.wiper
    }

    fn step(&mut self, step: Step) {
        let frame = step_frame(step);
        // The part saturates at both ends
        self.wiper = match step {
            Step::Up => (self.wiper + 1).min(EXPRESSION_MAX),
            Step::Down => self.wiper.saturating_sub(1),
        };
        trace!("digipot frame {:#04X}", frame);
        info!("Expression {} → {}", step, self.wiper);
        self.journal.record(HardwareCall::ExpressionStep(step));
    }
}

impl ExpressionControl for VirtualDigipot {
    fn write(&mut self, level: u16) -> Result<()> {
        if level > EXPRESSION_MAX {
            bail!("expression level {} out of range (0..={})", level, EXPRESSION_MAX);
        }
        let frame = write_frame(level);
        self.wiper = level;
        trace!("digipot frame {:#06X}", frame);
        info!("Expression → {}", level);
        self.journal.record(HardwareCall::ExpressionWrite(level));
        Ok(())
    }

    fn increment(&mut self) -> Result<()> {
        self.step(Step::Up);
        Ok(())
    }

    fn decrement(&mut self) -> Result<()> {
        self.step(Step::Down);
        Ok(())
    }
}
