//! Interactive footswitch console
//!
//! Stands in for the physical edge sources: each line becomes one or more
//! [`InputEvent`]s pushed into the input queue.

use crate::device::{InputEvent, InputSender, Navigation};
use crate::hardware::Step;
use crate::midi::MidiMessage;
use crate::model::{ButtonState, GpioPin, Switch};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use thiserror::Error;
use tracing::debug;

const HELP: &str = "\
press|release|tap <1|2>      footswitch edge
gpio <1-7> press|release     GPIO edge
cc <number> <value> [ch]     inbound control change (channel 1-16, default 1)
pc <program> [ch]            inbound program change
next | prev | goto <n>       preset navigation
exp up|down                  step the expression digipot
save                         persist the active preset
help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Input(Vec<InputEvent>),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("{name} must be {range}, got '{value}'")]
    OutOfRange {
        name: &'static str,
        range: &'static str,
        value: String,
    },
}

fn number<T: std::str::FromStr + PartialOrd>(
    value: &str,
    name: &'static str,
    range: &'static str,
    min: T,
    max: T,
) -> Result<T, ParseError> {
    value
        .parse::<T>()
        .ok()
        .filter(|n| *n >= min && *n <= max)
        .ok_or_else(|| ParseError::OutOfRange {
            name,
            range,
            value: value.to_string(),
        })
}

fn switch(arg: Option<&str>) -> Result<Switch, ParseError> {
    let arg = arg.ok_or(ParseError::Usage("press|release|tap <1|2>"))?;
    arg.parse::<u8>()
        .ok()
        .and_then(Switch::from_number)
        .ok_or_else(|| ParseError::OutOfRange {
            name: "switch",
            range: "1 or 2",
            value: arg.to_string(),
        })
}

/// Zero-based channel from an optional 1-16 argument
fn channel(arg: Option<&str>) -> Result<u8, ParseError> {
    match arg {
        None => Ok(0),
        Some(arg) => number(arg, "channel", "1-16", 1u8, 16).map(|c| c - 1),
    }
}

fn data_byte(arg: &str, name: &'static str) -> Result<u8, ParseError> {
    number(arg, name, "0-127", 0u8, 127)
}

pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let command = words.next().ok_or(ParseError::Empty)?.to_lowercase();
    let args: Vec<&str> = words.collect();
    let arg = |i: usize| args.get(i).copied();

    let events = match command.as_str() {
        "help" | "?" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        "press" | "release" => {
            let state = if command == "press" {
                ButtonState::Pressed
            } else {
                ButtonState::Released
            };
            vec![InputEvent::Switch {
                switch: switch(arg(0))?,
                state,
            }]
        }
        "tap" => {
            let switch = switch(arg(0))?;
            vec![
                InputEvent::Switch {
                    switch,
                    state: ButtonState::Pressed,
                },
                InputEvent::Switch {
                    switch,
                    state: ButtonState::Released,
                },
            ]
        }
        "gpio" => {
            let (Some(pin), Some(edge)) = (arg(0), arg(1)) else {
                return Err(ParseError::Usage("gpio <1-7> press|release"));
            };
            let pin = number(pin, "pin", "1-7", 1u8, GpioPin::COUNT)?;
            let pin = GpioPin::new(pin).ok_or(ParseError::Usage("gpio <1-7> press|release"))?;
            let state = match edge {
                "press" => ButtonState::Pressed,
                "release" => ButtonState::Released,
                _ => return Err(ParseError::Usage("gpio <1-7> press|release")),
            };
            vec![InputEvent::Gpio { pin, state }]
        }
        "cc" => {
            let (Some(cc), Some(value)) = (arg(0), arg(1)) else {
                return Err(ParseError::Usage("cc <number> <value> [ch]"));
            };
            let message = MidiMessage::control_change(
                channel(arg(2))?,
                data_byte(cc, "controller")?,
                data_byte(value, "value")?,
            );
            vec![InputEvent::Midi(message)]
        }
        "pc" => {
            let program = arg(0).ok_or(ParseError::Usage("pc <program> [ch]"))?;
            let message =
                MidiMessage::program_change(channel(arg(1))?, data_byte(program, "program")?);
            vec![InputEvent::Midi(message)]
        }
        "next" => vec![InputEvent::Navigate(Navigation::Next)],
        "prev" | "previous" => vec![InputEvent::Navigate(Navigation::Previous)],
        "goto" => {
            let index = arg(0).ok_or(ParseError::Usage("goto <n>"))?;
            let index = index.parse::<usize>().map_err(|_| ParseError::OutOfRange {
                name: "preset",
                range: "a preset number",
                value: index.to_string(),
            })?;
            vec![InputEvent::Navigate(Navigation::Goto(index))]
        }
        "exp" => match arg(0) {
            Some("up") => vec![InputEvent::ExpressionStep(Step::Up)],
            Some("down") => vec![InputEvent::ExpressionStep(Step::Down)],
            _ => return Err(ParseError::Usage("exp up|down")),
        },
        "save" => vec![InputEvent::SaveActivePreset],
        other => return Err(ParseError::Unknown(other.to_string())),
    };

    Ok(Command::Input(events))
}

/// Read console lines until `quit`, end of input or Ctrl-C
///
/// Blocks the calling thread; run it with `spawn_blocking`.
pub fn run_console(events: InputSender) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("Footswitch console ready, 'help' lists commands");

    loop {
        match rl.readline("picomod> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match parse_command(line) {
                    Ok(Command::Input(batch)) => {
                        for event in batch {
                            debug!(?event, "Console input");
                            if !events.push(event) {
                                println!("dropped: {:?}", event);
                            }
                        }
                    }
                    Ok(Command::Help) => println!("{}", HELP),
                    Ok(Command::Quit) => break,
                    Err(e) => println!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
