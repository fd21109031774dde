//! MIDI ports through `midir`
//!
//! Ports are chosen by case-insensitive substring match on their name.

use super::MidiOut;
use crate::device::{InputEvent, InputSender};
use crate::midi::{format_hex, MidiMessage};
use anyhow::{anyhow, Context, Result};
use colored::*;
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::{debug, info, trace};

const CLIENT_NAME: &str = "picomod";

fn matches(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

/// Outbound MIDI on a system port
pub struct MidirOut {
    conn: MidiOutputConnection,
    port_name: String,
}

impl MidirOut {
    pub fn connect(pattern: &str) -> Result<Self> {
        let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;
        debug!("Found {} MIDI output ports", midi_out.port_count());

        let (port, port_name) = midi_out
            .ports()
            .into_iter()
            .find_map(|port| {
                let name = midi_out.port_name(&port).ok()?;
                matches(&name, pattern).then_some((port, name))
            })
            .ok_or_else(|| anyhow!("Output port '{}' not found", pattern))?;

        info!("Connecting to output port: {}", port_name);
        let conn = midi_out
            .connect(&port, CLIENT_NAME)
            .map_err(|e| anyhow!("Failed to connect to output port: {}", e))?;

        Ok(Self { conn, port_name })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl MidiOut for MidirOut {
    fn send(&mut self, message: &MidiMessage) -> Result<()> {
        let bytes = message.encode();
        self.conn
            .send(&bytes)
            .with_context(|| format!("Failed to send {} on {}", message, self.port_name))?;
        debug!("Sent: {} | {}", format_hex(&bytes), message);
        Ok(())
    }
}

/// Forward messages from the first input port matching `pattern` into the
/// input queue
///
/// The connection stays open for as long as the returned handle lives.
pub fn connect_input(pattern: &str, events: InputSender) -> Result<MidiInputConnection<()>> {
    let mut midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
    midi_in.ignore(midir::Ignore::All);
    debug!("Found {} MIDI input ports", midi_in.port_count());

    let (port, port_name) = midi_in
        .ports()
        .into_iter()
        .find_map(|port| {
            let name = midi_in.port_name(&port).ok()?;
            matches(&name, pattern).then_some((port, name))
        })
        .ok_or_else(|| anyhow!("Input port '{}' not found", pattern))?;

    info!("Connecting to input port: {}", port_name);
    midi_in
        .connect(
            &port,
            CLIENT_NAME,
            move |_stamp, data, _| forward_midi(&events, data),
            (),
        )
        .map_err(|e| anyhow!("Failed to connect to input port: {}", e))
}

/// Queue one raw input message; anything but channel voice is dropped
fn forward_midi(events: &InputSender, data: &[u8]) {
    match MidiMessage::parse(data) {
        Some(message) => {
            events.push(InputEvent::Midi(message));
        }
        None => trace!("Ignoring MIDI: {}", format_hex(data)),
    }
}

/// Print every MIDI port the system exposes
pub fn list_ports_formatted() -> Result<()> {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
    let inputs: Vec<String> = midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect();
    print_port_group("Input Ports:", &inputs);

    let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;
    let outputs: Vec<String> = midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect();
    print_port_group("Output Ports:", &outputs);

    println!();
    Ok(())
}

fn print_port_group(title: &str, names: &[String]) {
    println!("\n{}", title.bold());
    if names.is_empty() {
        println!("  {}", "none found".dimmed());
    }
    for (i, name) in names.iter().enumerate() {
        println!("  {} {}", format!("[{}]", i).green(), name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MessageKind;

    #[test]
    fn test_port_matching_ignores_case() {
        assert!(matches("USB MIDI Interface 1", "usb midi"));
        assert!(matches("Pico Mod", "PICO"));
        assert!(!matches("Launchpad", "pico"));
    }

    #[test]
    fn test_forwarded_input_reaches_queue() {
        let (events, mut rx) = crate::device::input_queue(4);
        forward_midi(&events, &[0xC2, 0x05]);
        forward_midi(&events, &[0xF8]);
        forward_midi(&events, &[0xB0, 0x07, 0x64]);

        assert!(matches!(
            rx.try_recv(),
            Ok(InputEvent::Midi(m)) if m.kind == MessageKind::ProgramChange && m.channel == 2 && m.data1 == 5
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(InputEvent::Midi(m)) if m.kind == MessageKind::ControlChange && m.data2 == 0x64
        ));
        assert!(rx.try_recv().is_err());
    }
}
