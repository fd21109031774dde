//! Host synchronization protocol
//!
//! Line-oriented request/response exchange with the configuration app. A
//! session is a small state machine:
//!
//! ```text
//! Ready --sendGlobal--> AwaitingGlobalPayload --JSON--> Ready
//! Ready --sendPreset--> AwaitingPresetPayload --JSON--> Ready
//! Ready --receiveGlobal / receivePreset--> Ready (JSON reply)
//! ```
//!
//! Any failure answers `error` and returns to `Ready` with the store untouched.

pub mod link;
pub mod wire;

use crate::device::Device;
use crate::error::ProtocolError;
use crate::store::ByteStore;
use crate::DEFAULT_EXPRESSION;
use std::fmt;
use tracing::{debug, info, warn};
use wire::{GlobalConfigPacket, GlobalConfigUpdate, PresetPacket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolState {
    #[default]
    Ready,
    AwaitingGlobalPayload,
    AwaitingPresetPayload,
}

/// One line sent back to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Error,
    Json(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => f.write_str("ok"),
            Reply::Error => f.write_str("error"),
            Reply::Json(json) => f.write_str(json),
        }
    }
}

/// Version labels reported in the global config document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub hw_version: String,
    pub fw_version: String,
}

impl FirmwareInfo {
    pub fn new(hw_version: impl Into<String>) -> Self {
        Self {
            hw_version: hw_version.into(),
            fw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Protocol state of one host connection
#[derive(Debug, Clone)]
pub struct HostProtocol {
    state: ProtocolState,
    info: FirmwareInfo,
}

impl HostProtocol {
    pub fn new(info: FirmwareInfo) -> Self {
        Self {
            state: ProtocolState::Ready,
            info,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Handle one line from the host
    pub fn handle_line<S: ByteStore>(&mut self, device: &mut Device<S>, line: &str) -> Reply {
        let line = line.trim_end_matches(['\r', '\n']);
        let state = std::mem::take(&mut self.state);

        let result = match state {
            ProtocolState::Ready => self.command(device, line),
            ProtocolState::AwaitingGlobalPayload => {
                apply_global(device, line).map(|()| Reply::Ok)
            }
            ProtocolState::AwaitingPresetPayload => {
                apply_preset(device, line).map(|()| Reply::Ok)
            }
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Host request rejected in {:?}: {}", state, e);
                self.state = ProtocolState::Ready;
                Reply::Error
            }
        }
    }

    /// Answer a line the transport refused to buffer
    ///
    /// A pending payload is abandoned, as for any malformed line.
    pub fn reject_oversized(&mut self) -> Reply {
        warn!("Host line too long in {:?}, dropped", self.state);
        self.state = ProtocolState::Ready;
        Reply::Error
    }

    /// The global config document, also sent unsolicited after boot
    pub fn announce<S: ByteStore>(&self, device: &Device<S>) -> Result<String, ProtocolError> {
        let packet =
            GlobalConfigPacket::new(device.global(), &self.info.hw_version, &self.info.fw_version);
        Ok(serde_json::to_string(&packet)?)
    }

    fn command<S: ByteStore>(
        &mut self,
        device: &mut Device<S>,
        line: &str,
    ) -> Result<Reply, ProtocolError> {
        debug!("Host command: {:?}", line);
        match line {
            "sendGlobal" => {
                self.state = ProtocolState::AwaitingGlobalPayload;
                Ok(Reply::Ok)
            }
            "sendPreset" => {
                self.state = ProtocolState::AwaitingPresetPayload;
                Ok(Reply::Ok)
            }
            "receiveGlobal" => Ok(Reply::Json(self.announce(device)?)),
            "receivePreset" => {
                let packet = PresetPacket::new(device.current_preset(), device.active_preset());
                Ok(Reply::Json(serde_json::to_string(&packet)?))
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

fn apply_global<S: ByteStore>(device: &mut Device<S>, line: &str) -> Result<(), ProtocolError> {
    let update: GlobalConfigUpdate = serde_json::from_str(line)?;
    let (name, channel) = update.validate()?;
    device.update_global(Some(name), Some(channel))?;
    Ok(())
}

fn apply_preset<S: ByteStore>(device: &mut Device<S>, line: &str) -> Result<(), ProtocolError> {
    let packet: PresetPacket = serde_json::from_str(line)?;
    let index = packet.index;

    let slot_expression = packet.exp_value.map_or_else(
        || {
            device
                .store()
                .load_preset(index)
                .map(|p| p.expression_value)
                .unwrap_or(DEFAULT_EXPRESSION)
        },
        |level| level,
    );
    let preset = packet.into_preset(slot_expression)?;

    device.write_preset(index, &preset)?;
    info!(index, "Host preset stored");
    Ok(())
}
