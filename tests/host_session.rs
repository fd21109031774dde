//! Host protocol sessions driven end to end over an in-memory stream

use picomod::device::{input_queue, InputEvent, Navigation};
use picomod::hardware::console::HardwareCall;
use picomod::model::{ButtonState, MidiChannel, OutputLine, Switch};
use picomod::protocol::link::{handle_client, HostRequest, HostSessions};
use picomod::protocol::FirmwareInfo;
use picomod::store::layout::STORE_CAPACITY;
use picomod::store::{ConfigStore, MemoryStore};
use picomod::{Device, Hardware};
use serde_json::{json, Value};
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, WriteHalf};
use tokio::sync::mpsc;

struct Host {
    lines: Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl Host {
    async fn send(&mut self, line: &str) -> String {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .unwrap();
        self.lines.next_line().await.unwrap().expect("reply line")
    }
}

/// Start a device loop and one client session; returns the host end and the
/// loop task, which yields the device once the host disconnects
fn start() -> (Host, String, tokio::task::JoinHandle<Device<MemoryStore>>) {
    let store = ConfigStore::new(MemoryStore::erased(STORE_CAPACITY)).unwrap();
    let (hardware, _probe) = Hardware::emulated(4);
    let mut device = Device::start(store, hardware).unwrap();

    let mut sessions = HostSessions::new(FirmwareInfo::new("2.1"));
    let greeting = sessions.announcement(&device).unwrap();

    let (tx, mut rx) = mpsc::channel::<HostRequest>(8);
    let (host_end, device_end) = duplex(4096);
    let (reader, writer) = tokio::io::split(device_end);
    tokio::spawn(handle_client(1, reader, writer, tx, Some(greeting.clone())));

    let device_loop = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            sessions.handle(&mut device, request);
        }
        device
    });

    let (host_read, writer) = tokio::io::split(host_end);
    let host = Host {
        lines: BufReader::new(host_read).lines(),
        writer,
    };
    (host, greeting, device_loop)
}

const PRESET: &str = r#"{"index":5,"id":77,"expValue":10,"switch1State":false,"switch2State":false,
"bypassRelayState":0,"auxRelayState":0,"analogSwitchState":0,"numActions":2,"actions":[
{"trigger":{"type":10},"type":2,"event":{"target":0,"value":1}},
{"trigger":{"type":0,"value":1},"type":0,"event":{"channel":2,"type":176,"data1":7,"data2":100}}]}"#;

#[tokio::test]
async fn test_greeting_matches_receive_global() {
    let (mut host, greeting, _device_loop) = start();

    let first = host.lines.next_line().await.unwrap().unwrap();
    assert_eq!(first, greeting);

    let global: Value = serde_json::from_str(&host.send("receiveGlobal").await).unwrap();
    assert_eq!(global, serde_json::from_str::<Value>(&greeting).unwrap());
    assert_eq!(global["hwVersion"], json!("2.1"));
    assert_eq!(global["fwVersion"], json!(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn test_edit_session() {
    let (mut host, _greeting, device_loop) = start();
    host.lines.next_line().await.unwrap();

    assert_eq!(host.send("sendGlobal").await, "ok");
    assert_eq!(
        host.send(r#"{"deviceName":"Board","midiChannel":3}"#).await,
        "ok"
    );

    assert_eq!(host.send("sendPreset").await, "ok");
    assert_eq!(host.send(PRESET.replace('\n', "").as_str()).await, "ok");

    // A rejected payload returns to Ready, so the next line is a command again
    assert_eq!(host.send("sendPreset").await, "ok");
    assert_eq!(host.send(r#"{"index":5}"#).await, "error");
    assert!(host.send("receivePreset").await.starts_with('{'));

    drop(host);
    let mut device = device_loop.await.unwrap();

    assert_eq!(device.global().device_name.as_str(), "Board");
    assert_eq!(device.global().midi_channel, MidiChannel::Channel(3));
    assert_eq!(device.current_preset(), 0);

    let stored = device.store().load_preset(5).unwrap();
    assert_eq!(stored.id, 77);
    assert_eq!(stored.num_actions(), 2);

    // Navigating onto the written slot fires its EnterBank action
    let (events, mut rx) = input_queue(4);
    assert!(events.push(InputEvent::Navigate(Navigation::Goto(5))));
    assert!(events.push(InputEvent::Switch {
        switch: Switch::One,
        state: ButtonState::Pressed,
    }));
    assert_eq!(device.drain(&mut rx), 2);

    assert_eq!(device.current_preset(), 5);
    assert!(device.active_preset().bypass_relay_state);
    assert!(device.active_preset().switch1_state);
}

#[tokio::test]
async fn test_written_preset_drives_outputs() {
    let store = ConfigStore::new(MemoryStore::erased(STORE_CAPACITY)).unwrap();
    let (hardware, probe) = Hardware::emulated(4);
    let mut device = Device::start(store, hardware).unwrap();
    let mut sessions = HostSessions::new(FirmwareInfo::new("1.0"));
    probe.take();

    let (tx, mut rx) = mpsc::channel::<HostRequest>(8);
    let (mut host_end, device_end) = duplex(4096);
    let (reader, writer) = tokio::io::split(device_end);
    let client = tokio::spawn(handle_client(9, reader, writer, tx, None));

    let payload = PRESET
        .replace('\n', "")
        .replace("\"index\":5", "\"index\":0")
        .replace("\"bypassRelayState\":0", "\"bypassRelayState\":1");
    host_end
        .write_all(format!("sendPreset\n{}\n", payload).as_bytes())
        .await
        .unwrap();
    host_end.shutdown().await.unwrap();

    while let Some(request) = rx.recv().await {
        sessions.handle(&mut device, request);
    }
    client.await.unwrap().unwrap();
    assert!(sessions.is_empty());

    // Slot 0 is active, so the new contents took over and drove the outputs
    assert_eq!(device.active_preset().id, 77);
    assert_eq!(probe.output_level(OutputLine::BypassRelay), Some(true));
    assert_eq!(probe.output_level(OutputLine::AuxRelay), Some(false));
    assert_eq!(probe.expression_writes(), vec![10]);
    probe.take();

    let (events, mut input) = input_queue(2);
    events.push(InputEvent::Switch {
        switch: Switch::One,
        state: ButtonState::Pressed,
    });
    device.drain(&mut input);

    let sent = probe.midi_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!((sent[0].channel, sent[0].data1, sent[0].data2), (1, 7, 100));
    assert!(!probe
        .calls()
        .iter()
        .any(|call| matches!(call, HardwareCall::Output(..))));
}
