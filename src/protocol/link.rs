//! Transport for the host protocol
//!
//! Client tasks read lines and forward them as [`HostRequest`]s. The main loop
//! owns the device and a [`HostSessions`] table and answers each request through
//! its oneshot channel, so host writes are serialized with input dispatch.

use super::{FirmwareInfo, HostProtocol, Reply};
use crate::device::Device;
use crate::store::ByteStore;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::io;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Longest host line accepted, terminator included
pub const MAX_LINE_LEN: usize = 8192;

pub type ClientId = u64;

#[derive(Debug)]
pub enum HostRequest {
    Line {
        client: ClientId,
        line: String,
        reply: oneshot::Sender<Reply>,
    },
    /// The client sent a line longer than [`MAX_LINE_LEN`]
    Oversized {
        client: ClientId,
        reply: oneshot::Sender<Reply>,
    },
    Closed {
        client: ClientId,
    },
}

/// Protocol state per connected client
#[derive(Debug)]
pub struct HostSessions {
    info: FirmwareInfo,
    sessions: HashMap<ClientId, HostProtocol>,
}

impl HostSessions {
    pub fn new(info: FirmwareInfo) -> Self {
        Self {
            info,
            sessions: HashMap::new(),
        }
    }

    pub fn handle<S: ByteStore>(&mut self, device: &mut Device<S>, request: HostRequest) {
        match request {
            HostRequest::Line {
                client,
                line,
                reply,
            } => {
                let info = &self.info;
                let session = self
                    .sessions
                    .entry(client)
                    .or_insert_with(|| HostProtocol::new(info.clone()));
                let answer = session.handle_line(device, &line);
                if reply.send(answer).is_err() {
                    debug!(client, "Client went away before the reply");
                }
            }
            HostRequest::Oversized { client, reply } => {
                let info = &self.info;
                let session = self
                    .sessions
                    .entry(client)
                    .or_insert_with(|| HostProtocol::new(info.clone()));
                if reply.send(session.reject_oversized()).is_err() {
                    debug!(client, "Client went away before the reply");
                }
            }
            HostRequest::Closed { client } => {
                self.sessions.remove(&client);
            }
        }
    }

    /// Global config document for the boot announcement
    pub fn announcement<S: ByteStore>(&self, device: &Device<S>) -> Result<String> {
        HostProtocol::new(self.info.clone())
            .announce(device)
            .context("Failed to encode global config")
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Serve one client until it disconnects
///
/// `greeting` is written before the first request is read.
pub async fn handle_client<R, W>(
    client: ClientId,
    reader: R,
    mut writer: W,
    requests: mpsc::Sender<HostRequest>,
    greeting: Option<String>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Some(greeting) = greeting {
        writer.write_all(format!("{}\n", greeting).as_bytes()).await?;
        writer.flush().await?;
    }

    let mut reader = BufReader::new(reader);
    let result: Result<()> = async {
        while let Some(line) = read_host_line(&mut reader)
            .await
            .context("Failed to read from host")?
        {
            let (reply_tx, reply_rx) = oneshot::channel();
            let request = match line {
                HostLine::Line(line) => HostRequest::Line {
                    client,
                    line,
                    reply: reply_tx,
                },
                HostLine::TooLong => HostRequest::Oversized {
                    client,
                    reply: reply_tx,
                },
            };
            requests
                .send(request)
                .await
                .map_err(|_| anyhow!("Device loop stopped"))?;

            let reply = reply_rx.await.context("Device dropped the request")?;
            writer.write_all(format!("{}\n", reply).as_bytes()).await?;
            writer.flush().await?;
        }
        Ok(())
    }
    .await;

    let _ = requests.send(HostRequest::Closed { client }).await;
    result
}

#[derive(Debug, PartialEq, Eq)]
enum HostLine {
    Line(String),
    TooLong,
}

/// Read one line of at most [`MAX_LINE_LEN`] bytes, `None` at end of input
///
/// The remainder of an over-long line is read and discarded.
async fn read_host_line<R>(reader: &mut R) -> io::Result<Option<HostLine>>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_LEN as u64;
    let mut buf = Vec::new();
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') || read < MAX_LINE_LEN {
        return Ok(Some(HostLine::Line(
            String::from_utf8_lossy(&buf).into_owned(),
        )));
    }

    loop {
        buf.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
        if read == 0 || buf.last() == Some(&b'\n') {
            return Ok(Some(HostLine::TooLong));
        }
    }
}

/// Accept host connections until the request channel closes
pub async fn serve_tcp(listener: TcpListener, requests: mpsc::Sender<HostRequest>) -> Result<()> {
    let next_id = Arc::new(AtomicU64::new(1));
    info!(
        "Host protocol listening on {}",
        listener.local_addr().context("Listener has no address")?
    );

    let mut incoming = TcpListenerStream::new(listener);
    while let Some(stream) = incoming.next().await {
        let stream = stream.context("Accept failed")?;
        if requests.is_closed() {
            return Ok(());
        }

        let client = next_id.fetch_add(1, Ordering::Relaxed);
        match stream.peer_addr() {
            Ok(peer) => info!(client, "Host connected from {}", peer),
            Err(_) => info!(client, "Host connected"),
        }

        let requests = requests.clone();
        tokio::spawn(async move {
            let (reader, writer) = stream.into_split();
            match handle_client(client, reader, writer, requests, None).await {
                Ok(()) => info!(client, "Host disconnected"),
                Err(e) => warn!(client, "Host connection ended: {:#}", e),
            }
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::Hardware;
    use crate::store::layout::STORE_CAPACITY;
    use crate::store::{ConfigStore, MemoryStore};
    use tokio::io::{duplex, AsyncReadExt};

    fn device() -> Device<MemoryStore> {
        let store = ConfigStore::new(MemoryStore::erased(STORE_CAPACITY)).unwrap();
        let (hardware, _probe) = Hardware::emulated(1);
        Device::start(store, hardware).unwrap()
    }

    #[tokio::test]
    async fn test_client_round_trip() {
        let mut device = device();
        let mut sessions = HostSessions::new(FirmwareInfo::new("1.0"));
        let (tx, mut rx) = mpsc::channel(4);

        let (client_end, host_end) = duplex(1024);
        let (reader, writer) = tokio::io::split(host_end);
        let task = tokio::spawn(handle_client(7, reader, writer, tx, Some("hello".into())));

        let (mut client_read, mut client_write) = tokio::io::split(client_end);
        client_write.write_all(b"sendGlobal\r\nbogus\n").await.unwrap();
        client_write.shutdown().await.unwrap();
        drop(client_write);

        // Two lines, then the close notice
        for _ in 0..3 {
            let request = rx.recv().await.unwrap();
            sessions.handle(&mut device, request);
        }
        assert!(sessions.is_empty());

        task.await.unwrap().unwrap();
        let mut out = String::new();
        client_read.read_to_string(&mut out).await.unwrap();
        // bogus is not a valid global payload
        assert_eq!(out, "hello\nok\nerror\n");
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected_and_skipped() {
        let mut device = device();
        let mut sessions = HostSessions::new(FirmwareInfo::new("1.0"));
        let (tx, mut rx) = mpsc::channel(4);

        let (client_end, host_end) = duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(host_end);
        let task = tokio::spawn(handle_client(3, reader, writer, tx, None));

        let (mut client_read, mut client_write) = tokio::io::split(client_end);
        let flood = "x".repeat(3 * MAX_LINE_LEN);
        client_write
            .write_all(format!("sendPreset\n{}\nreceiveGlobal\n", flood).as_bytes())
            .await
            .unwrap();
        client_write.shutdown().await.unwrap();

        // Three requests, then the close notice
        for _ in 0..4 {
            let request = rx.recv().await.unwrap();
            sessions.handle(&mut device, request);
        }

        task.await.unwrap().unwrap();
        let mut out = String::new();
        client_read.read_to_string(&mut out).await.unwrap();
        let replies: Vec<&str> = out.lines().collect();
        assert_eq!(replies.len(), 3);
        assert_eq!(&replies[..2], &["ok", "error"]);
        // The session is back in Ready
        assert!(replies[2].starts_with('{'));
    }

    #[tokio::test]
    async fn test_read_host_line_limits() {
        let input = format!("short\r\n{}\ntail", "y".repeat(MAX_LINE_LEN));
        let mut reader = BufReader::new(input.as_bytes());

        assert_eq!(
            read_host_line(&mut reader).await.unwrap(),
            Some(HostLine::Line("short\r\n".to_string()))
        );
        assert_eq!(read_host_line(&mut reader).await.unwrap(), Some(HostLine::TooLong));
        assert_eq!(
            read_host_line(&mut reader).await.unwrap(),
            Some(HostLine::Line("tail".to_string()))
        );
        assert_eq!(read_host_line(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let mut device = device();
        let mut sessions = HostSessions::new(FirmwareInfo::new("1.0"));

        let mut send = |client, line: &str| {
            let (reply, rx) = oneshot::channel();
            sessions.handle(
                &mut device,
                HostRequest::Line {
                    client,
                    line: line.to_string(),
                    reply,
                },
            );
            rx
        };

        assert_eq!(send(1, "sendGlobal").await.unwrap(), Reply::Ok);
        // Client 2 is still in Ready, so a JSON line is an unknown command
        assert_eq!(send(2, r#"{"deviceName":"x","midiChannel":1}"#).await.unwrap(), Reply::Error);
        assert_eq!(send(1, r#"{"deviceName":"x","midiChannel":1}"#).await.unwrap(), Reply::Ok);
        assert_eq!(sessions.len(), 2);
    }
}
