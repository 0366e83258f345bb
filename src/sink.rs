//! Message sinks - where finished OSC messages go

use crate::codec::OscMessage;
use crate::value::OscArg;
use crate::OscError;
use bytes::Bytes;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};

/// Fire-and-forget message transport
///
/// Implementations may be called concurrently from several timer tasks.
/// Failures are the sink's business: they are logged, never returned.
pub trait Sink: Send + Sync {
    fn send(&self, path: &str, args: &[OscArg]);
}

fn args_json(args: &[OscArg]) -> String {
    serde_json::to_string(args).unwrap_or_else(|e| format!("<unprintable: {}>", e))
}

enum Outgoing {
    Datagram { path: String, packet: Bytes },
    Flush(oneshot::Sender<()>),
}

/// Sends each message as one UDP datagram
///
/// `send` only queues the encoded message; a background task owns the
/// socket and awaits every send in queue order, so a burst of messages
/// waits for socket space instead of being dropped.
pub struct UdpSink {
    queue: mpsc::UnboundedSender<Outgoing>,
    local: SocketAddr,
    target: SocketAddr,
}

impl UdpSink {
    /// Bind `local` and send to `target`
    ///
    /// Must be called inside a tokio runtime, which runs the writer task.
    pub async fn bind(local: SocketAddr, target: SocketAddr) -> Result<Self, OscError> {
        let socket = UdpSocket::bind(local).await?;
        let local = socket.local_addr()?;
        info!("OSC sink {} -> {}", local, target);

        let (queue, mut pending) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(outgoing) = pending.recv().await {
                match outgoing {
                    Outgoing::Datagram { path, packet } => {
                        if let Err(e) = socket.send_to(&packet, target).await {
                            warn!("Failed to send OSC {} to {}: {}", path, target, e);
                        }
                    }
                    Outgoing::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(Self {
            queue,
            local,
            target,
        })
    }

    /// Resolve `host:port` and bind `local`
    pub async fn connect(local: SocketAddr, host: &str, port: u16) -> Result<Self, OscError> {
        let target = tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| OscError::InvalidConfig(format!("Cannot resolve {}:{}", host, port)))?;
        Self::bind(local, target).await
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Wait until every message queued so far has been handed to the socket
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.queue.send(Outgoing::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl Sink for UdpSink {
    fn send(&self, path: &str, args: &[OscArg]) {
        debug!("Sending OSC {} {}", self.target, path);
        debug!("Sending Args {}", args_json(args));

        let packet = OscMessage::new(path, args.to_vec()).encode();
        let outgoing = Outgoing::Datagram {
            path: path.to_string(),
            packet,
        };
        if self.queue.send(outgoing).is_err() {
            warn!("Failed to send OSC {} to {}: writer stopped", path, self.target);
        }
    }
}

/// Dry-run sink: logs messages instead of sending them
#[derive(Debug, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn send(&self, path: &str, args: &[OscArg]) {
        info!("[dry-run] {} {}", path, args_json(args));
    }
}

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<OscMessage>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far, in arrival order
    pub fn messages(&self) -> Vec<OscMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Sink for RecordingSink {
    fn send(&self, path: &str, args: &[OscArg]) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(OscMessage::new(path, args.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_udp_sink_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sink = UdpSink::bind("127.0.0.1:0".parse().unwrap(), receiver.local_addr().unwrap())
            .await
            .unwrap();

        sink.send("/cue/go", &[OscArg::Int(7), OscArg::Bool(true)]);

        let mut buf = [0u8; 256];
        let (n, from) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .expect("datagram not received")
            .unwrap();
        assert_eq!(from, sink.local_addr());

        let msg = OscMessage::decode(&buf[..n]).unwrap();
        assert_eq!(msg.path, "/cue/go");
        assert_eq!(msg.args, vec![OscArg::Int(7), OscArg::Bool(true)]);
    }

    #[tokio::test]
    async fn test_udp_sink_burst_arrives_in_order() {
        const COUNT: i64 = 200;

        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sink = UdpSink::bind("127.0.0.1:0".parse().unwrap(), receiver.local_addr().unwrap())
            .await
            .unwrap();

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let mut values = Vec::new();
            while values.len() < COUNT as usize {
                let n = tokio::time::timeout(Duration::from_secs(2), receiver.recv(&mut buf))
                    .await
                    .expect("burst cut short")
                    .unwrap();
                values.extend(OscMessage::decode(&buf[..n]).unwrap().args);
            }
            values
        });

        // every message queued before any reaches the socket
        for v in 0..COUNT {
            sink.send("/burst", &[OscArg::Int(v)]);
        }
        sink.flush().await;

        let values = reader.await.unwrap();
        assert_eq!(values, (0..COUNT).map(OscArg::Int).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_flush_without_messages() {
        let sink = UdpSink::bind("127.0.0.1:0".parse().unwrap(), "127.0.0.1:9".parse().unwrap())
            .await
            .unwrap();
        sink.flush().await;
        assert_ne!(sink.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_connect_resolves_localhost() {
        let sink = UdpSink::connect("127.0.0.1:0".parse().unwrap(), "127.0.0.1", 53000)
            .await
            .unwrap();
        assert_eq!(sink.target(), "127.0.0.1:53000".parse().unwrap());
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.send("/a", &[]);
        sink.send("/b", &[OscArg::from("x")]);
        let paths: Vec<_> = sink.messages().into_iter().map(|m| m.path).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
    }
}
