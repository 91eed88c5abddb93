//! Message sinks
//!
//! A sink delivers one message per call. Delivery guarantees, retries and
//! subscriber behaviour are out of scope here: a non-blocking sink that
//! cannot take a message right now reports [`TransportError::Backpressure`]
//! and the message is gone.
//!
//! [`UdpSink`] never blocks. [`JsonLinesSink`] blocks for as long as its
//! writer does, so a stalled stdout reader stalls the caller.

use std::io::Write;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use serde::Serialize;
use tracing::debug;

use crate::error::TransportError;
use crate::types::ControlMessage;

/// Destination for published control messages
pub trait MessageSink {
    /// Deliver a single message
    fn publish(&mut self, msg: &ControlMessage) -> Result<(), TransportError>;
}

impl<S: MessageSink + ?Sized> MessageSink for Box<S> {
    fn publish(&mut self, msg: &ControlMessage) -> Result<(), TransportError> {
        (**self).publish(msg)
    }
}

/// Wire representation: the message plus the topic it was published on
#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    #[serde(flatten)]
    message: &'a ControlMessage,
}

fn encode(topic: &str, msg: &ControlMessage) -> Result<Vec<u8>, TransportError> {
    Ok(serde_json::to_vec(&Envelope {
        topic,
        message: msg,
    })?)
}

/// Sends each message as a single JSON datagram to a fixed peer
pub struct UdpSink {
    socket: UdpSocket,
    topic: String,
    peer: SocketAddr,
}

impl UdpSink {
    /// Resolve `target`, bind an ephemeral local port and connect to the peer
    ///
    /// The socket is non-blocking so a full send buffer surfaces as
    /// backpressure instead of stalling the caller.
    pub fn connect(target: &str, topic: impl Into<String>) -> Result<Self, TransportError> {
        let peer = target
            .to_socket_addrs()
            .map_err(|e| TransportError::AddressResolution(format!("{target}: {e}")))?
            .next()
            .ok_or_else(|| TransportError::AddressResolution(target.to_string()))?;

        let local: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(peer)?;
        socket.set_nonblocking(true)?;
        debug!("UDP sink {} -> {}", socket.local_addr()?, peer);

        Ok(Self {
            socket,
            topic: topic.into(),
            peer,
        })
    }

    /// Address messages are sent to
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl MessageSink for UdpSink {
    fn publish(&mut self, msg: &ControlMessage) -> Result<(), TransportError> {
        let payload = encode(&self.topic, msg)?;
        let sent = self
            .socket
            .send(&payload)
            .map_err(TransportError::from_send)?;
        if sent != payload.len() {
            return Err(TransportError::ShortWrite {
                sent,
                expected: payload.len(),
            });
        }
        Ok(())
    }
}

/// Writes each message as one line of JSON
///
/// A writer that returns `WouldBlock` surfaces as backpressure.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    topic: String,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W, topic: impl Into<String>) -> Self {
        Self {
            writer,
            topic: topic.into(),
        }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::Stdout> {
    /// Blocking stdout writer
    pub fn stdout(topic: impl Into<String>) -> Self {
        Self::new(std::io::stdout(), topic)
    }
}

impl<W: Write> MessageSink for JsonLinesSink<W> {
    fn publish(&mut self, msg: &ControlMessage) -> Result<(), TransportError> {
        let mut line = encode(&self.topic, msg)?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .map_err(TransportError::from_send)?;
        self.writer.flush().map_err(TransportError::from_send)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stamp;
    use std::time::Duration;

    fn stamped(sec: i32) -> ControlMessage {
        let mut msg = ControlMessage::new("base_link");
        msg.header.stamp = Stamp { sec, nanosec: 5 };
        msg
    }

    #[test]
    fn test_json_lines_one_object_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new(), "joy");
        sink.publish(&stamped(1)).unwrap();
        sink.publish(&stamped(2)).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["topic"], "joy");
        assert_eq!(first["header"]["frame_id"], "base_link");
        assert_eq!(first["header"]["stamp"]["sec"], 1);
        assert_eq!(first["header"]["stamp"]["nanosec"], 5);
        assert_eq!(first["axes"].as_array().unwrap().len(), 8);
        assert_eq!(first["buttons"].as_array().unwrap().len(), 13);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["header"]["stamp"]["sec"], 2);
    }

    #[test]
    fn test_json_lines_payload_parses_back() {
        let mut sink = JsonLinesSink::new(Vec::new(), "joy");
        let msg = stamped(42);
        sink.publish(&msg).unwrap();

        let out = sink.into_inner();
        // Unknown `topic` field is ignored on the way back in
        let parsed: ControlMessage = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, msg);
    }

    /// Writer whose buffer is always full
    struct FullPipe;

    impl Write for FullPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::WouldBlock.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_full_writer_is_backpressure() {
        let mut sink = JsonLinesSink::new(FullPipe, "joy");
        let err = sink.publish(&stamped(1)).unwrap_err();
        assert!(matches!(err, TransportError::Backpressure));
    }

    #[test]
    fn test_udp_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let target = receiver.local_addr().unwrap().to_string();

        let mut sink = UdpSink::connect(&target, "teleop/joy").unwrap();
        assert_eq!(sink.peer(), receiver.local_addr().unwrap());
        sink.publish(&stamped(7)).unwrap();

        let mut buf = [0u8; 2048];
        let n = receiver.recv(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(value["topic"], "teleop/joy");
        assert_eq!(value["header"]["stamp"]["sec"], 7);
        assert_eq!(value["axes"].as_array().unwrap().len(), 8);
        assert_eq!(value["buttons"].as_array().unwrap().len(), 13);
    }

    #[test]
    fn test_udp_bad_address() {
        let err = UdpSink::connect("not an address", "joy").err().unwrap();
        assert!(matches!(err, TransportError::AddressResolution(_)));
    }
}
