//! Radio link seam and the discovery/sync protocol on top of it. The chip
//! driver itself is out of scope; [`RadioLink`] is the boundary, and the host
//! build speaks the same frames over non-blocking UDP so a simulated fleet
//! can sit on the other end.

use std::{
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
};

use anyhow::Context;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

use fleet_common::{
    protocol::{self, Frame},
    CommandFrame, RadioConfig, SyncTarget, TelemetryFrame,
};

pub trait RadioLink: Send {
    fn send(&mut self, payload: &[u8]) -> anyhow::Result<()>;
    fn try_recv(&mut self) -> anyhow::Result<Option<Vec<u8>>>;
}

pub struct UdpRadioLink {
    socket: UdpSocket,
    peer: SocketAddr,
    sync_word: u8,
}

impl UdpRadioLink {
    pub fn open(config: &RadioConfig) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(&config.listen_addr)
            .with_context(|| format!("failed to bind radio link at {}", config.listen_addr))?;
        socket.set_nonblocking(true)?;
        let peer: SocketAddr = config
            .peer_addr
            .parse()
            .with_context(|| format!("invalid radio peer address {}", config.peer_addr))?;
        Ok(Self {
            socket,
            peer,
            sync_word: config.sync_word,
        })
    }
}

impl RadioLink for UdpRadioLink {
    fn send(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        let framed = protocol::frame_with_sync(self.sync_word, payload);
        self.socket.send_to(&framed, self.peer)?;
        Ok(())
    }

    fn try_recv(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        let mut buf = [0u8; 64];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, _)) => match protocol::strip_sync(self.sync_word, &buf[..len]) {
                    Some(payload) => return Ok(Some(payload.to_vec())),
                    // Wrong sync word: someone else's traffic on the band.
                    None => continue,
                },
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(err) => return Err(err.into()),
            }
        }
    }
}

pub struct RadioService {
    link: Box<dyn RadioLink>,
}

impl RadioService {
    pub fn new(link: Box<dyn RadioLink>) -> Self {
        Self { link }
    }

    pub fn send_command(&mut self, target: SyncTarget) -> anyhow::Result<()> {
        let frame = CommandFrame {
            id: target.id,
            on: target.on,
            dim: target.dim,
        };
        self.link.send(&frame.encode())
    }

    /// Drains everything pending on the receive path. Telemetry frames come
    /// back; anything of unexpected size is noise and is dropped here.
    pub fn drain_telemetry(&mut self) -> Vec<TelemetryFrame> {
        let mut frames = Vec::new();
        loop {
            let payload = match self.link.try_recv() {
                Ok(Some(payload)) => payload,
                Ok(None) => break,
                Err(err) => {
                    warn!("radio receive error: {err:#}");
                    break;
                }
            };
            match protocol::decode(&payload) {
                Ok(Frame::Telemetry(frame)) => frames.push(frame),
                Ok(Frame::Command(frame)) => {
                    debug!("ignoring command frame for id {} on master side", frame.id);
                }
                Err(err) => warn!("dropping inbound frame: {err}"),
            }
        }
        frames
    }

    /// Device-add handshake: probe the candidate id, then poll the receive
    /// path for a matching reply until the window closes. No retry here; the
    /// caller may re-invoke.
    pub async fn discover(
        &mut self,
        id: u16,
        window_ms: u64,
    ) -> anyhow::Result<Option<TelemetryFrame>> {
        let probe = CommandFrame {
            id,
            on: false,
            dim: 0,
        };
        self.link.send(&probe.encode())?;

        let deadline = Instant::now() + Duration::from_millis(window_ms);
        loop {
            loop {
                match self.link.try_recv() {
                    Ok(Some(payload)) => {
                        if let Ok(Frame::Telemetry(frame)) = protocol::decode(&payload) {
                            if frame.id == id {
                                return Ok(Some(frame));
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!("radio receive error during discovery: {err:#}");
                        break;
                    }
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct ScriptedLinkState {
        incoming: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
    }

    #[derive(Clone, Default)]
    struct ScriptedLink(Arc<Mutex<ScriptedLinkState>>);

    impl ScriptedLink {
        fn push_incoming(&self, payload: Vec<u8>) {
            self.0.lock().unwrap().incoming.push_back(payload);
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.0.lock().unwrap().sent.clone()
        }
    }

    impl RadioLink for ScriptedLink {
        fn send(&mut self, payload: &[u8]) -> anyhow::Result<()> {
            self.0.lock().unwrap().sent.push(payload.to_vec());
            Ok(())
        }

        fn try_recv(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(self.0.lock().unwrap().incoming.pop_front())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_times_out_without_reply() {
        let link = ScriptedLink::default();
        let mut service = RadioService::new(Box::new(link.clone()));

        let reply = service.discover(7, 500).await.unwrap();
        assert!(reply.is_none());

        // The probe went out exactly once.
        let sent = link.sent();
        assert_eq!(sent.len(), 1);
        let probe = CommandFrame::decode(&sent[0]).unwrap();
        assert_eq!(probe.id, 7);
        assert!(!probe.on);
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_accepts_matching_reply_within_window() {
        let link = ScriptedLink::default();
        let mut service = RadioService::new(Box::new(link.clone()));

        let reply = TelemetryFrame {
            id: 7,
            temperature: 23.5,
            uptime_secs: 44,
        };
        link.push_incoming(reply.encode().to_vec());

        let found = service.discover(7, 500).await.unwrap();
        assert_eq!(found, Some(reply));
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_ignores_replies_for_other_ids() {
        let link = ScriptedLink::default();
        let mut service = RadioService::new(Box::new(link.clone()));

        let other = TelemetryFrame {
            id: 3,
            temperature: 20.0,
            uptime_secs: 10,
        };
        link.push_incoming(other.encode().to_vec());

        let found = service.discover(7, 500).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn drain_discards_unrecognized_sizes() {
        let link = ScriptedLink::default();
        link.push_incoming(vec![0u8; 7]); // noise
        link.push_incoming(
            TelemetryFrame {
                id: 2,
                temperature: 21.0,
                uptime_secs: 5,
            }
            .encode()
            .to_vec(),
        );

        let mut service = RadioService::new(Box::new(link));
        let frames = service.drain_telemetry();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, 2);
    }
}
