//! Simulated remote relay/dimmer node. Joins the host radio transport,
//! applies commands addressed to its id, answers each with a telemetry reply
//! (which is also what the master's discovery flow waits for), and reports
//! unsolicited telemetry on a fixed cadence.

use std::{
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
    time::Instant,
};

use anyhow::Context;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

use fleet_common::{
    protocol::{self, Frame, DEFAULT_SYNC_WORD},
    NodeId, TelemetryFrame,
};

const POLL_MS: u64 = 100;
const REPORT_EVERY_TICKS: u64 = 50; // 5 s on the poll cadence

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let id: NodeId = std::env::var("NODE_ID")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(1);
    let listen_addr =
        std::env::var("NODE_RADIO_LISTEN").unwrap_or_else(|_| "127.0.0.1:47401".to_string());
    let peer_addr =
        std::env::var("NODE_RADIO_PEER").unwrap_or_else(|_| "127.0.0.1:47400".to_string());
    let sync_word = std::env::var("RADIO_SYNC_WORD")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_SYNC_WORD);

    let socket = UdpSocket::bind(&listen_addr)
        .with_context(|| format!("failed to bind node radio at {listen_addr}"))?;
    socket.set_nonblocking(true)?;
    let peer: SocketAddr = peer_addr
        .parse()
        .with_context(|| format!("invalid master address {peer_addr}"))?;

    info!("node {id} on {listen_addr}, master at {peer}");

    let started = Instant::now();
    let mut on = false;
    let mut dim: u8 = 0;
    let mut tick: u64 = 0;

    let mut interval = time::interval(Duration::from_millis(POLL_MS));
    loop {
        interval.tick().await;
        tick = tick.wrapping_add(1);

        let mut buf = [0u8; 64];
        loop {
            match socket.recv_from(&mut buf) {
                Ok((len, _)) => {
                    let Some(payload) = protocol::strip_sync(sync_word, &buf[..len]) else {
                        continue;
                    };
                    match protocol::decode(payload) {
                        Ok(Frame::Command(command)) if command.id == id => {
                            on = command.on;
                            dim = command.dim;
                            // Hardware integration point: drive the relay and
                            // PWM output here on a real node.
                            info!("applied command: on={on} dim={dim}");
                            send_telemetry(&socket, peer, sync_word, id, &started, tick);
                        }
                        Ok(Frame::Command(_)) | Ok(Frame::Telemetry(_)) => {}
                        Err(err) => debug!("ignoring frame: {err}"),
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!("radio receive error: {err}");
                    break;
                }
            }
        }

        if tick % REPORT_EVERY_TICKS == 0 {
            send_telemetry(&socket, peer, sync_word, id, &started, tick);
        }
    }
}

fn send_telemetry(
    socket: &UdpSocket,
    peer: SocketAddr,
    sync_word: u8,
    id: NodeId,
    started: &Instant,
    tick: u64,
) {
    // Hardware integration point: replace the simulated reading with the
    // node's temperature probe.
    let temperature = 25.0 + ((tick % 10) as f32) * 0.3;
    let frame = TelemetryFrame {
        id,
        temperature,
        uptime_secs: started.elapsed().as_secs() as u32,
    };
    let datagram = protocol::frame_with_sync(sync_word, &frame.encode());
    if let Err(err) = socket.send_to(&datagram, peer) {
        warn!("telemetry send failed: {err}");
    }
}
