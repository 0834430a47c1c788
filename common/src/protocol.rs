//! Fixed-size wire frames for the half-duplex radio link. There is no length
//! prefix or checksum; the payload size alone identifies the shape, and
//! anything else on the channel is noise.

use thiserror::Error;

use crate::registry::NodeId;

pub const COMMAND_LEN: usize = 4;
pub const TELEMETRY_LEN: usize = 10;

/// Default sync word, prepended by the link layer to reject cross-talk from
/// unrelated transmitters sharing the band. Not a security measure.
pub const DEFAULT_SYNC_WORD: u8 = 0xF3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("unrecognized frame size {0}")]
    UnrecognizedSize(usize),
}

/// Master to node: drive the actuator to this intent. Also doubles as the
/// discovery probe (`on = false`, `dim = 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub id: NodeId,
    pub on: bool,
    pub dim: u8,
}

/// Node to master: periodic report, and the reply shape the discovery flow
/// waits for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    pub id: NodeId,
    pub temperature: f32,
    pub uptime_secs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    Command(CommandFrame),
    Telemetry(TelemetryFrame),
}

impl CommandFrame {
    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        let id = self.id.to_le_bytes();
        [id[0], id[1], self.on as u8, self.dim]
    }

    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != COMMAND_LEN {
            return None;
        }
        Some(Self {
            id: NodeId::from_le_bytes([payload[0], payload[1]]),
            on: payload[2] != 0,
            dim: payload[3],
        })
    }
}

impl TelemetryFrame {
    pub fn encode(&self) -> [u8; TELEMETRY_LEN] {
        let mut out = [0u8; TELEMETRY_LEN];
        out[0..2].copy_from_slice(&self.id.to_le_bytes());
        out[2..6].copy_from_slice(&self.temperature.to_le_bytes());
        out[6..10].copy_from_slice(&self.uptime_secs.to_le_bytes());
        out
    }

    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != TELEMETRY_LEN {
            return None;
        }
        Some(Self {
            id: NodeId::from_le_bytes([payload[0], payload[1]]),
            temperature: f32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]),
            uptime_secs: u32::from_le_bytes([payload[6], payload[7], payload[8], payload[9]]),
        })
    }
}

pub fn decode(payload: &[u8]) -> Result<Frame, FrameError> {
    if let Some(frame) = CommandFrame::decode(payload) {
        return Ok(Frame::Command(frame));
    }
    if let Some(frame) = TelemetryFrame::decode(payload) {
        return Ok(Frame::Telemetry(frame));
    }
    Err(FrameError::UnrecognizedSize(payload.len()))
}

pub fn frame_with_sync(sync_word: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(sync_word);
    out.extend_from_slice(payload);
    out
}

/// Returns the payload when the sync word matches; anything else is
/// cross-talk and is dropped at the link layer.
pub fn strip_sync(sync_word: u8, datagram: &[u8]) -> Option<&[u8]> {
    match datagram.split_first() {
        Some((first, rest)) if *first == sync_word => Some(rest),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_roundtrip() {
        let frame = CommandFrame {
            id: 7,
            on: true,
            dim: 200,
        };
        let bytes = frame.encode();
        assert_eq!(bytes.len(), COMMAND_LEN);
        assert_eq!(CommandFrame::decode(&bytes), Some(frame));
    }

    #[test]
    fn telemetry_roundtrip() {
        let frame = TelemetryFrame {
            id: 3,
            temperature: 26.75,
            uptime_secs: 3600,
        };
        assert_eq!(TelemetryFrame::decode(&frame.encode()), Some(frame));
    }

    #[test]
    fn size_discriminates_frame_shape() {
        let cmd = CommandFrame {
            id: 1,
            on: false,
            dim: 0,
        };
        assert!(matches!(decode(&cmd.encode()), Ok(Frame::Command(_))));

        let err = decode(&[0u8; 7]).unwrap_err();
        assert_eq!(err, FrameError::UnrecognizedSize(7));
    }

    #[test]
    fn sync_word_mismatch_is_dropped() {
        let framed = frame_with_sync(DEFAULT_SYNC_WORD, &[1, 2, 3]);
        assert_eq!(strip_sync(DEFAULT_SYNC_WORD, &framed), Some(&[1u8, 2, 3][..]));
        assert_eq!(strip_sync(0x55, &framed), None);
        assert_eq!(strip_sync(DEFAULT_SYNC_WORD, &[]), None);
    }
}
