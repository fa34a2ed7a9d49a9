//! Per-connection parameters handed to a filter at construction

use srt_protocol::packet::MAX_PAYLOAD_SIZE;
use srt_protocol::SeqNumber;
use thiserror::Error;

/// Default live-mode payload size (7 MPEG-TS cells)
pub const DEFAULT_LIVE_PAYLOAD_SIZE: usize = 1316;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid payload size {size} (must be 1..={max})")]
    InvalidPayloadSize { size: usize, max: usize },

    #[error("Payload size {size} too small (need at least {required})")]
    PayloadTooSmall { size: usize, required: usize },
}

/// Immutable session context
///
/// Filters receive this by reference when they are built and may copy it,
/// but there is no way to change it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParameters {
    socket_id: u32,
    snd_isn: SeqNumber,
    rcv_isn: SeqNumber,
    payload_size: usize,
}

impl SessionParameters {
    pub fn new(
        socket_id: u32,
        snd_isn: SeqNumber,
        rcv_isn: SeqNumber,
        payload_size: usize,
    ) -> Result<Self, SessionError> {
        if payload_size == 0 || payload_size > MAX_PAYLOAD_SIZE {
            return Err(SessionError::InvalidPayloadSize {
                size: payload_size,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(SessionParameters {
            socket_id,
            snd_isn,
            rcv_isn,
            payload_size,
        })
    }

    /// Peer socket id stamped into filter control packets
    pub fn socket_id(&self) -> u32 {
        self.socket_id
    }

    /// Initial sequence number of the sending direction
    pub fn snd_isn(&self) -> SeqNumber {
        self.snd_isn
    }

    /// Initial sequence number of the receiving direction
    pub fn rcv_isn(&self) -> SeqNumber {
        self.rcv_isn
    }

    /// Payload capacity of every packet in this session
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }
}
