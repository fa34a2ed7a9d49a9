//! The packet filter contract
//!
//! A packet filter plugs a loss-recovery strategy into the transport without
//! the engine knowing how it works. The engine talks to every variant only
//! through [`SrtPacketFilter`]:
//!
//! ```text
//!  send path                                   receive path
//!  ─────────                                   ────────────
//!  data packet ──► feed_source()               incoming ──► receive() ──► LossReport
//!  next seq    ──► pack_control_packet() ──►   control?     take_rebuilt() ──► rebuilt packets
//!                  Option<SrtPacket>                        poll_losses()  ──► LossReport
//! ```
//!
//! All calls are synchronous and must return promptly; they run inline on
//! the transport's send and receive paths. The engine serializes calls per
//! direction, so a filter never sees two concurrent calls on the same path.

use crate::arq::ArqLevel;
use crate::config::{ConfigError, FilterConfig};
use crate::packet::{SrtPacket, SrtPacketError};
use crate::session::{SessionError, SessionParameters};
use srt_protocol::{DataPacket, LossReport, SeqNumber};
use thiserror::Error;

/// Filter construction and dispatch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown filter type '{0}'")]
    UnknownType(String),

    #[error("Filter '{filter}' does not accept parameter '{name}'")]
    UnknownParameter { filter: String, name: String },

    #[error("Filter '{filter}' requires parameter '{name}'")]
    MissingParameter { filter: String, name: String },

    #[error("Invalid value '{value}' for parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Filter type '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Filter '{filter}' produced a {size} byte packet (capacity {max})")]
    CapacityViolation {
        filter: &'static str,
        size: usize,
        max: usize,
    },

    #[error("Packet error: {0}")]
    Packet(#[from] SrtPacketError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Builds a filter from the session context and its parsed configuration
pub type FilterConstructor =
    fn(&SessionParameters, &FilterConfig) -> Result<Box<dyn SrtPacketFilter>, FilterError>;

/// Capability set implemented by every filter variant
pub trait SrtPacketFilter: Send {
    /// Type token this filter was registered under
    fn name(&self) -> &'static str;

    /// Extra per-packet space this filter needs beyond the base header
    ///
    /// The engine reserves this much in every packet for the whole session,
    /// so the value must never change.
    fn extra_size(&self) -> usize;

    /// Offer the filter a slot on the send path
    ///
    /// `seq` is the next sequence number the engine will assign. Returns a
    /// complete control packet or `None` when there is nothing to send.
    fn pack_control_packet(&mut self, seq: SeqNumber) -> Option<SrtPacket>;

    /// Observe a data packet scheduled for sending
    fn feed_source(&mut self, packet: &DataPacket);

    /// Process an incoming packet (original or rebuilt)
    ///
    /// Newly detected loss is appended to `losses` as the fixed
    /// [`arq_level`](Self::arq_level) dictates. Returns `true` when the
    /// packet is a filter control packet that must not reach the application.
    fn receive(&mut self, packet: &DataPacket, losses: &mut LossReport) -> bool;

    /// The loss report policy fixed at construction
    fn arq_level(&self) -> ArqLevel;

    /// Explicit poll for recorded loss (used by [`ArqLevel::OnRequest`])
    fn poll_losses(&mut self, _losses: &mut LossReport) {}

    /// Move packets rebuilt by the filter into `out`
    fn take_rebuilt(&mut self, _out: &mut Vec<DataPacket>) {}
}
