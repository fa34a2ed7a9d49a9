//! SRT Packet Filters
//!
//! Pluggable loss recovery for SRT connections. A filter is selected and
//! tuned by a configuration string such as `fec,cols:10,rows:5,arq:onreq`,
//! bound to the connection's [`SessionParameters`], and driven by the engine
//! through the [`SrtPacketFilter`] contract. [`PacketFilter`] is the
//! engine-side owner that validates what a filter produces.

pub mod arq;
pub mod builtin;
pub mod config;
pub mod engine;
pub mod filter;
pub mod packet;
pub mod registry;
pub mod session;
pub mod tracker;

pub use arq::ArqLevel;
pub use builtin::{ArqFilter, FecFilter, NoOpFilter};
pub use config::{ConfigError, FilterConfig};
pub use engine::{FilterState, FilterStats, PacketFilter, ReceiveOutcome};
pub use filter::{FilterConstructor, FilterError, SrtPacketFilter};
pub use packet::{SrtPacket, SrtPacketError};
pub use registry::FilterRegistry;
pub use session::{SessionError, SessionParameters};
pub use tracker::{Arrival, LossTracker};
