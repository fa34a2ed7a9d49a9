//! SRT - Secure Reliable Transport
//!
//! Protocol core types and the pluggable packet filter subsystem.

pub use srt_filter as filter;
pub use srt_protocol as protocol;

// Re-export commonly used types
pub use filter::{ArqLevel, FilterConfig, FilterRegistry, PacketFilter, SessionParameters, SrtPacketFilter};
pub use protocol::{DataPacket, LossRange, LossReport, SeqNumber};
