//! SRT Protocol Core Types
//!
//! Sequence number arithmetic, the wire packet header and data packets, and
//! the loss ranges a receiver reports back to the sender.

pub mod loss;
pub mod packet;
pub mod sequence;

pub use loss::{LossRange, LossReport};
pub use packet::{DataPacket, HeaderField, MsgNumber, PacketBoundary, PacketError, PacketHeader};
pub use sequence::SeqNumber;
