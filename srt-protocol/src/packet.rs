//! SRT Packet Header and Data Packets
//!
//! Every SRT packet starts with a 128-bit header made of four 32-bit words in
//! a fixed order: sequence number, message number, timestamp and destination
//! socket id. The order and count of these words is part of the wire format.
//!
//! Data packets with a message sequence of [`MSGNO_CONTROL`] are reserved for
//! packet filters (e.g. FEC parity) and are never delivered to the application.

use crate::sequence::SeqNumber;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Number of 32-bit words in the packet header
pub const HEADER_FIELD_COUNT: usize = 4;

/// Size of the SRT packet header in bytes
pub const HEADER_SIZE: usize = HEADER_FIELD_COUNT * 4;

/// Maximum live-mode payload size (MTU 1500 - IP/UDP headers - SRT header)
pub const MAX_PAYLOAD_SIZE: usize = 1456;

/// Message sequence reserved for packet filter control packets
pub const MSGNO_CONTROL: u32 = 0;

/// Control packet flag (bit 31 of the first header word)
const CONTROL_FLAG: u32 = 0x8000_0000;

/// Mask for the message sequence (bits 0-25 of the second header word)
const MSG_SEQ_MASK: u32 = 0x03FF_FFFF;

/// Index of a header word
///
/// The discriminant is the word's position on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum HeaderField {
    /// Sequence number
    SeqNo = 0,
    /// Message number and flags
    MsgNo = 1,
    /// Timestamp (microseconds)
    Timestamp = 2,
    /// Destination socket ID
    Id = 3,
}

impl HeaderField {
    /// All fields in wire order
    pub const ALL: [HeaderField; HEADER_FIELD_COUNT] = [
        HeaderField::SeqNo,
        HeaderField::MsgNo,
        HeaderField::Timestamp,
        HeaderField::Id,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Message boundary flags (bits 30-31 of message number field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketBoundary {
    /// Packet in the middle of a message
    Subsequent = 0b00,
    /// Last packet of a message
    Last = 0b01,
    /// First packet of a message
    First = 0b10,
    /// Solo packet (complete message)
    Solo = 0b11,
}

impl PacketBoundary {
    pub fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0b00 => PacketBoundary::Subsequent,
            0b01 => PacketBoundary::Last,
            0b10 => PacketBoundary::First,
            _ => PacketBoundary::Solo,
        }
    }

    pub fn as_bits(self) -> u8 {
        self as u8
    }
}

/// Encryption key specification (bits 27-28 of message number field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncryptionKeySpec {
    None = 0,
    Even = 1,
    Odd = 2,
}

impl EncryptionKeySpec {
    pub fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            1 => EncryptionKeySpec::Even,
            2 => EncryptionKeySpec::Odd,
            _ => EncryptionKeySpec::None,
        }
    }

    pub fn as_bits(self) -> u8 {
        self as u8
    }
}

/// Message number and flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgNumber {
    /// Message boundary (bits 30-31)
    pub boundary: PacketBoundary,
    /// In-order delivery flag (bit 29)
    pub in_order: bool,
    /// Encryption key spec (bits 27-28)
    pub encryption_key: EncryptionKeySpec,
    /// Retransmission flag (bit 26)
    pub retransmitted: bool,
    /// Message sequence number (bits 0-25)
    pub seq: u32,
}

impl MsgNumber {
    /// Create a solo, unencrypted message number
    pub fn new(seq: u32) -> Self {
        MsgNumber {
            boundary: PacketBoundary::Solo,
            in_order: false,
            encryption_key: EncryptionKeySpec::None,
            retransmitted: false,
            seq: seq & MSG_SEQ_MASK,
        }
    }

    pub fn from_raw(raw: u32) -> Self {
        MsgNumber {
            boundary: PacketBoundary::from_bits((raw >> 30) as u8),
            in_order: (raw & (1 << 29)) != 0,
            encryption_key: EncryptionKeySpec::from_bits((raw >> 27) as u8),
            retransmitted: (raw & (1 << 26)) != 0,
            seq: raw & MSG_SEQ_MASK,
        }
    }

    pub fn to_raw(self) -> u32 {
        let mut raw = self.seq & MSG_SEQ_MASK;
        raw |= (self.boundary.as_bits() as u32) << 30;
        if self.in_order {
            raw |= 1 << 29;
        }
        raw |= (self.encryption_key.as_bits() as u32) << 27;
        if self.retransmitted {
            raw |= 1 << 26;
        }
        raw
    }

    /// The six flag bits (26-31) shifted down to the low bits
    pub fn flag_bits(self) -> u8 {
        (self.to_raw() >> 26) as u8
    }
}

/// Packet header: four 32-bit words indexed by [`HeaderField`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    fields: [u32; HEADER_FIELD_COUNT],
}

impl PacketHeader {
    /// Header with every word zeroed
    pub fn zeroed() -> Self {
        PacketHeader::default()
    }

    /// Build a header from raw words in wire order
    pub fn from_fields(fields: [u32; HEADER_FIELD_COUNT]) -> Self {
        PacketHeader { fields }
    }

    /// Create a data packet header
    pub fn new_data(seq: SeqNumber, msg_number: MsgNumber, timestamp: u32, socket_id: u32) -> Self {
        PacketHeader {
            fields: [seq.as_raw(), msg_number.to_raw(), timestamp, socket_id],
        }
    }

    #[inline]
    pub fn field(&self, field: HeaderField) -> u32 {
        self.fields[field.index()]
    }

    #[inline]
    pub fn set_field(&mut self, field: HeaderField, value: u32) {
        self.fields[field.index()] = value;
    }

    /// Raw words in wire order
    pub fn fields(&self) -> [u32; HEADER_FIELD_COUNT] {
        self.fields
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        (self.field(HeaderField::SeqNo) & CONTROL_FLAG) != 0
    }

    /// Sequence number (data packets only)
    pub fn seq_number(&self) -> Option<SeqNumber> {
        if self.is_control() {
            None
        } else {
            Some(SeqNumber::new_unchecked(self.field(HeaderField::SeqNo)))
        }
    }

    pub fn msg_number(&self) -> MsgNumber {
        MsgNumber::from_raw(self.field(HeaderField::MsgNo))
    }

    pub fn timestamp(&self) -> u32 {
        self.field(HeaderField::Timestamp)
    }

    pub fn socket_id(&self) -> u32 {
        self.field(HeaderField::Id)
    }

    /// Parse header from bytes (network byte order)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_SIZE {
            return Err(PacketError::InsufficientData {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..HEADER_SIZE];
        let mut fields = [0u32; HEADER_FIELD_COUNT];
        for word in fields.iter_mut() {
            *word = buf.get_u32();
        }
        Ok(PacketHeader { fields })
    }

    /// Serialize header to bytes (network byte order)
    pub fn to_bytes(&self, buf: &mut BytesMut) {
        for word in self.fields {
            buf.put_u32(word);
        }
    }
}

/// Data packet as handled by the transport engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub header: PacketHeader,
    pub payload: Bytes,
}

impl DataPacket {
    pub fn new(
        seq: SeqNumber,
        msg_number: MsgNumber,
        timestamp: u32,
        socket_id: u32,
        payload: Bytes,
    ) -> Self {
        DataPacket {
            header: PacketHeader::new_data(seq, msg_number, timestamp, socket_id),
            payload,
        }
    }

    pub fn seq_number(&self) -> SeqNumber {
        SeqNumber::new_unchecked(self.header.field(HeaderField::SeqNo))
    }

    pub fn msg_number(&self) -> MsgNumber {
        self.header.msg_number()
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp()
    }

    /// Whether this packet carries packet filter control data
    pub fn is_filter_control(&self) -> bool {
        self.msg_number().seq == MSGNO_CONTROL
    }

    /// Total size of the packet (header + payload)
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());
        self.header.to_bytes(&mut buf);
        buf.put_slice(&self.payload);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        let header = PacketHeader::from_bytes(bytes)?;

        if header.is_control() {
            return Err(PacketError::WrongPacketType {
                expected: "data",
                actual: "control",
            });
        }

        let payload_len = bytes.len() - HEADER_SIZE;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(DataPacket {
            header,
            payload: Bytes::copy_from_slice(&bytes[HEADER_SIZE..]),
        })
    }
}

/// Packet parsing errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PacketError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Wrong packet type: expected {expected}, got {actual}")]
    WrongPacketType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}
