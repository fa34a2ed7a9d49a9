//! Filter packet
//!
//! [`SrtPacket`] is the packet representation exchanged between the engine
//! and a filter. Its length is fixed at construction: the payload can be
//! written in place but never grown, and any write past the declared length
//! is rejected.

use bytes::BytesMut;
use srt_protocol::packet::{DataPacket, HeaderField, PacketHeader, MAX_PAYLOAD_SIZE};
use thiserror::Error;

/// Filter packet errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SrtPacketError {
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Write of {len} bytes at offset {offset} exceeds packet length {length}")]
    WriteOutOfBounds {
        offset: usize,
        len: usize,
        length: usize,
    },
}

/// A packet built or inspected by a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtPacket {
    header: PacketHeader,
    buffer: BytesMut,
}

impl SrtPacket {
    /// Create a packet of exactly `length` payload bytes
    ///
    /// The header and the payload start zeroed.
    pub fn new(length: usize) -> Result<Self, SrtPacketError> {
        if length > MAX_PAYLOAD_SIZE {
            return Err(SrtPacketError::PayloadTooLarge {
                size: length,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(SrtPacket {
            header: PacketHeader::zeroed(),
            buffer: BytesMut::zeroed(length),
        })
    }

    /// Copy an engine data packet into a filter packet
    pub fn from_data_packet(packet: &DataPacket) -> Result<Self, SrtPacketError> {
        let mut out = SrtPacket::new(packet.payload.len())?;
        out.header = packet.header;
        out.buffer.copy_from_slice(&packet.payload);
        Ok(out)
    }

    #[inline]
    pub fn header(&self, field: HeaderField) -> u32 {
        self.header.field(field)
    }

    #[inline]
    pub fn set_header(&mut self, field: HeaderField, value: u32) {
        self.header.set_field(field, value);
    }

    pub fn headers(&self) -> &PacketHeader {
        &self.header
    }

    /// Payload, exactly [`size`](Self::size) bytes
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Declared payload length
    #[inline]
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Copy `bytes` into the payload at `offset`
    pub fn write_payload(&mut self, offset: usize, bytes: &[u8]) -> Result<(), SrtPacketError> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= self.size())
            .ok_or(SrtPacketError::WriteOutOfBounds {
                offset,
                len: bytes.len(),
                length: self.size(),
            })?;
        self.buffer[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Hand the packet to the engine's send path
    pub fn into_data_packet(self) -> DataPacket {
        DataPacket {
            header: self.header,
            payload: self.buffer.freeze(),
        }
    }
}
