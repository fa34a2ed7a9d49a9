//! XOR parity forward error correction
//!
//! Data packets are grouped by their offset from the initial sequence
//! number. With `cols = C` every run of `C` consecutive packets forms a row
//! group. With `rows = R > 1` the packets are also arranged in blocks of
//! `R * C`, where column `i` of a block groups the packets at offsets
//! `i, i + C, ..., i + (R - 1) * C`.
//!
//! For each completed group the sender emits one control packet carrying
//! the XOR of the members' payloads (zero padded), payload lengths,
//! timestamps and message flags. A receiver holding the parity and all but
//! one member of a group rebuilds the missing one. A rebuilt packet is fed
//! into the groups of the other dimension, which may in turn become
//! recoverable.
//!
//! A negative `rows` (`rows:-N`) keeps the `N`-row block layout but drops
//! the row dimension: no row control packets are formed or expected.
//!
//! Control packet layout (payload, after the SRT header):
//!
//! ```text
//!  0        1        2                 4
//! +--------+--------+-----------------+---------------------------+
//! | index  | flags  |  length clip    |  payload clip ...         |
//! +--------+--------+-----------------+---------------------------+
//! ```
//!
//! `index` is -1 for a row group, otherwise the column index. The header's
//! sequence number is that of the last packet the group covers, the message
//! number is [`MSGNO_CONTROL`] and the timestamp holds the timestamp clip.

use super::ARQ_PARAM;
use crate::arq::ArqLevel;
use crate::config::FilterConfig;
use crate::filter::{FilterError, SrtPacketFilter};
use crate::packet::SrtPacket;
use crate::session::{SessionError, SessionParameters};
use crate::tracker::{Arrival, LossTracker, RESYNC_ARRIVALS};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use srt_protocol::packet::{HeaderField, MSGNO_CONTROL};
use srt_protocol::{DataPacket, LossReport, MsgNumber, SeqNumber};
use std::collections::{HashMap, VecDeque};
use std::ops::RangeInclusive;
use tracing::{debug, error, trace, warn};

/// Size of the FEC control header in front of the payload clip
pub const FEC_HEADER_SIZE: usize = 4;

/// Accepted range for `cols`
pub const COLS_RANGE: RangeInclusive<u32> = 2..=127;

/// Accepted magnitude for `rows`; a negative value (at least 2 rows) means
/// columns only
pub const ROWS_RANGE: RangeInclusive<u32> = 1..=256;

/// Control packet index marking a row group
const ROW_INDEX: i8 = -1;

/// Receiver keeps groups of this many most recent blocks
const RCV_BLOCK_WINDOW: u32 = 3;

/// How far past the receive window a control packet may point
const RCV_CONTROL_LEAD: u32 = 1 << 12;

/// Message sequence given to rebuilt packets (the original is not recoverable)
const REBUILT_MSG_SEQ: u32 = 1;

fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// XOR accumulator over the fields a group protects
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParityClip {
    flags: u8,
    length: u16,
    timestamp: u32,
    payload: Vec<u8>,
}

impl ParityClip {
    fn new(clip_len: usize) -> Self {
        ParityClip {
            flags: 0,
            length: 0,
            timestamp: 0,
            payload: vec![0; clip_len],
        }
    }

    fn clear(&mut self) {
        self.flags = 0;
        self.length = 0;
        self.timestamp = 0;
        self.payload.fill(0);
    }

    /// XOR a data packet in; `false` if its payload does not fit the clip
    fn absorb_packet(&mut self, packet: &DataPacket) -> bool {
        if packet.payload.len() > self.payload.len() {
            return false;
        }
        self.flags ^= packet.msg_number().flag_bits();
        self.length ^= packet.payload.len() as u16;
        self.timestamp ^= packet.timestamp();
        xor_into(&mut self.payload, &packet.payload);
        true
    }

    fn absorb_clip(&mut self, other: &ParityClip) {
        self.flags ^= other.flags;
        self.length ^= other.length;
        self.timestamp ^= other.timestamp;
        xor_into(&mut self.payload, &other.payload);
    }

    fn encode(&self, index: i8, buf: &mut BytesMut) {
        buf.put_i8(index);
        buf.put_u8(self.flags);
        buf.put_u16(self.length);
        buf.put_slice(&self.payload);
    }

    fn decode(packet: &DataPacket, clip_len: usize) -> Option<(i8, ParityClip)> {
        if packet.payload.len() != FEC_HEADER_SIZE + clip_len {
            return None;
        }

        let mut buf = &packet.payload[..];
        let index = buf.get_i8();
        let flags = buf.get_u8();
        let length = buf.get_u16();
        Some((
            index,
            ParityClip {
                flags,
                length,
                timestamp: packet.timestamp(),
                payload: buf.to_vec(),
            },
        ))
    }
}

/// Group being filled on the send path
#[derive(Debug)]
struct SendGroup {
    base: SeqNumber,
    collected: u32,
    broken: bool,
    clip: ParityClip,
}

impl SendGroup {
    fn new(base: SeqNumber, clip_len: usize) -> Self {
        SendGroup {
            base,
            collected: 0,
            broken: false,
            clip: ParityClip::new(clip_len),
        }
    }

    fn reset(&mut self, base: SeqNumber) {
        self.base = base;
        self.collected = 0;
        self.broken = false;
        self.clip.clear();
    }

    /// Members must arrive at consecutive positions or the parity is useless
    fn add(&mut self, position: u32, packet: &DataPacket) {
        if !self.broken && (position != self.collected || !self.clip.absorb_packet(packet)) {
            debug!(
                "FEC group at {} broken by sequence {}",
                self.base,
                packet.seq_number()
            );
            self.broken = true;
        }
        self.collected = position + 1;
    }
}

/// Group being collected on the receive path
#[derive(Debug)]
struct RecvGroup {
    base: SeqNumber,
    step: u32,
    received: Vec<bool>,
    count: usize,
    clip: ParityClip,
    parity: Option<ParityClip>,
    closed: bool,
}

impl RecvGroup {
    fn new(base: SeqNumber, step: u32, size: u32, clip_len: usize) -> Self {
        RecvGroup {
            base,
            step,
            received: vec![false; size as usize],
            count: 0,
            clip: ParityClip::new(clip_len),
            parity: None,
            closed: false,
        }
    }

    fn add(&mut self, position: usize, packet: &DataPacket, socket_id: u32) -> Option<DataPacket> {
        if self.closed || self.received[position] {
            return None;
        }
        self.received[position] = true;
        self.count += 1;

        if !self.clip.absorb_packet(packet) {
            debug!(
                "Sequence {} does not fit the FEC clip, group at {} closed",
                packet.seq_number(),
                self.base
            );
            self.closed = true;
            return None;
        }
        self.try_rebuild(socket_id)
    }

    fn set_parity(&mut self, parity: ParityClip, socket_id: u32) -> Option<DataPacket> {
        if self.closed || self.parity.is_some() {
            return None;
        }
        self.parity = Some(parity);
        self.try_rebuild(socket_id)
    }

    fn try_rebuild(&mut self, socket_id: u32) -> Option<DataPacket> {
        if self.count == self.received.len() {
            self.closed = true;
            return None;
        }
        if self.count + 1 != self.received.len() {
            return None;
        }
        let parity = self.parity.as_ref()?;
        let position = self.received.iter().position(|r| !r)?;

        let mut clip = self.clip.clone();
        clip.absorb_clip(parity);
        self.received[position] = true;
        self.count += 1;
        self.closed = true;

        let seq = self.base + position as u32 * self.step;
        let length = clip.length as usize;
        if length > clip.payload.len() {
            debug!("FEC rebuild of {} yields bogus length {}", seq, length);
            return None;
        }

        let msg = MsgNumber::from_raw(((clip.flags as u32) << 26) | REBUILT_MSG_SEQ);
        Some(DataPacket::new(
            seq,
            msg,
            clip.timestamp,
            socket_id,
            Bytes::copy_from_slice(&clip.payload[..length]),
        ))
    }
}

/// Where a received sequence number falls relative to the receive window
enum Placement {
    Stale,
    Within(u32),
    Beyond,
}

#[derive(Debug, Clone, Copy)]
struct Geometry {
    cols: u32,
    rows: u32,
    row_parity: bool,
}

impl Geometry {
    fn block(&self) -> u32 {
        self.cols * self.rows
    }

    fn has_columns(&self) -> bool {
        self.rows > 1
    }
}

pub struct FecFilter {
    geometry: Geometry,
    level: ArqLevel,
    socket_id: u32,
    clip_len: usize,

    snd_row: SendGroup,
    snd_block_base: SeqNumber,
    snd_columns: Vec<SendGroup>,
    snd_ready: VecDeque<(SeqNumber, SrtPacket)>,

    rcv_anchor: SeqNumber,
    rcv_rows: HashMap<SeqNumber, RecvGroup>,
    rcv_columns: HashMap<SeqNumber, RecvGroup>,
    rcv_strays: Vec<DataPacket>,
    rebuilt: Vec<DataPacket>,
    rebuilt_total: u64,
    tracker: LossTracker,
    anomalies: u64,
}

fn bounded(name: &str, value: u32, range: RangeInclusive<u32>) -> Result<u32, FilterError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(FilterError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: format!("must be in {}..={}", range.start(), range.end()),
        })
    }
}

impl FecFilter {
    pub const NAME: &'static str = "fec";

    pub fn new(params: &SessionParameters, config: &FilterConfig) -> Result<Self, FilterError> {
        config.check_known(&["cols", "rows", ARQ_PARAM])?;

        let cols = bounded("cols", config.require_param("cols")?, COLS_RANGE)?;
        let rows_param: i32 = config.parse_param("rows")?.unwrap_or(1);
        let rows = rows_param.unsigned_abs();
        let row_parity = rows_param > 0;
        if !ROWS_RANGE.contains(&rows) || (!row_parity && rows < 2) {
            return Err(FilterError::InvalidParameter {
                name: "rows".to_string(),
                value: rows_param.to_string(),
                reason: format!(
                    "must be in {}..={}, or -{}..=-2 for columns only",
                    ROWS_RANGE.start(),
                    ROWS_RANGE.end(),
                    ROWS_RANGE.end()
                ),
            });
        }
        let level = config
            .parse_param::<ArqLevel>(ARQ_PARAM)?
            .unwrap_or(ArqLevel::OnRequest);

        if params.payload_size() <= FEC_HEADER_SIZE {
            return Err(SessionError::PayloadTooSmall {
                size: params.payload_size(),
                required: FEC_HEADER_SIZE + 1,
            }
            .into());
        }
        let clip_len = params.payload_size() - FEC_HEADER_SIZE;
        let geometry = Geometry {
            cols,
            rows,
            row_parity,
        };
        let snd_isn = params.snd_isn();

        let snd_columns = if geometry.has_columns() {
            (0..cols)
                .map(|i| SendGroup::new(snd_isn + i, clip_len))
                .collect()
        } else {
            Vec::new()
        };

        debug!(
            "FEC filter configured: cols={} rows={} row_parity={} arq={} clip={}",
            cols, rows, row_parity, level, clip_len
        );

        Ok(FecFilter {
            geometry,
            level,
            socket_id: params.socket_id(),
            clip_len,
            snd_row: SendGroup::new(snd_isn, clip_len),
            snd_block_base: snd_isn,
            snd_columns,
            snd_ready: VecDeque::new(),
            rcv_anchor: params.rcv_isn(),
            rcv_rows: HashMap::new(),
            rcv_columns: HashMap::new(),
            rcv_strays: Vec::with_capacity(RESYNC_ARRIVALS),
            rebuilt: Vec::new(),
            rebuilt_total: 0,
            tracker: LossTracker::new(level, params.rcv_isn()),
            anomalies: 0,
        })
    }

    pub fn create(
        params: &SessionParameters,
        config: &FilterConfig,
    ) -> Result<Box<dyn SrtPacketFilter>, FilterError> {
        Ok(Box::new(FecFilter::new(params, config)?))
    }

    pub fn cols(&self) -> u32 {
        self.geometry.cols
    }

    pub fn rows(&self) -> u32 {
        self.geometry.rows
    }

    /// Packets rebuilt over the filter's lifetime
    pub fn rebuilt_total(&self) -> u64 {
        self.rebuilt_total
    }

    /// Whether row groups carry parity
    pub fn row_parity(&self) -> bool {
        self.geometry.row_parity
    }

    /// Received packets the filter could not interpret
    pub fn anomalies(&self) -> u64 {
        self.anomalies + self.tracker.anomalies()
    }

    /// Control packets waiting for a send slot
    pub fn pending_control(&self) -> usize {
        self.snd_ready.len()
    }

    // Send path

    fn control_packet(&self, index: i8, last: SeqNumber, clip: &ParityClip) -> Option<SrtPacket> {
        let mut buf = BytesMut::with_capacity(FEC_HEADER_SIZE + self.clip_len);
        clip.encode(index, &mut buf);

        let mut packet = match SrtPacket::new(buf.len()) {
            Ok(packet) => packet,
            Err(e) => {
                error!("Cannot build FEC control packet: {}", e);
                return None;
            }
        };
        if let Err(e) = packet.write_payload(0, &buf) {
            error!("Cannot fill FEC control packet: {}", e);
            return None;
        }
        packet.set_header(HeaderField::SeqNo, last.as_raw());
        packet.set_header(HeaderField::MsgNo, MSGNO_CONTROL);
        packet.set_header(HeaderField::Timestamp, clip.timestamp);
        packet.set_header(HeaderField::Id, self.socket_id);
        Some(packet)
    }

    fn enqueue(&mut self, last: SeqNumber, packet: SrtPacket) {
        // at most one row parity plus one parity per column can be due at once
        let limit = self.geometry.cols as usize + 1;
        if self.snd_ready.len() >= limit {
            if let Some((dropped, _)) = self.snd_ready.pop_front() {
                warn!("FEC control queue full, dropping parity for {}", dropped);
            }
        }
        trace!("FEC parity ready for {}", last);
        self.snd_ready.push_back((last, packet));
    }

    fn feed_row(&mut self, seq: SeqNumber, packet: &DataPacket) {
        let cols = self.geometry.cols;
        let offset = seq.offset_from(self.snd_row.base);
        if offset < 0 {
            debug!("Sequence {} precedes current FEC row {}", seq, self.snd_row.base);
            return;
        }

        let mut offset = offset as u32;
        if offset >= cols {
            let skip = offset / cols * cols;
            if self.snd_row.collected > 0 {
                debug!("Abandoning incomplete FEC row at {}", self.snd_row.base);
            }
            let base = self.snd_row.base + skip;
            self.snd_row.reset(base);
            offset -= skip;
        }

        self.snd_row.add(offset, packet);
        if offset == cols - 1 {
            if !self.snd_row.broken {
                if let Some(control) = self.control_packet(ROW_INDEX, seq, &self.snd_row.clip) {
                    self.enqueue(seq, control);
                }
            }
            let next = self.snd_row.base + cols;
            self.snd_row.reset(next);
        }
    }

    fn feed_columns(&mut self, seq: SeqNumber, packet: &DataPacket) {
        let Geometry { cols, rows, .. } = self.geometry;
        let block = self.geometry.block();
        let offset = seq.offset_from(self.snd_block_base);
        if offset < 0 {
            return;
        }

        let mut offset = offset as u32;
        if offset >= block {
            let skip = offset / block * block;
            self.snd_block_base = self.snd_block_base + skip;
            for (i, group) in self.snd_columns.iter_mut().enumerate() {
                group.reset(self.snd_block_base + i as u32);
            }
            offset -= skip;
        }

        let column = (offset % cols) as usize;
        let row = offset / cols;
        self.snd_columns[column].add(row, packet);

        if row == rows - 1 {
            let group = &self.snd_columns[column];
            if !group.broken {
                if let Some(control) = self.control_packet(column as i8, seq, &group.clip) {
                    self.enqueue(seq, control);
                }
            }
            let next = self.snd_columns[column].base + block;
            self.snd_columns[column].reset(next);
        }
    }

    // Receive path

    /// Locate `seq` relative to the window; data vetted by the tracker
    /// passes no horizon and may move the window any distance forward
    fn place(&self, seq: SeqNumber, horizon: Option<u32>) -> Placement {
        let offset = seq.offset_from(self.rcv_anchor);
        if offset < 0 {
            Placement::Stale
        } else if horizon.is_some_and(|h| offset as u32 > h) {
            Placement::Beyond
        } else {
            Placement::Within(offset as u32)
        }
    }

    fn control_horizon(&self) -> u32 {
        RCV_BLOCK_WINDOW * self.geometry.block() + RCV_CONTROL_LEAD
    }

    /// Restart the window at the block holding `anchor`, dropping all groups
    fn resync(&mut self, anchor: SeqNumber) {
        let block = self.geometry.block() as i64;
        let aligned = (anchor.offset_from(self.rcv_anchor) as i64).div_euclid(block) * block;
        self.rcv_anchor = if aligned >= 0 {
            self.rcv_anchor + aligned as u32
        } else {
            self.rcv_anchor - aligned.unsigned_abs() as u32
        };
        warn!(
            "FEC receive window restarted at {} ({} row and {} column groups dropped)",
            self.rcv_anchor,
            self.rcv_rows.len(),
            self.rcv_columns.len()
        );
        self.rcv_rows.clear();
        self.rcv_columns.clear();
    }

    /// Slide the window so `offset` falls within the newest kept block,
    /// returning the offset relative to the new anchor
    fn advance_anchor(&mut self, offset: u32) -> u32 {
        let block = self.geometry.block();
        let block_offset = offset / block * block;
        if block_offset < RCV_BLOCK_WINDOW * block {
            return offset;
        }

        let shift = block_offset - (RCV_BLOCK_WINDOW - 1) * block;
        self.rcv_anchor = self.rcv_anchor + shift;
        let anchor = self.rcv_anchor;
        self.rcv_rows.retain(|base, _| base.ge(anchor));
        self.rcv_columns.retain(|base, _| base.ge(anchor));
        trace!("FEC receive window now starts at {}", anchor);
        offset - shift
    }

    fn row_key(&self, offset: u32) -> (SeqNumber, usize) {
        let cols = self.geometry.cols;
        (self.rcv_anchor + offset / cols * cols, (offset % cols) as usize)
    }

    fn column_key(&self, offset: u32) -> (SeqNumber, usize) {
        let cols = self.geometry.cols;
        let block = self.geometry.block();
        let base = self.rcv_anchor + offset / block * block + offset % cols;
        (base, ((offset % block) / cols) as usize)
    }

    /// Feed received packets into their groups, following any recoveries
    fn cascade(&mut self, mut work: Vec<DataPacket>, losses: &mut LossReport) {
        let Geometry { cols, rows, .. } = self.geometry;

        while let Some(packet) = work.pop() {
            let offset = match self.place(packet.seq_number(), None) {
                Placement::Within(offset) => self.advance_anchor(offset),
                _ => continue,
            };

            let clip_len = self.clip_len;
            let row_rebuilt = if self.geometry.row_parity {
                let (base, position) = self.row_key(offset);
                self.rcv_rows
                    .entry(base)
                    .or_insert_with(|| RecvGroup::new(base, 1, cols, clip_len))
                    .add(position, &packet, self.socket_id)
            } else {
                None
            };

            let column_rebuilt = if self.geometry.has_columns() {
                let (base, position) = self.column_key(offset);
                self.rcv_columns
                    .entry(base)
                    .or_insert_with(|| RecvGroup::new(base, cols, rows, clip_len))
                    .add(position, &packet, self.socket_id)
            } else {
                None
            };

            for rebuilt in row_rebuilt.into_iter().chain(column_rebuilt) {
                self.accept_rebuilt(rebuilt, losses, &mut work);
            }
        }
    }

    fn accept_rebuilt(
        &mut self,
        packet: DataPacket,
        losses: &mut LossReport,
        work: &mut Vec<DataPacket>,
    ) {
        // a packet waiting in `work` is not yet known to its other group
        if work.iter().any(|p| p.seq_number() == packet.seq_number()) {
            return;
        }
        debug!("FEC rebuilt sequence {}", packet.seq_number());
        self.tracker.on_arrival(packet.seq_number(), losses);
        self.rebuilt_total += 1;
        self.rebuilt.push(packet.clone());
        work.push(packet);
    }

    fn receive_control(&mut self, packet: &DataPacket, losses: &mut LossReport) -> bool {
        let Some((index, parity)) = ParityClip::decode(packet, self.clip_len) else {
            self.anomalies += 1;
            debug!(
                "Malformed FEC control packet {} ({} bytes)",
                packet.seq_number(),
                packet.payload.len()
            );
            return false;
        };

        let seq = packet.seq_number();
        let offset = match self.place(seq, Some(self.control_horizon())) {
            Placement::Within(offset) => self.advance_anchor(offset),
            Placement::Stale => {
                trace!("FEC control packet {} arrived after its window", seq);
                return true;
            }
            Placement::Beyond => {
                self.anomalies += 1;
                debug!("FEC control packet {} is beyond the receive window", seq);
                return false;
            }
        };

        let Geometry { cols, rows, .. } = self.geometry;
        let clip_len = self.clip_len;
        let (groups, base, step, size, last) = if index == ROW_INDEX && self.geometry.row_parity {
            let (base, _) = self.row_key(offset);
            (&mut self.rcv_rows, base, 1, cols, base + (cols - 1))
        } else if index >= 0 && (index as u32) < cols && self.geometry.has_columns() {
            let block = self.geometry.block();
            let base = self.rcv_anchor + offset / block * block + index as u32;
            (&mut self.rcv_columns, base, cols, rows, base + (rows - 1) * cols)
        } else {
            self.anomalies += 1;
            debug!("FEC control packet {} has invalid index {}", seq, index);
            return false;
        };

        if last != seq {
            self.anomalies += 1;
            debug!(
                "FEC control packet {} does not close its group (expected {})",
                seq, last
            );
            return false;
        }

        let rebuilt = groups
            .entry(base)
            .or_insert_with(|| RecvGroup::new(base, step, size, clip_len))
            .set_parity(parity, self.socket_id);

        if let Some(rebuilt) = rebuilt {
            let mut work = Vec::new();
            self.accept_rebuilt(rebuilt, losses, &mut work);
            self.cascade(work, losses);
        }
        true
    }
}

impl SrtPacketFilter for FecFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn extra_size(&self) -> usize {
        FEC_HEADER_SIZE
    }

    fn pack_control_packet(&mut self, seq: SeqNumber) -> Option<SrtPacket> {
        match self.snd_ready.front() {
            Some((last, _)) if last.lt(seq) => self.snd_ready.pop_front().map(|(_, p)| p),
            _ => None,
        }
    }

    fn feed_source(&mut self, packet: &DataPacket) {
        if packet.is_filter_control() {
            return;
        }
        let seq = packet.seq_number();
        if self.geometry.row_parity {
            self.feed_row(seq, packet);
        }
        if self.geometry.has_columns() {
            self.feed_columns(seq, packet);
        }
    }

    fn receive(&mut self, packet: &DataPacket, losses: &mut LossReport) -> bool {
        if packet.is_filter_control() {
            return self.receive_control(packet, losses);
        }

        match self.tracker.on_arrival(packet.seq_number(), losses) {
            Arrival::OutOfWindow => {
                if self.rcv_strays.len() == RESYNC_ARRIVALS {
                    self.rcv_strays.remove(0);
                }
                self.rcv_strays.push(packet.clone());
            }
            Arrival::Resync { anchor } => {
                self.resync(anchor);
                let mut work = std::mem::take(&mut self.rcv_strays);
                // strays the tracker did not resync on stay out
                work.retain(|p| self.tracker.in_window(p.seq_number()));
                work.push(packet.clone());
                self.cascade(work, losses);
            }
            _ => {
                self.rcv_strays.clear();
                self.cascade(vec![packet.clone()], losses);
            }
        }
        false
    }

    fn arq_level(&self) -> ArqLevel {
        self.level
    }

    fn poll_losses(&mut self, losses: &mut LossReport) {
        self.tracker.poll(losses);
    }

    fn take_rebuilt(&mut self, out: &mut Vec<DataPacket>) {
        out.append(&mut self.rebuilt);
    }
}
