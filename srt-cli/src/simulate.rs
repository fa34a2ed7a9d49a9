//! Loopback simulation
//!
//! Drives a sender and a receiver [`PacketFilter`] over an in-memory channel
//! that drops the data packets a scenario names. Every packet the receiver
//! rebuilds is checked against what the sender originally produced.

use crate::scenario::{ScenarioConfig, ScenarioError};
use bytes::Bytes;
use srt_filter::{FilterError, FilterRegistry, FilterStats, PacketFilter};
use srt_protocol::{DataPacket, LossReport, MsgNumber, SeqNumber};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Result of a loopback run
#[derive(Debug, Clone)]
pub struct LoopbackReport {
    /// Canonical filter configuration
    pub config: String,
    pub data_sent: u32,
    pub data_dropped: usize,
    pub control_dropped: u64,
    /// Loss ranges the receiver surfaced, merged
    pub losses: LossReport,
    /// Loss still pending when the run ended
    pub final_poll: LossReport,
    /// Sequence numbers rebuilt by the receiver, in order of recovery
    pub rebuilt: Vec<SeqNumber>,
    /// Rebuilt packets whose content differs from the original
    pub mismatched: Vec<SeqNumber>,
    /// Dropped packets the filter did not rebuild
    pub unrecovered: Vec<SeqNumber>,
    pub sender: FilterStats,
    pub receiver: FilterStats,
}

impl LoopbackReport {
    /// Every dropped packet came back intact
    pub fn fully_recovered(&self) -> bool {
        self.unrecovered.is_empty() && self.mismatched.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SimulateError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Deterministic source packet for `offset`, sized to fit `max_len`
fn source_packet(isn: SeqNumber, offset: u32, socket_id: u32, max_len: usize) -> DataPacket {
    let len = 1 + (offset as usize * 37) % max_len;
    let payload: Vec<u8> = (0..len)
        .map(|i| (offset as usize * 7 + i) as u8)
        .collect();
    DataPacket::new(
        isn + offset,
        MsgNumber::new(offset + 1),
        offset.wrapping_mul(1000),
        socket_id,
        Bytes::from(payload),
    )
}

struct Receiver {
    filter: PacketFilter,
    isn: SeqNumber,
    losses: LossReport,
    rebuilt: Vec<SeqNumber>,
    mismatched: Vec<SeqNumber>,
    arrived: BTreeSet<u32>,
}

impl Receiver {
    fn deliver(&mut self, packet: &DataPacket, originals: &[DataPacket]) {
        let outcome = self.filter.receive(packet);
        if !outcome.is_control {
            self.arrived.insert(packet.seq_number().offset_from(self.isn) as u32);
        }
        if !outcome.losses.is_empty() {
            debug!("Receiver reports loss {:?}", outcome.losses.ranges());
            self.losses.extend_from(&outcome.losses);
        }

        for rebuilt in outcome.rebuilt {
            let seq = rebuilt.seq_number();
            let offset = seq.offset_from(self.isn);
            let intact = usize::try_from(offset)
                .ok()
                .and_then(|i| originals.get(i))
                .map(|original| {
                    original.payload == rebuilt.payload && original.timestamp() == rebuilt.timestamp()
                })
                .unwrap_or(false);

            if intact {
                debug!("Rebuilt {} ({} bytes)", seq, rebuilt.payload.len());
            } else {
                warn!("Rebuilt {} does not match the original", seq);
                self.mismatched.push(seq);
            }
            self.arrived.insert(offset as u32);
            self.rebuilt.push(seq);
        }
    }
}

/// Run `scenario` through a sender/receiver pair built from `registry`
pub fn run_loopback(
    registry: &FilterRegistry,
    scenario: &ScenarioConfig,
) -> Result<LoopbackReport, SimulateError> {
    scenario.validate()?;
    let params = scenario.session.to_parameters().map_err(FilterError::from)?;
    let isn = params.snd_isn();

    let mut sender = PacketFilter::configure(registry, params, &scenario.filter.config)?;
    let receiver_filter = PacketFilter::configure(registry, params, &scenario.filter.config)?;
    let max_len = sender.data_payload_size();

    info!(
        "Loopback '{}': {} packets, {} dropped, {} bytes of data per packet",
        sender.config(),
        scenario.run.packets,
        scenario.run.drop.len(),
        max_len
    );

    let drops: BTreeSet<u32> = scenario.run.drop.iter().copied().collect();
    let mut receiver = Receiver {
        filter: receiver_filter,
        isn,
        losses: LossReport::new(),
        rebuilt: Vec::new(),
        mismatched: Vec::new(),
        arrived: BTreeSet::new(),
    };
    let mut originals = Vec::with_capacity(scenario.run.packets as usize);
    let mut control_dropped = 0u64;

    for offset in 0..=scenario.run.packets {
        let seq = isn + offset;

        // control packets go out before the next data packet
        while let Some(control) = sender.pack_control_packet(seq)? {
            if scenario.run.drop_control {
                control_dropped += 1;
                continue;
            }
            receiver.deliver(&control, &originals);
        }

        if offset == scenario.run.packets {
            break;
        }

        let packet = source_packet(isn, offset, params.socket_id(), max_len);
        sender.feed_source(&packet);
        originals.push(packet.clone());

        if drops.contains(&offset) {
            debug!("Channel drops {}", seq);
            continue;
        }
        receiver.deliver(&packet, &originals);
    }

    let final_poll = receiver.filter.poll_losses();
    let unrecovered: Vec<SeqNumber> = drops
        .iter()
        .filter(|offset| !receiver.arrived.contains(offset))
        .map(|offset| isn + *offset)
        .collect();

    Ok(LoopbackReport {
        config: sender.config().to_string(),
        data_sent: scenario.run.packets,
        data_dropped: drops.len(),
        control_dropped,
        losses: receiver.losses,
        final_poll,
        rebuilt: receiver.rebuilt,
        mismatched: receiver.mismatched,
        unrecovered,
        sender: sender.stats().clone(),
        receiver: receiver.filter.stats().clone(),
    })
}
