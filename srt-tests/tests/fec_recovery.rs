//! FEC recovery through a pair of engine-side filters

use bytes::Bytes;
use proptest::prelude::*;
use srt_filter::{FilterRegistry, PacketFilter, SessionParameters};
use srt_protocol::packet::MsgNumber;
use srt_protocol::{DataPacket, SeqNumber};
use std::collections::{BTreeMap, BTreeSet};

const SOCKET_ID: u32 = 321;

fn source(seq: SeqNumber, index: u32) -> DataPacket {
    let len = 20 + (index as usize * 13) % 200;
    let payload: Vec<u8> = (0..len).map(|i| (index as usize + i * 3) as u8).collect();
    DataPacket::new(seq, MsgNumber::new(index + 1), index * 40, SOCKET_ID, Bytes::from(payload))
}

/// Send `count` packets from `isn`, dropping `lost` offsets, and return what
/// the receiver rebuilt keyed by offset
fn transfer(
    config: &str,
    isn: u32,
    count: u32,
    lost: &BTreeSet<u32>,
) -> (BTreeMap<u32, DataPacket>, Vec<DataPacket>, PacketFilter) {
    let registry = FilterRegistry::builtin();
    let params = SessionParameters::new(SOCKET_ID, SeqNumber::new(isn), SeqNumber::new(isn), 512).unwrap();
    let mut sender = PacketFilter::configure(&registry, params, config).unwrap();
    let mut receiver = PacketFilter::configure(&registry, params, config).unwrap();
    let isn = SeqNumber::new(isn);

    let mut rebuilt = BTreeMap::new();
    let mut originals = Vec::new();
    let mut collect = |receiver: &mut PacketFilter, packet: &DataPacket| {
        for packet in receiver.receive(packet).rebuilt {
            let offset = packet.seq_number().offset_from(isn) as u32;
            assert!(rebuilt.insert(offset, packet).is_none(), "rebuilt {} twice", offset);
        }
    };

    for offset in 0..=count {
        while let Some(control) = sender.pack_control_packet(isn + offset).unwrap() {
            collect(&mut receiver, &control);
        }
        if offset == count {
            break;
        }
        let packet = source(isn + offset, offset);
        sender.feed_source(&packet);
        originals.push(packet.clone());
        if !lost.contains(&offset) {
            collect(&mut receiver, &packet);
        }
    }

    (rebuilt, originals, receiver)
}

fn assert_rebuilt_intact(rebuilt: &BTreeMap<u32, DataPacket>, originals: &[DataPacket]) {
    for (offset, packet) in rebuilt {
        let original = &originals[*offset as usize];
        assert_eq!(packet.seq_number(), original.seq_number());
        assert_eq!(packet.payload, original.payload);
        assert_eq!(packet.timestamp(), original.timestamp());
        assert_eq!(packet.msg_number().boundary, original.msg_number().boundary);
    }
}

#[test]
fn test_row_and_column_recovery() {
    // a burst of three in the first row, repaired by columns then the row
    let lost: BTreeSet<u32> = [2, 3, 4, 17].into_iter().collect();
    let (rebuilt, originals, mut receiver) = transfer("fec,cols:6,rows:4", 1000, 48, &lost);

    assert_eq!(rebuilt.keys().copied().collect::<BTreeSet<_>>(), lost);
    assert_rebuilt_intact(&rebuilt, &originals);
    assert!(receiver.poll_losses().is_empty());
}

#[test]
fn test_unrecoverable_loss_reported_on_poll() {
    let lost: BTreeSet<u32> = [1, 2].into_iter().collect();
    let (rebuilt, _, mut receiver) = transfer("fec,cols:4", 10, 8, &lost);

    assert!(rebuilt.is_empty());
    let polled = receiver.poll_losses();
    assert_eq!(polled.packet_count(), 2);
    assert!(polled.contains(SeqNumber::new(11)));
    assert!(polled.contains(SeqNumber::new(12)));
}

#[test]
fn test_recovery_across_wraparound() {
    let isn = srt_protocol::sequence::MAX_SEQ_NUMBER - 5;
    let lost: BTreeSet<u32> = [4, 9].into_iter().collect();
    let (rebuilt, originals, _) = transfer("fec,cols:4,rows:2", isn, 16, &lost);

    assert_eq!(rebuilt.len(), 2);
    assert_eq!(rebuilt[&4].seq_number(), SeqNumber::new(srt_protocol::sequence::MAX_SEQ_NUMBER - 1));
    assert_eq!(rebuilt[&9].seq_number(), SeqNumber::new(3));
    assert_rebuilt_intact(&rebuilt, &originals);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_single_loss_per_row_recovered(
        cols in 2u32..12,
        rows in 1u32..5,
        picks in prop::collection::vec(prop::option::of(0u32..12), 1..12),
    ) {
        let count = cols * rows * 2;
        let lost: BTreeSet<u32> = picks
            .iter()
            .enumerate()
            .filter_map(|(row, pick)| pick.map(|p| row as u32 * cols + p % cols))
            .filter(|offset| *offset < count)
            .collect();

        let config = format!("fec,cols:{},rows:{}", cols, rows);
        let (rebuilt, originals, _) = transfer(&config, 7, count, &lost);

        prop_assert_eq!(rebuilt.keys().copied().collect::<BTreeSet<_>>(), lost);
        assert_rebuilt_intact(&rebuilt, &originals);
    }
}
