//! Property-based tests for the packet filter subsystem
//!
//! These tests use proptest to generate headers, configuration strings and
//! receive sequences, and check the invariants every filter must keep.

use bytes::Bytes;
use proptest::prelude::*;
use srt_filter::{ArqLevel, ConfigError, FilterConfig, FilterRegistry, PacketFilter, SessionParameters, SrtPacket};
use srt_protocol::packet::{HeaderField, MsgNumber, HEADER_FIELD_COUNT, MAX_PAYLOAD_SIZE};
use srt_protocol::sequence::MAX_SEQ_NUMBER;
use srt_protocol::{DataPacket, LossRange, SeqNumber};

// Property test strategies

fn identifier_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,11}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.:/-]{1,16}"
}

fn config_text_strategy() -> impl Strategy<Value = String> {
    (
        identifier_strategy(),
        prop::collection::btree_map(identifier_strategy(), value_strategy(), 0..6),
    )
        .prop_map(|(filter_type, params)| {
            let mut text = filter_type;
            for (name, value) in params {
                text.push(',');
                text.push_str(&name);
                text.push(':');
                text.push_str(&value);
            }
            text
        })
}

fn arq_level_strategy() -> impl Strategy<Value = ArqLevel> {
    prop_oneof![
        Just(ArqLevel::Never),
        Just(ArqLevel::OnRequest),
        Just(ArqLevel::Always),
    ]
}

/// Sequence offsets mostly moving forward, with some gaps and late arrivals
fn arrival_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(
        prop_oneof![
            6 => Just(1i64),
            2 => 2i64..20,
            2 => -10i64..0,
        ],
        1..200,
    )
    .prop_map(|steps| {
        let mut position = 0i64;
        steps
            .into_iter()
            .map(|step| {
                position = (position + step).max(0);
                position as u32
            })
            .collect()
    })
}

fn session(isn: u32) -> SessionParameters {
    SessionParameters::new(1, SeqNumber::new(isn), SeqNumber::new(isn), 1316).unwrap()
}

fn data(seq: SeqNumber) -> DataPacket {
    DataPacket::new(seq, MsgNumber::new(1), 0, 1, Bytes::from_static(b"payload"))
}

proptest! {
    #[test]
    fn prop_header_fields_roundtrip(fields in any::<[u32; HEADER_FIELD_COUNT]>(), len in 0..=MAX_PAYLOAD_SIZE) {
        let mut packet = SrtPacket::new(len).unwrap();
        for field in HeaderField::ALL {
            packet.set_header(field, fields[field.index()]);
        }
        for field in HeaderField::ALL {
            prop_assert_eq!(packet.header(field), fields[field.index()]);
        }
        prop_assert_eq!(packet.headers().fields(), fields);
    }

    #[test]
    fn prop_packet_length_invariant(
        len in 0..=MAX_PAYLOAD_SIZE,
        offset in 0..MAX_PAYLOAD_SIZE + 16,
        bytes in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut packet = SrtPacket::new(len).unwrap();
        let fits = offset + bytes.len() <= len;
        prop_assert_eq!(packet.write_payload(offset, &bytes).is_ok(), fits);
        prop_assert_eq!(packet.size(), len);
        prop_assert_eq!(packet.data().len(), len);
        if fits {
            prop_assert_eq!(&packet.data()[offset..offset + bytes.len()], &bytes[..]);
        }
    }

    #[test]
    fn prop_config_parse_idempotent(text in config_text_strategy()) {
        let first = FilterConfig::parse(&text).unwrap();
        let second = FilterConfig::parse(&text).unwrap();
        prop_assert_eq!(&first, &second);

        // the canonical form parses back to the same value
        let canonical = first.to_string();
        prop_assert_eq!(FilterConfig::parse(&canonical).unwrap(), first);
    }

    #[test]
    fn prop_config_rejects_duplicates(
        text in config_text_strategy(),
        name in identifier_strategy(),
        a in value_strategy(),
        b in value_strategy(),
    ) {
        let doubled = format!("{},{}:{},{}:{}", text, name, a, name, b);
        let result = FilterConfig::parse(&doubled);
        prop_assert_eq!(result, Err(ConfigError::DuplicateParameter(name)));
    }

    #[test]
    fn prop_config_rejects_blank(blank in "[ \t]{0,4}") {
        prop_assert_eq!(FilterConfig::parse(&blank), Err(ConfigError::Empty));
    }

    #[test]
    fn prop_policy_stable(level in arq_level_strategy(), arrivals in arrival_strategy()) {
        let registry = FilterRegistry::builtin();
        let text = format!("arq,arq:{}", level);
        let mut filter = PacketFilter::configure(&registry, session(0), &text).unwrap();

        prop_assert_eq!(filter.arq_level(), level);
        for offset in arrivals {
            filter.receive(&data(SeqNumber::new(offset)));
            filter.poll_losses();
            prop_assert_eq!(filter.arq_level(), level);
        }
    }

    #[test]
    fn prop_loss_reports_ordered(
        level in arq_level_strategy(),
        use_fec in any::<bool>(),
        isn in prop_oneof![Just(0u32), Just(MAX_SEQ_NUMBER - 50), 0..MAX_SEQ_NUMBER],
        arrivals in arrival_strategy(),
    ) {
        let registry = FilterRegistry::builtin();
        let text = if use_fec {
            format!("fec,cols:5,rows:2,arq:{}", level)
        } else {
            format!("arq,arq:{}", level)
        };
        let mut filter = PacketFilter::configure(&registry, session(isn), &text).unwrap();
        let isn = SeqNumber::new(isn);

        let mut reported: Vec<LossRange> = Vec::new();
        for offset in arrivals {
            let outcome = filter.receive(&data(isn + offset));
            reported.extend(outcome.losses.iter().copied());
            reported.extend(filter.poll_losses().iter().copied());
        }

        if level == ArqLevel::Never {
            prop_assert!(reported.is_empty());
        }
        for range in &reported {
            prop_assert!(range.start.le(range.end));
        }
        for pair in reported.windows(2) {
            prop_assert!(
                pair[0].end.lt(pair[1].start),
                "{} and {} are out of order or overlap",
                pair[0],
                pair[1]
            );
        }
    }
}
