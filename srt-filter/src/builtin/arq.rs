//! Selective-ARQ bookkeeping filter
//!
//! Sends no redundancy. It only decides when detected loss is handed to the
//! engine, according to the `arq` tunable (default `always`).

use super::ARQ_PARAM;
use crate::arq::ArqLevel;
use crate::config::FilterConfig;
use crate::filter::{FilterError, SrtPacketFilter};
use crate::packet::SrtPacket;
use crate::session::SessionParameters;
use crate::tracker::LossTracker;
use srt_protocol::{DataPacket, LossReport, SeqNumber};
use tracing::debug;

pub struct ArqFilter {
    tracker: LossTracker,
}

impl ArqFilter {
    pub const NAME: &'static str = "arq";

    pub fn new(params: &SessionParameters, config: &FilterConfig) -> Result<Self, FilterError> {
        config.check_known(&[ARQ_PARAM])?;
        let level = config
            .parse_param::<ArqLevel>(ARQ_PARAM)?
            .unwrap_or(ArqLevel::Always);

        debug!("ARQ filter configured, level {}", level);
        Ok(ArqFilter {
            tracker: LossTracker::new(level, params.rcv_isn()),
        })
    }

    pub fn create(
        params: &SessionParameters,
        config: &FilterConfig,
    ) -> Result<Box<dyn SrtPacketFilter>, FilterError> {
        Ok(Box::new(ArqFilter::new(params, config)?))
    }
}

impl SrtPacketFilter for ArqFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn extra_size(&self) -> usize {
        0
    }

    fn pack_control_packet(&mut self, _seq: SeqNumber) -> Option<SrtPacket> {
        None
    }

    fn feed_source(&mut self, _packet: &DataPacket) {}

    fn receive(&mut self, packet: &DataPacket, losses: &mut LossReport) -> bool {
        self.tracker.on_arrival(packet.seq_number(), losses);
        false
    }

    fn arq_level(&self) -> ArqLevel {
        self.tracker.level()
    }

    fn poll_losses(&mut self, losses: &mut LossReport) {
        self.tracker.poll(losses);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use srt_protocol::{LossRange, MsgNumber};

    fn build(text: &str) -> Result<ArqFilter, FilterError> {
        let params =
            SessionParameters::new(1, SeqNumber::new(0), SeqNumber::new(0), 1316).unwrap();
        ArqFilter::new(&params, &FilterConfig::parse(text).unwrap())
    }

    fn packet(n: u32) -> DataPacket {
        DataPacket::new(SeqNumber::new(n), MsgNumber::new(1), 0, 1, Bytes::new())
    }

    #[test]
    fn test_level_from_config() {
        assert_eq!(build("arq").unwrap().arq_level(), ArqLevel::Always);
        assert_eq!(build("arq,arq:never").unwrap().arq_level(), ArqLevel::Never);
        assert_eq!(build("arq,arq:onreq").unwrap().arq_level(), ArqLevel::OnRequest);
        assert!(matches!(
            build("arq,arq:maybe"),
            Err(FilterError::InvalidParameter { .. })
        ));
        assert!(matches!(
            build("arq,cols:4"),
            Err(FilterError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_on_request_waits_for_poll() {
        let mut filter = build("arq,arq:onreq").unwrap();
        let mut losses = LossReport::new();
        filter.receive(&packet(0), &mut losses);
        filter.receive(&packet(4), &mut losses);
        assert!(losses.is_empty());

        filter.poll_losses(&mut losses);
        assert_eq!(
            losses.ranges(),
            &[LossRange::new(SeqNumber::new(1), SeqNumber::new(3))]
        );
    }
}
