//! Pass-through filter
//!
//! Adds no redundancy and reports every loss immediately, which is what the
//! engine does when no filter is configured.

use crate::arq::ArqLevel;
use crate::config::FilterConfig;
use crate::filter::{FilterError, SrtPacketFilter};
use crate::packet::SrtPacket;
use crate::session::SessionParameters;
use crate::tracker::LossTracker;
use srt_protocol::{DataPacket, LossReport, SeqNumber};

pub struct NoOpFilter {
    tracker: LossTracker,
}

impl NoOpFilter {
    pub const NAME: &'static str = "noop";

    pub fn new(params: &SessionParameters, config: &FilterConfig) -> Result<Self, FilterError> {
        config.check_known(&[])?;
        Ok(NoOpFilter {
            tracker: LossTracker::new(ArqLevel::Always, params.rcv_isn()),
        })
    }

    pub fn create(
        params: &SessionParameters,
        config: &FilterConfig,
    ) -> Result<Box<dyn SrtPacketFilter>, FilterError> {
        Ok(Box::new(NoOpFilter::new(params, config)?))
    }
}

impl SrtPacketFilter for NoOpFilter {
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
}
