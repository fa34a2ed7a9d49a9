//! Engine-side filter owner
//!
//! [`PacketFilter`] is what a connection holds for its whole lifetime. It
//! resolves the configuration string, owns the filter instance, validates
//! every control packet before it reaches the channel, and keeps the
//! counters the connection statistics report.

use crate::arq::ArqLevel;
use crate::config::FilterConfig;
use crate::filter::{FilterError, SrtPacketFilter};
use crate::registry::FilterRegistry;
use crate::session::SessionParameters;
use srt_protocol::{DataPacket, LossReport, SeqNumber};
use tracing::{error, info, warn};

/// Lifecycle state of a filter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Built, no data has flowed yet
    Configured,
    /// At least one packet was fed or received
    Active,
}

/// Filter statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Data packets observed on the send path
    pub packets_fed: u64,
    /// Control packets handed to the channel
    pub control_sent: u64,
    /// Packets passed to `receive`
    pub packets_received: u64,
    /// Received packets recognized as filter control packets
    pub control_received: u64,
    /// Packets rebuilt by the filter
    pub packets_rebuilt: u64,
    /// Loss ranges surfaced to the engine
    pub loss_ranges_reported: u64,
    /// Sequence numbers covered by those ranges
    pub loss_packets_reported: u64,
}

/// Result of handing one incoming packet to the filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveOutcome {
    /// The packet belongs to the filter and must not reach the application
    pub is_control: bool,
    /// Loss to request retransmission for
    pub losses: LossReport,
    /// Packets the filter rebuilt, to be delivered like received data
    pub rebuilt: Vec<DataPacket>,
}

pub struct PacketFilter {
    filter: Box<dyn SrtPacketFilter>,
    config: FilterConfig,
    params: SessionParameters,
    extra_size: usize,
    arq_level: ArqLevel,
    state: FilterState,
    stats: FilterStats,
}

impl PacketFilter {
    /// Parse `text` and build the filter it names
    pub fn configure(
        registry: &FilterRegistry,
        params: SessionParameters,
        text: &str,
    ) -> Result<Self, FilterError> {
        let config = FilterConfig::parse(text)?;
        PacketFilter::new(registry, params, config)
    }

    pub fn new(
        registry: &FilterRegistry,
        params: SessionParameters,
        config: FilterConfig,
    ) -> Result<Self, FilterError> {
        let filter = registry.create(&params, &config)?;
        let extra_size = filter.extra_size();
        let arq_level = filter.arq_level();

        if extra_size >= params.payload_size() {
            return Err(FilterError::CapacityViolation {
                filter: filter.name(),
                size: extra_size,
                max: params.payload_size(),
            });
        }

        info!(
            "Packet filter '{}' ready: extra={} arq={}",
            config, extra_size, arq_level
        );

        Ok(PacketFilter {
            filter,
            config,
            params,
            extra_size,
            arq_level,
            state: FilterState::Configured,
            stats: FilterStats::default(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.filter.name()
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn params(&self) -> &SessionParameters {
        &self.params
    }

    /// Space reserved in every packet, fixed at construction
    pub fn extra_size(&self) -> usize {
        self.extra_size
    }

    /// Payload space left for application data
    pub fn data_payload_size(&self) -> usize {
        self.params.payload_size() - self.extra_size
    }

    /// Loss report policy, fixed at construction
    pub fn arq_level(&self) -> ArqLevel {
        self.arq_level
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// Ask the filter for a control packet to send before sequence `seq`
    pub fn pack_control_packet(&mut self, seq: SeqNumber) -> Result<Option<DataPacket>, FilterError> {
        let Some(packet) = self.filter.pack_control_packet(seq) else {
            return Ok(None);
        };

        let max = self.params.payload_size();
        if packet.size() > max {
            error!(
                "Filter '{}' built a {} byte control packet, capacity is {}",
                self.filter.name(),
                packet.size(),
                max
            );
            return Err(FilterError::CapacityViolation {
                filter: self.filter.name(),
                size: packet.size(),
                max,
            });
        }

        self.stats.control_sent += 1;
        Ok(Some(packet.into_data_packet()))
    }

    /// Show an outgoing data packet to the filter
    pub fn feed_source(&mut self, packet: &DataPacket) {
        self.state = FilterState::Active;
        self.stats.packets_fed += 1;
        self.filter.feed_source(packet);
    }

    /// Hand an incoming packet to the filter
    pub fn receive(&mut self, packet: &DataPacket) -> ReceiveOutcome {
        self.state = FilterState::Active;
        self.stats.packets_received += 1;

        let mut losses = LossReport::new();
        let is_control = self.filter.receive(packet, &mut losses);
        let mut rebuilt = Vec::new();
        self.filter.take_rebuilt(&mut rebuilt);

        if is_control {
            self.stats.control_received += 1;
        }
        self.stats.packets_rebuilt += rebuilt.len() as u64;
        self.account_losses(&mut losses);

        ReceiveOutcome {
            is_control,
            losses,
            rebuilt,
        }
    }

    /// Collect loss recorded for explicit polling
    pub fn poll_losses(&mut self) -> LossReport {
        let mut losses = LossReport::new();
        self.filter.poll_losses(&mut losses);
        self.account_losses(&mut losses);
        losses
    }

    fn account_losses(&mut self, losses: &mut LossReport) {
        if losses.is_empty() {
            return;
        }
        if self.arq_level == ArqLevel::Never {
            warn!(
                "Filter '{}' reported loss under arq=never, discarding",
                self.filter.name()
            );
            losses.clear();
            return;
        }
        self.stats.loss_ranges_reported += losses.len() as u64;
        self.stats.loss_packets_reported += losses.packet_count() as u64;
    }
}
