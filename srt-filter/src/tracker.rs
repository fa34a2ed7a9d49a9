//! Receiver-side loss tracking shared by the built-in filters
//!
//! The tracker follows the highest sequence number seen, records every gap
//! behind it, and forgets a lost sequence again when the packet shows up late
//! or is rebuilt. When a gap is surfaced depends on the [`ArqLevel`]:
//! immediately on detection (`Always`), on the next poll (`OnRequest`), or
//! never.
//!
//! An arrival further than [`MAX_SEQ_JUMP`] from the expected sequence is
//! not trusted on its own. When [`RESYNC_ARRIVALS`] such arrivals in a row
//! agree with each other, the sender evidently moved on (a long outage), and
//! tracking restarts from there. Loss recorded before the jump is forgotten
//! and the outage itself is not reported.

use crate::arq::ArqLevel;
use srt_protocol::{LossRange, LossReport, SeqNumber};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Maximum number of loss ranges remembered at once
pub const MAX_TRACKED_RANGES: usize = 1024;

/// Largest sequence jump accepted as a plausible arrival
pub const MAX_SEQ_JUMP: i32 = 1 << 16;

/// Consecutive agreeing out-of-window arrivals that trigger a resync
pub const RESYNC_ARRIVALS: usize = 3;

/// How an arrival relates to what was seen before
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// The next expected sequence number
    InOrder,
    /// Ahead of the expected sequence; the skipped range was recorded
    Gap(LossRange),
    /// Behind the expected sequence; `filled` if it was recorded as lost
    Belated { filled: bool },
    /// Too far from the expected sequence to be trusted
    OutOfWindow,
    /// Tracking restarted at `anchor` after a run of out-of-window arrivals
    Resync { anchor: SeqNumber },
}

#[derive(Debug, Clone, Copy)]
struct TrackedLoss {
    range: LossRange,
    reported: bool,
}

#[derive(Debug)]
pub struct LossTracker {
    level: ArqLevel,
    next_expected: SeqNumber,
    losses: VecDeque<TrackedLoss>,
    strays: Vec<SeqNumber>,
    anomalies: u64,
    resyncs: u64,
}

impl LossTracker {
    pub fn new(level: ArqLevel, rcv_isn: SeqNumber) -> Self {
        LossTracker {
            level,
            next_expected: rcv_isn,
            losses: VecDeque::new(),
            strays: Vec::with_capacity(RESYNC_ARRIVALS),
            anomalies: 0,
            resyncs: 0,
        }
    }

    pub fn level(&self) -> ArqLevel {
        self.level
    }

    /// Sequence number expected next
    pub fn next_expected(&self) -> SeqNumber {
        self.next_expected
    }

    /// Arrivals rejected as out of window
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    /// Times tracking restarted after a sequence jump
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Whether `seq` would be tracked rather than treated as a stray
    pub fn in_window(&self, seq: SeqNumber) -> bool {
        within_jump(seq, self.next_expected)
    }

    /// Record the arrival of `seq`, appending newly detected loss to `report`
    /// when the level is `Always`
    pub fn on_arrival(&mut self, seq: SeqNumber, report: &mut LossReport) -> Arrival {
        if !within_jump(seq, self.next_expected) {
            return self.on_stray(seq, report);
        }
        self.strays.clear();
        self.track(seq, report)
    }

    fn on_stray(&mut self, seq: SeqNumber, report: &mut LossReport) -> Arrival {
        if let Some(first) = self.strays.first() {
            if !within_jump(seq, *first) {
                self.strays.clear();
            }
        }
        self.strays.push(seq);

        if self.strays.len() < RESYNC_ARRIVALS {
            self.anomalies += 1;
            debug!(
                "Ignoring sequence {} ({} away from expected {})",
                seq,
                seq.offset_from(self.next_expected),
                self.next_expected
            );
            return Arrival::OutOfWindow;
        }

        let strays = std::mem::take(&mut self.strays);
        let first = strays[0];
        let anchor = strays
            .iter()
            .copied()
            .min_by_key(|s| s.offset_from(first))
            .unwrap_or(first);

        warn!(
            "Sequence jumped from {} to {}, restarting loss tracking ({} ranges forgotten)",
            self.next_expected,
            anchor,
            self.losses.len()
        );
        self.resyncs += 1;
        self.losses.clear();
        self.next_expected = anchor;
        for stray in strays {
            self.track(stray, report);
        }

        Arrival::Resync { anchor }
    }

    fn track(&mut self, seq: SeqNumber, report: &mut LossReport) -> Arrival {
        let offset = seq.offset_from(self.next_expected);

        if offset == 0 {
            self.next_expected = seq.next();
            return Arrival::InOrder;
        }

        if offset < 0 {
            let filled = self.remove(seq);
            trace!("Belated sequence {} (filled={})", seq, filled);
            return Arrival::Belated { filled };
        }

        let gap = LossRange::new(self.next_expected, seq.prev());
        self.next_expected = seq.next();

        let reported = self.level == ArqLevel::Always;
        if reported {
            report.push(gap);
        }
        self.record(TrackedLoss {
            range: gap,
            reported,
        });
        debug!("Detected loss {} (level {})", gap, self.level);

        Arrival::Gap(gap)
    }

    /// Append every recorded, not yet reported loss (`OnRequest` only)
    pub fn poll(&mut self, report: &mut LossReport) {
        if self.level != ArqLevel::OnRequest {
            return;
        }

        for loss in self.losses.iter_mut().filter(|l| !l.reported) {
            report.push(loss.range);
            loss.reported = true;
        }
    }

    /// Whether `seq` is currently recorded as lost
    pub fn is_lost(&self, seq: SeqNumber) -> bool {
        self.losses.iter().any(|l| l.range.contains(seq))
    }

    /// Ranges still recorded as lost, reported or not
    pub fn pending(&self) -> impl Iterator<Item = LossRange> + '_ {
        self.losses.iter().map(|l| l.range)
    }

    /// Total number of sequence numbers still recorded as lost
    pub fn pending_count(&self) -> usize {
        self.losses.iter().map(|l| l.range.len()).sum()
    }

    fn record(&mut self, loss: TrackedLoss) {
        if self.losses.len() == MAX_TRACKED_RANGES {
            if let Some(dropped) = self.losses.pop_front() {
                warn!("Loss list full, forgetting {}", dropped.range);
            }
        }
        self.losses.push_back(loss);
    }

    fn remove(&mut self, seq: SeqNumber) -> bool {
        let Some(index) = self.losses.iter().position(|l| l.range.contains(seq)) else {
            return false;
        };

        let entry = self.losses[index];
        match entry.range.without(seq) {
            (None, None) => {
                self.losses.remove(index);
            }
            (Some(before), None) => self.losses[index].range = before,
            (None, Some(after)) => self.losses[index].range = after,
            (Some(before), Some(after)) => {
                self.losses[index].range = before;
                self.losses.insert(
                    index + 1,
                    TrackedLoss {
                        range: after,
                        reported: entry.reported,
                    },
                );
            }
        }
        true
    }
}

fn within_jump(seq: SeqNumber, base: SeqNumber) -> bool {
    (-MAX_SEQ_JUMP..=MAX_SEQ_JUMP).contains(&seq.offset_from(base))
}
