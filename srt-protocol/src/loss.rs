//! Loss ranges and loss reports
//!
//! A loss report is the list of sequence ranges a receiver asks to have
//! retransmitted. Ranges in a report are kept ordered by start, never
//! overlap, and adjacent ranges are coalesced.

use crate::sequence::SeqNumber;
use std::fmt;

/// Loss sequence range (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LossRange {
    /// First sequence number in range
    pub start: SeqNumber,
    /// Last sequence number in range (inclusive)
    pub end: SeqNumber,
}

impl LossRange {
    pub fn new(start: SeqNumber, end: SeqNumber) -> Self {
        debug_assert!(start.le(end), "loss range {}..={} is inverted", start, end);
        LossRange { start, end }
    }

    pub fn single(seq: SeqNumber) -> Self {
        LossRange { start: seq, end: seq }
    }

    pub fn contains(&self, seq: SeqNumber) -> bool {
        seq.ge(self.start) && seq.le(self.end)
    }

    /// Number of sequence numbers covered
    pub fn len(&self) -> usize {
        self.start.distance_to(self.end) as usize + 1
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// Merge with another range if they overlap or are adjacent
    pub fn try_merge(&self, other: &LossRange) -> Option<LossRange> {
        if other.start.le(self.end.next()) && other.end.ge(self.start.prev()) {
            Some(LossRange {
                start: if self.start.lt(other.start) {
                    self.start
                } else {
                    other.start
                },
                end: self.end.max_of(other.end),
            })
        } else {
            None
        }
    }

    /// Remove `seq` from the range, returning what is left (0, 1 or 2 ranges)
    pub fn without(&self, seq: SeqNumber) -> (Option<LossRange>, Option<LossRange>) {
        if !self.contains(seq) {
            return (Some(*self), None);
        }
        let before = (seq != self.start).then(|| LossRange::new(self.start, seq.prev()));
        let after = (seq != self.end).then(|| LossRange::new(seq.next(), self.end));
        (before, after)
    }
}

impl fmt::Display for LossRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "[{}]", self.start)
        } else {
            write!(f, "[{}..={}]", self.start, self.end)
        }
    }
}

/// Ordered, coalesced list of loss ranges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LossReport {
    ranges: Vec<LossRange>,
}

impl LossReport {
    pub fn new() -> Self {
        LossReport::default()
    }

    /// Add a range, keeping the report ordered and coalesced
    pub fn push(&mut self, range: LossRange) {
        // Fast path: appending past the current tail
        if let Some(last) = self.ranges.last_mut() {
            if let Some(merged) = last.try_merge(&range) {
                if range.start.ge(last.start) {
                    *last = merged;
                    return;
                }
            } else if range.start.gt(last.end) {
                self.ranges.push(range);
                return;
            }
        } else {
            self.ranges.push(range);
            return;
        }

        let mut merged = range;
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut placed = false;
        for existing in self.ranges.drain(..) {
            if let Some(m) = merged.try_merge(&existing) {
                merged = m;
            } else if existing.end.lt(merged.start) {
                out.push(existing);
            } else {
                if !placed {
                    out.push(merged);
                    placed = true;
                }
                out.push(existing);
            }
        }
        if !placed {
            out.push(merged);
        }
        self.ranges = out;
    }

    pub fn push_seq(&mut self, seq: SeqNumber) {
        self.push(LossRange::single(seq));
    }

    /// Append every range of another report
    pub fn extend_from(&mut self, other: &LossReport) {
        for range in &other.ranges {
            self.push(*range);
        }
    }

    pub fn ranges(&self) -> &[LossRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Total number of sequence numbers reported
    pub fn packet_count(&self) -> usize {
        self.ranges.iter().map(LossRange::len).sum()
    }

    pub fn contains(&self, seq: SeqNumber) -> bool {
        self.ranges.iter().any(|r| r.contains(seq))
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &LossRange> {
        self.ranges.iter()
    }
}

impl<'a> IntoIterator for &'a LossReport {
    type Item = &'a LossRange;
    type IntoIter = std::slice::Iter<'a, LossRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> LossRange {
        LossRange::new(SeqNumber::new(start), SeqNumber::new(end))
    }

    #[test]
    fn test_loss_range_merge() {
        let merged = range(10, 15).try_merge(&range(16, 20)).unwrap();
        assert_eq!(merged, range(10, 20));
        assert!(range(10, 15).try_merge(&range(20, 25)).is_none());
    }

    #[test]
    fn test_loss_range_len_across_wrap() {
        let r = LossRange::new(SeqNumber::new(crate::sequence::MAX_SEQ_NUMBER - 1), SeqNumber::new(2));
        assert_eq!(r.len(), 5);
    }

    #[test]
    fn test_loss_range_without() {
        assert_eq!(range(10, 12).without(SeqNumber::new(11)), (Some(range(10, 10)), Some(range(12, 12))));
        assert_eq!(range(10, 12).without(SeqNumber::new(10)), (None, Some(range(11, 12))));
        assert_eq!(range(10, 10).without(SeqNumber::new(10)), (None, None));
        assert_eq!(range(10, 12).without(SeqNumber::new(20)), (Some(range(10, 12)), None));
    }

    #[test]
    fn test_report_coalesces_adjacent() {
        let mut report = LossReport::new();
        report.push(range(10, 11));
        report.push(range(12, 12));
        report.push(range(20, 21));
        assert_eq!(report.ranges(), &[range(10, 12), range(20, 21)]);
        assert_eq!(report.packet_count(), 5);
    }

    #[test]
    fn test_report_out_of_order_push() {
        let mut report = LossReport::new();
        report.push(range(30, 31));
        report.push(range(10, 10));
        report.push(range(20, 29));
        report.push(range(5, 6));
        assert_eq!(report.ranges(), &[range(5, 6), range(10, 10), range(20, 31)]);
    }

    #[test]
    fn test_report_overlapping_push() {
        let mut report = LossReport::new();
        report.push(range(10, 20));
        report.push(range(15, 25));
        report.push(range(1, 30));
        assert_eq!(report.ranges(), &[range(1, 30)]);
    }
}
