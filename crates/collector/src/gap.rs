//! Order book sequence-gap auditing.
//!
//! Per-symbol monotonic sequence tracking. The audit only classifies and is
//! never rewound; no resynchronization is attempted after a gap; the
//! collector logs and continues.

/// Classification of one observed sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// First sequenced event for this symbol.
    First,
    /// Exactly one past the previous sequence.
    InOrder,
    /// Jumped ahead, skipping `missed` updates.
    Gap { missed: i64 },
    /// At or behind the previous sequence; audit state keeps `last`.
    Stale { last: i64 },
}

/// Mutable per-symbol audit state. Owned exclusively by one collector.
#[derive(Debug, Default)]
pub struct GapAudit {
    last_sequence: Option<i64>,
}

impl GapAudit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `sequence` against the last observed value and advances the
    /// state monotonically. A stale observation never rewinds it.
    pub fn observe(&mut self, sequence: i64) -> SequenceCheck {
        let Some(last) = self.last_sequence else {
            self.last_sequence = Some(sequence);
            return SequenceCheck::First;
        };

        if sequence <= last {
            return SequenceCheck::Stale { last };
        }

        self.last_sequence = Some(sequence);
        if sequence == last + 1 {
            SequenceCheck::InOrder
        } else {
            SequenceCheck::Gap {
                missed: sequence - last - 1,
            }
        }
    }

    #[must_use]
    pub fn last_sequence(&self) -> Option<i64> {
        self.last_sequence
    }
}
