/// Outcome of checking an incoming delta's sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Newer than anything applied; merge it
    Apply,
    /// At or below the last applied sequence; drop it
    Stale { last_applied: u64 },
    /// No snapshot yet (or the stream was invalidated); drop it
    AwaitingSnapshot,
}

/// Tracks the last applied sequence number of one market's book
///
/// Deltas are only accepted once a snapshot has anchored the sequence, and
/// only when strictly newer than the last applied one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookSequencer {
    last_applied: Option<u64>,
}

impl BookSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }

    /// Anchor the sequence on a freshly stored snapshot
    pub fn reset_to(&mut self, sequence: u64) {
        self.last_applied = Some(sequence);
    }

    /// Forget the anchor; deltas are dropped until the next snapshot
    pub fn invalidate(&mut self) {
        self.last_applied = None;
    }

    pub fn check(&self, sequence: u64) -> SequenceCheck {
        match self.last_applied {
            None => SequenceCheck::AwaitingSnapshot,
            Some(last) if sequence <= last => SequenceCheck::Stale { last_applied: last },
            Some(_) => SequenceCheck::Apply,
        }
    }

    /// Check and, when applicable, advance to `sequence`
    pub fn accept(&mut self, sequence: u64) -> SequenceCheck {
        let check = self.check(sequence);
        if check == SequenceCheck::Apply {
            self.last_applied = Some(sequence);
        }
        check
    }

    /// Snapshots older than the last applied delta are ignored;
    /// an invalidated sequencer takes any snapshot
    pub fn accept_snapshot(&mut self, sequence: u64) -> bool {
        match self.last_applied {
            Some(last) if sequence < last => false,
            _ => {
                self.last_applied = Some(sequence);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_deltas_wait_for_snapshot() {
        let mut sequencer = BookSequencer::new();
        assert_eq!(sequencer.accept(5), SequenceCheck::AwaitingSnapshot);

        assert!(sequencer.accept_snapshot(10));
        assert_eq!(sequencer.accept(11), SequenceCheck::Apply);
        assert_eq!(sequencer.last_applied(), Some(11));
    }

    #[test]
    fn test_stale_and_duplicate_rejected() {
        let mut sequencer = BookSequencer::new();
        sequencer.reset_to(10);

        assert_eq!(
            sequencer.accept(10),
            SequenceCheck::Stale { last_applied: 10 }
        );
        assert_eq!(sequencer.accept(3), SequenceCheck::Stale { last_applied: 10 });
        assert_eq!(sequencer.accept(12), SequenceCheck::Apply);
        assert_eq!(sequencer.accept(11), SequenceCheck::Stale { last_applied: 12 });
    }

    #[test]
    fn test_old_snapshot_ignored() {
        let mut sequencer = BookSequencer::new();
        sequencer.reset_to(20);

        assert!(!sequencer.accept_snapshot(15));
        assert_eq!(sequencer.last_applied(), Some(20));

        // same sequence re-anchors
        assert!(sequencer.accept_snapshot(20));
    }

    #[test]
    fn test_invalidate_accepts_any_snapshot() {
        let mut sequencer = BookSequencer::new();
        sequencer.reset_to(100);
        sequencer.invalidate();

        assert_eq!(sequencer.check(101), SequenceCheck::AwaitingSnapshot);
        assert!(sequencer.accept_snapshot(1));
        assert_eq!(sequencer.accept(2), SequenceCheck::Apply);
    }

    proptest! {
        #[test]
        fn prop_applied_sequences_strictly_increase(
            snapshot in 0u64..50,
            sequences in prop::collection::vec(0u64..200, 0..100)
        ) {
            let mut sequencer = BookSequencer::new();
            sequencer.reset_to(snapshot);
            let mut applied = vec![snapshot];
            for seq in sequences {
                if sequencer.accept(seq) == SequenceCheck::Apply {
                    applied.push(seq);
                }
            }
            prop_assert!(applied.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
