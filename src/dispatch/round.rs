//! Per-round outcome collection.

use crate::types::responses::{Outcome, ProviderOutcome};

/// Lifecycle of one dispatch round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Adapters invoked, nothing collected yet.
    Pending,
    /// Some outcomes in, deadline not reached.
    PartiallyComplete,
    /// All outcomes in, or the overall deadline elapsed. Terminal.
    Complete,
}

impl std::fmt::Display for RoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundState::Pending => write!(f, "pending"),
            RoundState::PartiallyComplete => write!(f, "partially_complete"),
            RoundState::Complete => write!(f, "complete"),
        }
    }
}

/// Index-addressed outcome slots, one per provider.
///
/// Outcomes arrive in completion order and are stored by provider index, so
/// the finished round is always in input order.
#[derive(Debug)]
pub(crate) struct Round {
    providers: Vec<String>,
    slots: Vec<Option<Outcome>>,
    collected: usize,
    state: RoundState,
}

impl Round {
    pub(crate) fn new(providers: Vec<String>) -> Self {
        let slots = vec![None; providers.len()];
        Self {
            providers,
            slots,
            collected: 0,
            state: RoundState::Pending,
        }
    }

    pub(crate) fn state(&self) -> RoundState {
        self.state
    }

    /// Stores the outcome of provider `index`.
    ///
    /// A slot is written at most once; late or duplicate outcomes and
    /// anything arriving after completion are dropped.
    pub(crate) fn record(&mut self, index: usize, outcome: Outcome) -> bool {
        if self.state == RoundState::Complete {
            return false;
        }
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        if slot.is_some() {
            return false;
        }

        *slot = Some(outcome);
        self.collected += 1;

        let next = if self.collected == self.slots.len() {
            RoundState::Complete
        } else {
            RoundState::PartiallyComplete
        };
        if next != self.state {
            tracing::debug!(from = %self.state, to = %next, "Round state changed");
            self.state = next;
        }
        true
    }

    /// Providers still without an outcome.
    pub(crate) fn outstanding(&self) -> Vec<&str> {
        self.providers
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Closes the round. Empty slots are filled by `missing`.
    pub(crate) fn finish<F>(mut self, missing: F) -> Vec<ProviderOutcome>
    where
        F: Fn(&str) -> Outcome,
    {
        if self.state != RoundState::Complete {
            tracing::debug!(from = %self.state, to = %RoundState::Complete, "Round state changed");
            self.state = RoundState::Complete;
        }

        self.providers
            .into_iter()
            .zip(self.slots)
            .map(|(provider, slot)| {
                let outcome = slot.unwrap_or_else(|| missing(&provider));
                ProviderOutcome::new(provider, outcome)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::responses::ErrorKind;
    use serde_json::json;
    use std::time::Duration;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_state_transitions() {
        let mut round = Round::new(ids(&["a", "b"]));
        assert_eq!(round.state(), RoundState::Pending);

        assert!(round.record(1, Outcome::timeout("late")));
        assert_eq!(round.state(), RoundState::PartiallyComplete);
        assert_eq!(round.outstanding(), vec!["a"]);

        assert!(round.record(0, Outcome::success(json!(1), Duration::ZERO)));
        assert_eq!(round.state(), RoundState::Complete);
        assert!(round.outstanding().is_empty());
    }

    #[test]
    fn test_slot_written_once() {
        let mut round = Round::new(ids(&["a", "b"]));
        assert!(round.record(0, Outcome::success(json!(1), Duration::ZERO)));
        assert!(!round.record(0, Outcome::timeout("again")));
        assert!(!round.record(7, Outcome::timeout("out of range")));

        let outcomes = round.finish(|_| Outcome::timeout("missing"));
        assert!(outcomes[0].outcome.is_success());
    }

    #[test]
    fn test_finish_keeps_input_order_and_fills_gaps() {
        let mut round = Round::new(ids(&["p1", "p2", "p3"]));
        round.record(2, Outcome::success(json!("c"), Duration::ZERO));
        round.record(0, Outcome::success(json!("a"), Duration::ZERO));

        let outcomes = round.finish(|id| Outcome::timeout(format!("{} outstanding", id)));
        let order: Vec<_> = outcomes.iter().map(|o| o.provider.as_str()).collect();
        assert_eq!(order, vec!["p1", "p2", "p3"]);
        assert_eq!(outcomes[1].outcome.error_kind(), Some(ErrorKind::Timeout));
    }
}
