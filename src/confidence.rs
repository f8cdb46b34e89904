//! Pure confidence state machine (§4.7). The transactional wrapper lives on
//! [`crate::store::Store::apply_feedback`]; this module only computes the
//! new state so it can be unit-tested without a database.

use serde::{Deserialize, Serialize};

/// A feedback signal recorded against an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSignal {
    Helpful,
    Incorrect,
    NotRelevant,
}

impl FeedbackSignal {
    /// Canonical signed delta applied to `confidence` before clamping.
    pub fn delta(self) -> f64 {
        match self {
            FeedbackSignal::Helpful => 0.08,
            FeedbackSignal::Incorrect => -0.15,
            FeedbackSignal::NotRelevant => 0.0,
        }
    }

    /// `true` when the signal increments `validation_count` and
    /// `last_validated_at`.
    pub fn is_helpful(self) -> bool {
        matches!(self, FeedbackSignal::Helpful)
    }
}

/// Result of applying a feedback signal to a confidence value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceTransition {
    pub new_confidence: f64,
    pub validation_count_incremented: bool,
}

/// Clamp `current + delta` into `[0.0, 1.0]` and report whether validation
/// count should be incremented.
pub fn apply(current: f64, signal: FeedbackSignal) -> ConfidenceTransition {
    let new_confidence = (current + signal.delta()).clamp(0.0, 1.0);
    ConfidenceTransition {
        new_confidence,
        validation_count_incremented: signal.is_helpful(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpful_increments_and_clamps_at_one() {
        let t = apply(0.97, FeedbackSignal::Helpful);
        assert!((t.new_confidence - 1.0).abs() < 1e-9);
        assert!(t.validation_count_incremented);

        let t = apply(1.0, FeedbackSignal::Helpful);
        assert_eq!(t.new_confidence, 1.0);
    }

    #[test]
    fn incorrect_decrements_and_clamps_at_zero() {
        let t = apply(0.05, FeedbackSignal::Incorrect);
        assert_eq!(t.new_confidence, 0.0);
        assert!(!t.validation_count_incremented);

        let t = apply(0.0, FeedbackSignal::Incorrect);
        assert_eq!(t.new_confidence, 0.0);
    }

    #[test]
    fn not_relevant_is_a_no_op_on_confidence() {
        let t = apply(0.42, FeedbackSignal::NotRelevant);
        assert_eq!(t.new_confidence, 0.42);
        assert!(!t.validation_count_incremented);
    }

    #[test]
    fn exact_scenario_helpful_delta() {
        let t = apply(0.7, FeedbackSignal::Helpful);
        assert!((t.new_confidence - 0.78).abs() < 1e-9);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn signal(tag: u8) -> FeedbackSignal {
        match tag % 3 {
            0 => FeedbackSignal::Helpful,
            1 => FeedbackSignal::Incorrect,
            _ => FeedbackSignal::NotRelevant,
        }
    }

    proptest! {
        #[test]
        fn apply_always_clamps_into_unit_range(current in -10.0f64..10.0, tag in 0u8..3) {
            let t = apply(current, signal(tag));
            prop_assert!(t.new_confidence >= 0.0 && t.new_confidence <= 1.0);
        }

        #[test]
        fn not_relevant_never_touches_confidence(current in 0.0f64..=1.0) {
            let t = apply(current, FeedbackSignal::NotRelevant);
            prop_assert_eq!(t.new_confidence, current);
            prop_assert!(!t.validation_count_incremented);
        }
    }
}
