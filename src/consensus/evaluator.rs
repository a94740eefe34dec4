//! Agreement among successful provider payloads.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::responses::{AgreementGroup, ConsensusVerdict, ProviderOutcome};

/// Consensus evaluator.
///
/// Partitions successful payloads into classes of structurally equal values
/// and reports whether exactly one class exists.
pub struct ConsensusEvaluator;

impl ConsensusEvaluator {
    /// Computes the verdict of a round.
    ///
    /// - Equality is deep structural equality of the JSON payload: object key
    ///   order is irrelevant, `512` and `512.0` are different values.
    /// - The reference class is the largest one; ties go to the class holding
    ///   the earliest provider.
    /// - Failures take no part in the partition.
    pub fn evaluate(outcomes: &[ProviderOutcome]) -> ConsensusVerdict {
        let mut classes: Vec<(&Value, Vec<&str>)> = Vec::new();
        let mut successes = 0usize;

        for entry in outcomes {
            let Some(payload) = entry.outcome.payload() else {
                continue;
            };
            successes += 1;

            match classes.iter_mut().find(|(reference, _)| *reference == payload) {
                Some((_, members)) => members.push(&entry.provider),
                None => classes.push((payload, vec![entry.provider.as_str()])),
            }
        }

        if successes == 0 {
            return ConsensusVerdict::indeterminate();
        }

        // Classes are created in provider order, so keeping the first maximum
        // implements the tie-break.
        let mut largest = 0;
        for (index, (_, members)) in classes.iter().enumerate() {
            if members.len() > classes[largest].1.len() {
                largest = index;
            }
        }

        let (reference, majority) = &classes[largest];
        let agreement_ratio = majority.len() as f64 / successes as f64;

        let dissenting_providers = outcomes
            .iter()
            .filter(|entry| entry.outcome.payload().is_some_and(|p| p != *reference))
            .map(|entry| entry.provider.clone())
            .collect();

        let groups = classes
            .iter()
            .map(|(payload, members)| AgreementGroup {
                fingerprint: payload_fingerprint(payload),
                providers: members.iter().map(|m| m.to_string()).collect(),
            })
            .collect();

        ConsensusVerdict {
            agreed: classes.len() == 1,
            agreement_ratio,
            reference_payload: Some((*reference).clone()),
            dissenting_providers,
            groups,
        }
    }
}

/// SHA-256 of a payload's canonical JSON encoding, hex encoded.
pub fn payload_fingerprint(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
