//! Consensus over the outcomes of a dispatch round.
//!
//! The evaluator partitions successful payloads into classes of
//! structurally equal values; the aggregator folds outcomes and verdict
//! into the round's report.
//!
//! ## Rules
//!
//! - **Agreed**: at least one success, and every success carries the same payload
//! - **Agreement ratio**: size of the largest class over the number of successes
//! - **Dissent**: successful providers outside the largest class
//!
//! Failures never count against agreement; a round without successes is a
//! valid report with `agreed = false`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use xfaas::consensus::{ConsensusEvaluator, ResultAggregator};
//!
//! let verdict = ConsensusEvaluator::evaluate(&outcomes);
//! let report = ResultAggregator::aggregate(&task, outcomes, verdict);
//! if !report.verdict.agreed {
//!     println!("dissent: {:?}", report.verdict.dissenting_providers);
//! }
//! ```

mod aggregator;
mod evaluator;

pub use aggregator::ResultAggregator;
pub use evaluator::{payload_fingerprint, ConsensusEvaluator};
