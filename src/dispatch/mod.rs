//! Task dispatcher.
//!
//! Fans one task out to an ordered set of providers, waits for every
//! outcome (bounded by the per-call and overall timeouts) and hands the
//! collected outcomes to the consensus evaluator.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use xfaas::dispatch::{DispatchConfig, Dispatcher};
//! use xfaas::types::requests::Task;
//!
//! let dispatcher = Dispatcher::new(DispatchConfig::new(
//!     Duration::from_secs(30),
//!     Duration::from_secs(60),
//! ));
//! let report = dispatcher.dispatch(&Task::new("bell_state", 1024), registry.all()).await?;
//! println!("agreement: {:.0}%", report.verdict.agreement_ratio * 100.0);
//! ```

mod dispatcher;
mod round;

pub use dispatcher::{dispatch, DispatchConfig, Dispatcher};
pub use round::RoundState;
