//! # xfaas
//!
//! Cross-provider dispatch and consensus engine.
//!
//! One task is sent to several independently operated serverless backends
//! at once; their results are collected under per-call and overall timeouts
//! and compared to decide whether the providers agree.
//!
//! ## Modules
//!
//! - [`providers`] - Adapters that reach one backend each
//! - [`dispatch`] - Concurrent fan-out and collection
//! - [`consensus`] - Agreement verdict and report assembly
//! - [`hooks`] - Dispatch lifecycle hooks
//! - [`storage`] - JSON persistence of reports
//! - [`orchestrator`] - Wires configuration, providers, hooks and storage
//! - [`cli`] - Command-line interface
//! - [`types`] - Shared types
//!
//! ## Example
//!
//! ```rust,ignore
//! use xfaas::orchestrator::Orchestrator;
//! use xfaas::types::requests::Task;
//! use xfaas::Config;
//!
//! let orchestrator = Orchestrator::new(Config::load_or_default("xfaas.toml"))?;
//! let report = orchestrator.run(Task::new("bell_state", 1024)).await?;
//! println!("agreed: {}", report.verdict.agreed);
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod consensus;
pub mod dispatch;
pub mod hooks;
pub mod orchestrator;
pub mod providers;
pub mod storage;
pub mod types;

pub use types::config::Config;
pub use types::errors::{XfaasError, XfaasResult};
