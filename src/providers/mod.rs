//! Provider adapters.
//!
//! Each adapter wraps one execution backend behind the single
//! [`ProviderAdapter`] capability. The dispatcher is written against the
//! trait only.

mod base;
mod command;
mod http;
mod registry;

pub use base::{decode_outcome, remaining, FunctionResponse, ProviderAdapter};
pub use command::CommandProvider;
pub use http::HttpProvider;
pub use registry::{build_provider, ProviderRegistry};
