//! Cluster-wide tag throttling for distributed key-value stores.
//!
//! weir computes advisory per-client transaction rate limits from three
//! inputs: per-tag throughput quotas held in a durable key range, per-tag
//! cost telemetry streamed from storage servers, and per-server health
//! ratios. It publishes limits, it does not enforce them; transaction
//! frontends are expected to carry the advertised rates to clients.
//!
//! The crate is a library intended to be embedded in a cluster controller
//! process. See [`throttler::GlobalTagThrottler`] for the entry point.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::perf)]
#![deny(clippy::suspicious)]
#![deny(clippy::complexity)]
#![deny(clippy::unnecessary_to_owned)]
#![deny(clippy::float_cmp)]
#![deny(clippy::large_stack_arrays)]
#![deny(clippy::large_futures)]
#![deny(clippy::rc_buffer)]
#![deny(clippy::redundant_allocation)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod quota;
pub(crate) mod stats;
pub mod store;
pub mod telemetry;
pub mod throttler;

pub use config::Config;
pub use quota::{ServerId, Tag, TagQuota};
pub use throttler::GlobalTagThrottler;
