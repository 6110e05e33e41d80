//! Optional observability helpers for relay flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `catalog_relay.flow` with the
//!   `flow` and `stage` fields.
//! - Enable `metrics` to increment the `catalog_relay_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Relay flows observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Client-credentials exchange against the token endpoint.
	Issue,
	/// Token freshness check and re-issuance.
	Refresh,
	/// Proxied catalog API call.
	Proxy,
	/// Entry point dispatch through an invoker.
	Invoke,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Issue => "issue",
			FlowKind::Refresh => "refresh",
			FlowKind::Proxy => "proxy",
			FlowKind::Invoke => "invoke",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a relay flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records success or failure for a finished flow, logging the error when tracing is enabled.
pub fn record_result<T>(kind: FlowKind, result: &Result<T>) {
	match result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			#[cfg(feature = "tracing")]
			::tracing::warn!(flow = kind.as_str(), error = %e, "Relay flow failed.");
			#[cfg(not(feature = "tracing"))]
			let _ = e;

			record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}
}
