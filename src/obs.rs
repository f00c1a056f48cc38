//! Optional observability helpers for broker operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `credential_broker.operation` with `operation` and
//!   `stage` fields, plus warnings for best-effort steps (logout, persistence) that failed.
//! - Enable `metrics` to increment the `credential_broker_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Steps of the acquisition chain and sign-out, used as span and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Fast path served from the credential record.
	Cache,
	/// Silent acquisition from the provider's cache.
	Silent,
	/// Refresh-token exchange.
	Refresh,
	/// Resource authority discovery.
	Discovery,
	/// Interactive sign-in prompt.
	Interactive,
	/// Sign-out and record reset.
	SignOut,
	/// Persistence of the credential record.
	Persist,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::Cache => "cache",
			Stage::Silent => "silent",
			Stage::Refresh => "refresh",
			Stage::Discovery => "discovery",
			Stage::Interactive => "interactive",
			Stage::SignOut => "sign_out",
			Stage::Persist => "persist",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// Stage produced a usable result.
	Success,
	/// Stage failed (the chain may still fall back).
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
