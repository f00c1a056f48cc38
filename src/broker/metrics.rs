// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{self, Stage, StageOutcome};

/// Thread-safe attempt/success/failure counters for one stage.
#[derive(Debug, Default)]
pub struct StageCounters {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
}
impl StageCounters {
	/// Number of times the stage was entered.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Number of times the stage produced the final result.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Number of times the stage failed (including fallbacks to the next stage).
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	fn record(&self, outcome: StageOutcome) {
		let counter = match outcome {
			StageOutcome::Attempt => &self.attempts,
			StageOutcome::Success => &self.successes,
			StageOutcome::Failure => &self.failures,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}
}

/// Per-stage counters maintained by a [`Broker`](crate::Broker).
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
	cache: StageCounters,
	silent: StageCounters,
	refresh: StageCounters,
	discovery: StageCounters,
	interactive: StageCounters,
	sign_out: StageCounters,
	persist: StageCounters,
}
impl AcquisitionMetrics {
	/// Counters for `stage`.
	pub fn stage(&self, stage: Stage) -> &StageCounters {
		match stage {
			Stage::Cache => &self.cache,
			Stage::Silent => &self.silent,
			Stage::Refresh => &self.refresh,
			Stage::Discovery => &self.discovery,
			Stage::Interactive => &self.interactive,
			Stage::SignOut => &self.sign_out,
			Stage::Persist => &self.persist,
		}
	}

	/// Total provider round-trips (silent, refresh, discovery, interactive).
	pub fn provider_calls(&self) -> u64 {
		[Stage::Silent, Stage::Refresh, Stage::Discovery, Stage::Interactive]
			.into_iter()
			.map(|stage| self.stage(stage).attempts())
			.sum()
	}

	pub(crate) fn record(&self, stage: Stage, outcome: StageOutcome) {
		self.stage(stage).record(outcome);

		obs::record_stage(stage, outcome);
	}
}
