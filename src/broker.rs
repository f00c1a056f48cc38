//! The credential broker: one resource-scoped session kept fresh for many dependents.
//!
//! [`Broker`] owns a single [`CredentialRecord`] and is the only writer to it. Every token
//! acquisition and sign-out runs inside one async critical section, so concurrent callers never
//! trigger more than one provider round-trip at a time. The record itself sits behind a short
//! synchronous lock that is only write-locked for the instant of a commit, which lets
//! [`Broker::status`], [`Broker::account`], and token listeners observe fully committed state.

mod acquire;
mod metrics;

pub use metrics::{AcquisitionMetrics, StageCounters};

// self
use crate::{
	_prelude::*,
	auth::{
		AccountSummary, CredentialRecord, CredentialStatus, ResourceId, SessionTokens, TokenSecret,
		UserId,
	},
	clock::{Clock, SystemClock},
	config::BrokerConfig,
	notify::{ListenerRegistry, Subscription, TokenChange, TokenListener},
	obs::{self, OperationSpan, Stage, StageOutcome},
	provider::IdentityProvider,
	store::CredentialStore,
};

/// Access token handed to dependents, scoped to one resource.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
	/// Token secret; avoid logging it.
	pub secret: TokenSecret,
	/// Absolute UTC expiry.
	pub expires_at: OffsetDateTime,
	/// Principal the token was issued to.
	pub user_id: UserId,
	/// Resource the token is scoped to.
	pub resource: ResourceId,
}
impl AccessToken {
	fn from_session(resource: &ResourceId, session: &SessionTokens) -> Self {
		Self {
			secret: session.access_token.clone(),
			expires_at: session.expires_at,
			user_id: session.user_id.clone(),
			resource: resource.clone(),
		}
	}

	/// Raw token value.
	pub fn expose(&self) -> &str {
		self.secret.expose()
	}

	/// `Authorization` header value (`Bearer <token>`).
	pub fn bearer(&self) -> String {
		self.secret.bearer()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("secret", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("user_id", &self.user_id)
			.field("resource", &self.resource)
			.finish()
	}
}

/// Credential broker bound to one identity provider and one credential record.
///
/// Construct it explicitly and share it (typically behind an `Arc`) with every component that
/// needs a token; there is no process-wide instance.
pub struct Broker {
	provider: Arc<dyn IdentityProvider>,
	config: BrokerConfig,
	clock: Arc<dyn Clock>,
	store: Option<Arc<dyn CredentialStore>>,
	record: RwLock<CredentialRecord>,
	singleflight: AsyncMutex<()>,
	listeners: ListenerRegistry,
	metrics: AcquisitionMetrics,
}
impl Broker {
	/// Creates a broker with an empty record and the system clock.
	pub fn new(config: BrokerConfig, provider: Arc<dyn IdentityProvider>) -> Self {
		Self {
			provider,
			config,
			clock: Arc::new(SystemClock),
			store: None,
			record: RwLock::new(CredentialRecord::default()),
			singleflight: AsyncMutex::new(()),
			listeners: ListenerRegistry::default(),
			metrics: AcquisitionMetrics::default(),
		}
	}

	/// Overrides the time source used for freshness checks.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Persists the record through `store` after every committed change.
	pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Pre-seeds the record with a resource.
	pub fn with_resource(self, resource: impl AsRef<str>) -> Result<Self> {
		let resource = ResourceId::parse(resource)?;

		self.record.write().resource = Some(resource);

		Ok(self)
	}

	/// Broker configuration.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// Lifecycle status by the broker clock and skew.
	pub fn status(&self) -> CredentialStatus {
		self.record.read().status_at(self.clock.now(), self.config.skew)
	}

	/// Secret-free view of the current session.
	pub fn account(&self) -> AccountSummary {
		self.record.read().summary()
	}

	/// Registers a listener notified whenever the access token changes.
	pub fn subscribe(&self, listener: Arc<dyn TokenListener>) -> Subscription {
		self.listeners.subscribe(listener)
	}

	/// Per-stage acquisition counters.
	pub fn metrics(&self) -> &AcquisitionMetrics {
		&self.metrics
	}

	/// Replaces the in-memory record with the persisted one, if any, and returns the new status.
	///
	/// Without a configured store this only reports the current status.
	pub async fn restore(&self) -> Result<CredentialStatus> {
		let span = OperationSpan::new("restore");

		span.instrument(async {
			let _singleflight = self.singleflight.lock().await;

			let Some(store) = &self.store else {
				return Ok(self.status());
			};

			if let Some(record) = store.load().await? {
				*self.record.write() = record;
			}

			Ok(self.status())
		})
		.await
	}

	/// Sets the resource without acquiring a token.
	///
	/// Switching to a different resource drops the current session (the authority is kept, since
	/// it identifies the tenant rather than the resource) and publishes [`TokenChange::Cleared`]
	/// when a token was discarded.
	pub async fn configure_resource(&self, resource: impl AsRef<str>) -> Result<()> {
		let resource = ResourceId::parse(resource)?;
		let _singleflight = self.singleflight.lock().await;
		let (snapshot, dropped) = {
			let mut record = self.record.write();

			if record.resource.as_ref() == Some(&resource) {
				return Ok(());
			}

			let dropped = record.session.take().is_some();

			record.resource = Some(resource);

			(record.clone(), dropped)
		};

		self.persist(snapshot).await;

		if dropped {
			self.listeners.publish(TokenChange::Cleared);
		}

		Ok(())
	}

	/// Signs the current user out.
	///
	/// Without a signed-in user this is a no-op. Otherwise the provider's logout is attempted
	/// (failures are only logged), the whole record is cleared (resource included), persistence
	/// is cleared, and [`TokenChange::Cleared`] is published.
	pub async fn sign_out(&self) {
		let span = OperationSpan::new("sign_out");

		span.instrument(async {
			let _singleflight = self.singleflight.lock().await;
			let Some(user) = self.record.read().user_id().cloned() else {
				return;
			};

			self.metrics.record(Stage::SignOut, StageOutcome::Attempt);

			let logout =
				acquire::bounded(self.config.provider_timeout, self.provider.logout(&user)).await;

			match logout {
				Some(Ok(())) => {},
				Some(Err(failure)) => obs::record_warning(Stage::SignOut, &failure),
				None => obs::record_warning(Stage::SignOut, &"provider logout timed out"),
			}

			self.record.write().clear();

			if let Some(store) = &self.store {
				self.metrics.record(Stage::Persist, StageOutcome::Attempt);

				match store.clear().await {
					Ok(()) => self.metrics.record(Stage::Persist, StageOutcome::Success),
					Err(err) => {
						self.metrics.record(Stage::Persist, StageOutcome::Failure);
						obs::record_warning(Stage::Persist, &err);
					},
				}
			}

			self.metrics.record(Stage::SignOut, StageOutcome::Success);
			span.record_stage(Stage::SignOut);
			self.listeners.publish(TokenChange::Cleared);
		})
		.await
	}

	/// Best-effort save; failures are logged and counted, never surfaced.
	async fn persist(&self, record: CredentialRecord) {
		let Some(store) = &self.store else {
			return;
		};

		self.metrics.record(Stage::Persist, StageOutcome::Attempt);

		match store.save(record).await {
			Ok(()) => self.metrics.record(Stage::Persist, StageOutcome::Success),
			Err(err) => {
				self.metrics.record(Stage::Persist, StageOutcome::Failure);
				obs::record_warning(Stage::Persist, &err);
			},
		}
	}
}
impl Debug for Broker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("config", &self.config)
			.field("record", &*self.record.read())
			.field("listeners", &self.listeners)
			.field("persistent", &self.store.is_some())
			.finish()
	}
}
