#![allow(dead_code)]

// std
use std::{collections::VecDeque, sync::Arc, time::Duration as StdDuration};
// crates.io
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime, macros};
use url::Url;
// self
use credential_broker::{
	Broker,
	auth::{Authority, CredentialRecord, ResourceId, SessionTokens, TokenSecret, UserId},
	clock::{Clock, ManualClock},
	config::BrokerConfig,
	notify::{TokenChange, TokenListener},
	provider::{
		IdentityProvider, ProviderFailure, ProviderFuture, ResourceDiscovery, TokenGrant,
		TokenRequest, TokenResult,
	},
	store::MemoryStore,
};

pub const CLIENT_ID: &str = "client-1";
pub const RETURN_URI: &str = "https://localhost/callback";
pub const RESOURCE: &str = "https://contoso.example/site";
pub const OTHER_RESOURCE: &str = "https://fabrikam.example/site";
pub const TENANT_AUTHORITY: &str = "https://login.microsoftonline.com/contoso-tenant";
pub const USER: &str = "alice@contoso.example";

/// Provider call as observed by [`ScriptedProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
	Discovery { resource: String },
	Silent { authority: String, user_hint: Option<String> },
	Refresh { authority: String, refresh_token: String },
	Interactive { authority: String, user_hint: Option<String> },
	Logout { user: String },
}
impl Call {
	pub fn name(&self) -> &'static str {
		match self {
			Call::Discovery { .. } => "discovery",
			Call::Silent { .. } => "silent",
			Call::Refresh { .. } => "refresh",
			Call::Interactive { .. } => "interactive",
			Call::Logout { .. } => "logout",
		}
	}
}

/// Identity provider answering from per-operation queues.
///
/// Empty queues fall back to: silent → no cached credential, refresh → `invalid_grant`,
/// discovery → the tenant authority, interactive → `interaction_required`, logout → success.
#[derive(Default)]
pub struct ScriptedProvider {
	discovery: Mutex<VecDeque<Result<ResourceDiscovery, ProviderFailure>>>,
	silent: Mutex<VecDeque<TokenResult>>,
	refresh: Mutex<VecDeque<TokenResult>>,
	interactive: Mutex<VecDeque<TokenResult>>,
	logout: Mutex<VecDeque<Result<(), ProviderFailure>>>,
	calls: Mutex<Vec<Call>>,
	delay: Option<StdDuration>,
}
impl ScriptedProvider {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Every call sleeps for `delay` before answering.
	pub fn delayed(delay: StdDuration) -> Arc<Self> {
		Arc::new(Self { delay: Some(delay), ..Default::default() })
	}

	pub fn script_discovery(&self, result: Result<ResourceDiscovery, ProviderFailure>) {
		self.discovery.lock().push_back(result);
	}

	pub fn script_silent(&self, result: TokenResult) {
		self.silent.lock().push_back(result);
	}

	pub fn script_refresh(&self, result: TokenResult) {
		self.refresh.lock().push_back(result);
	}

	pub fn script_interactive(&self, result: TokenResult) {
		self.interactive.lock().push_back(result);
	}

	pub fn script_logout(&self, result: Result<(), ProviderFailure>) {
		self.logout.lock().push_back(result);
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	pub fn call_names(&self) -> Vec<&'static str> {
		self.calls.lock().iter().map(Call::name).collect()
	}

	async fn pause(&self) {
		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}
	}
}
impl IdentityProvider for ScriptedProvider {
	fn discover_resource_authority<'a>(
		&'a self,
		resource: &'a ResourceId,
	) -> ProviderFuture<'a, ResourceDiscovery> {
		Box::pin(async move {
			self.calls.lock().push(Call::Discovery { resource: resource.to_string() });
			self.pause().await;

			self.discovery.lock().pop_front().unwrap_or_else(|| {
				Ok(ResourceDiscovery { authority: tenant_authority(), user_id: None })
			})
		})
	}

	fn acquire_token_silent<'a>(
		&'a self,
		request: TokenRequest<'a>,
	) -> ProviderFuture<'a, TokenGrant> {
		Box::pin(async move {
			self.calls.lock().push(Call::Silent {
				authority: request.authority.to_string(),
				user_hint: request.user_hint.map(ToString::to_string),
			});
			self.pause().await;

			self.silent.lock().pop_front().unwrap_or(Err(ProviderFailure::NoCachedCredential))
		})
	}

	fn acquire_token_by_refresh<'a>(
		&'a self,
		request: TokenRequest<'a>,
		refresh_token: &'a TokenSecret,
	) -> ProviderFuture<'a, TokenGrant> {
		Box::pin(async move {
			self.calls.lock().push(Call::Refresh {
				authority: request.authority.to_string(),
				refresh_token: refresh_token.expose().to_owned(),
			});
			self.pause().await;

			self.refresh
				.lock()
				.pop_front()
				.unwrap_or_else(|| Err(ProviderFailure::rejected("invalid_grant", None)))
		})
	}

	fn acquire_token_interactive<'a>(
		&'a self,
		request: TokenRequest<'a>,
		_return_uri: &'a Url,
	) -> ProviderFuture<'a, TokenGrant> {
		Box::pin(async move {
			self.calls.lock().push(Call::Interactive {
				authority: request.authority.to_string(),
				user_hint: request.user_hint.map(ToString::to_string),
			});
			self.pause().await;

			self.interactive
				.lock()
				.pop_front()
				.unwrap_or_else(|| Err(ProviderFailure::rejected("interaction_required", None)))
		})
	}

	fn logout<'a>(&'a self, user: &'a UserId) -> ProviderFuture<'a, ()> {
		Box::pin(async move {
			self.calls.lock().push(Call::Logout { user: user.to_string() });
			self.pause().await;

			self.logout.lock().pop_front().unwrap_or(Ok(()))
		})
	}
}

/// Listener that records every published change.
#[derive(Default)]
pub struct ChangeLog(Mutex<Vec<TokenChange>>);
impl ChangeLog {
	pub fn changes(&self) -> Vec<TokenChange> {
		self.0.lock().clone()
	}

	pub fn count(&self, change: TokenChange) -> usize {
		self.0.lock().iter().filter(|seen| **seen == change).count()
	}
}
impl TokenListener for ChangeLog {
	fn on_token_changed(&self, change: TokenChange) {
		self.0.lock().push(change);
	}
}

pub fn epoch() -> OffsetDateTime {
	macros::datetime!(2025-01-01 00:00 UTC)
}

pub fn clock() -> ManualClock {
	ManualClock::new(epoch())
}

pub fn config() -> BrokerConfig {
	BrokerConfig::new(CLIENT_ID, RETURN_URI).expect("Broker config fixture should build.")
}

pub fn resource() -> ResourceId {
	ResourceId::parse(RESOURCE).expect("Resource fixture should parse.")
}

pub fn user() -> UserId {
	UserId::new(USER).expect("User fixture should be valid.")
}

pub fn tenant_authority() -> Authority {
	Authority::parse(TENANT_AUTHORITY).expect("Tenant authority fixture should parse.")
}

pub fn grant(
	clock: &ManualClock,
	access_token: &str,
	refresh_token: Option<&str>,
	lifetime: Duration,
) -> TokenGrant {
	TokenGrant {
		access_token: TokenSecret::new(access_token),
		refresh_token: refresh_token.map(TokenSecret::new),
		expires_at: clock.now() + lifetime,
		user_id: user(),
		tenant_authority: tenant_authority(),
	}
}

/// Record holding a session for [`RESOURCE`] issued by the tenant authority.
pub fn signed_in_record(
	access_token: &str,
	refresh_token: &str,
	expires_at: OffsetDateTime,
) -> CredentialRecord {
	let session = SessionTokens::builder(user())
		.access_token(access_token)
		.refresh_token(refresh_token)
		.expires_at(expires_at)
		.build()
		.expect("Session fixture should build.");

	CredentialRecord::configured(resource()).with_session(tenant_authority(), session)
}

pub fn broker(provider: &Arc<ScriptedProvider>, clock: &ManualClock) -> Broker {
	Broker::new(config(), provider.clone()).with_clock(Arc::new(clock.clone()))
}

/// Broker whose record was restored from `record` through a [`MemoryStore`].
pub async fn restored_broker(
	provider: &Arc<ScriptedProvider>,
	clock: &ManualClock,
	record: CredentialRecord,
) -> (Broker, MemoryStore) {
	let store = MemoryStore::with_record(record);
	let broker = broker(provider, clock).with_store(Arc::new(store.clone()));

	broker.restore().await.expect("Restoring the seeded record should succeed.");

	(broker, store)
}
