//! The acquisition chain: cache, silent, refresh, then discovery plus interactive sign-in.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::{Authority, ResourceId, SessionTokens, TokenSecret},
	broker::{AccessToken, Broker},
	notify::TokenChange,
	obs::{self, OperationSpan, Stage, StageOutcome},
	provider::{ProviderFailure, ProviderFuture, TokenGrant, TokenRequest},
};

/// Successful chain result before it is committed.
struct Acquired {
	stage: Stage,
	authority: Authority,
	session: SessionTokens,
}

impl Broker {
	/// Returns a fresh access token for the configured resource.
	///
	/// Fails with [`Error::ConfigurationMissing`] when no resource has been configured.
	pub async fn ensure_access_token(&self) -> Result<AccessToken> {
		self.acquire("ensure_access_token", None).await
	}

	/// Returns a fresh access token for `resource`, acquiring one when needed.
	///
	/// The resource is validated before any provider interaction; a malformed one discards the
	/// current tokens. Otherwise it becomes the record's resource, even when acquisition fails.
	pub async fn ensure_access_token_for(&self, resource: impl AsRef<str>) -> Result<AccessToken> {
		let resource = match ResourceId::parse(resource) {
			Ok(resource) => resource,
			Err(err) => {
				let _singleflight = self.singleflight.lock().await;

				self.discard_tokens(None).await;

				return Err(err);
			},
		};

		self.acquire("ensure_access_token_for", Some(resource)).await
	}

	async fn acquire(
		&self,
		operation: &'static str,
		requested: Option<ResourceId>,
	) -> Result<AccessToken> {
		let span = OperationSpan::new(operation);

		span.instrument(async {
			let _singleflight = self.singleflight.lock().await;
			let resource = match requested {
				Some(resource) => resource,
				None => self.record.read().resource.clone().ok_or(Error::ConfigurationMissing)?,
			};

			self.acquire_locked(resource, &span).await
		})
		.await
	}

	async fn acquire_locked(
		&self,
		resource: ResourceId,
		span: &OperationSpan,
	) -> Result<AccessToken> {
		let now = self.clock.now();

		self.metrics.record(Stage::Cache, StageOutcome::Attempt);

		let (authority, user_hint, refresh_token) = {
			let record = self.record.read();

			if let Some(session) = record.fresh_session(&resource, now, self.config.skew) {
				self.metrics.record(Stage::Cache, StageOutcome::Success);
				span.record_stage(Stage::Cache);

				return Ok(AccessToken::from_session(&resource, session));
			}

			(
				record.authority.clone().unwrap_or_else(|| self.config.common_authority.clone()),
				record.user_id().cloned(),
				record.refresh_token_for(&resource).cloned(),
			)
		};

		self.metrics.record(Stage::Cache, StageOutcome::Failure);

		let request = TokenRequest {
			authority: &authority,
			resource: &resource,
			client_id: &self.config.client_id,
			user_hint: user_hint.as_ref(),
		};

		match self.run_chain(request, refresh_token).await {
			Ok(acquired) => {
				span.record_stage(acquired.stage);

				Ok(self.commit(resource, acquired).await)
			},
			Err(err) => {
				if !matches!(err, Error::ProviderUnavailable { timed_out: true, .. }) {
					self.discard_tokens(Some(resource)).await;
				}

				Err(err)
			},
		}
	}

	/// Steps 3 to 5; every provider call is bounded by the configured timeout.
	async fn run_chain(
		&self,
		request: TokenRequest<'_>,
		refresh_token: Option<TokenSecret>,
	) -> Result<Acquired> {
		let silent = self.call(Stage::Silent, self.provider.acquire_token_silent(request)).await?;
		let try_refresh = match silent {
			Ok(grant) => return into_acquired(Stage::Silent, grant, None),
			Err(failure) if failure.is_terminal() => return Err(failure.into()),
			// The record's own refresh token is a cached credential the provider may not know.
			Err(
				failure @ (ProviderFailure::CredentialExpired | ProviderFailure::NoCachedCredential),
			) => {
				obs::record_transition(Stage::Silent, Stage::Refresh, &failure);

				refresh_token.is_some()
			},
			Err(failure) => {
				obs::record_transition(Stage::Silent, Stage::Interactive, &failure);

				false
			},
		};

		if let Some(refresh) = refresh_token.filter(|_| try_refresh) {
			let refreshed = self
				.call(Stage::Refresh, self.provider.acquire_token_by_refresh(request, &refresh))
				.await?;

			match refreshed {
				Ok(grant) => return into_acquired(Stage::Refresh, grant, Some(refresh)),
				Err(failure) if failure.is_terminal() => return Err(failure.into()),
				Err(failure) =>
					obs::record_transition(Stage::Refresh, Stage::Interactive, &failure),
			}
		}

		let discovery = self
			.call(Stage::Discovery, self.provider.discover_resource_authority(request.resource))
			.await??;
		let interactive = TokenRequest {
			authority: &discovery.authority,
			user_hint: discovery.user_id.as_ref().or(request.user_hint),
			..request
		};
		let grant = self
			.call(
				Stage::Interactive,
				self.provider.acquire_token_interactive(interactive, &self.config.return_uri),
			)
			.await??;

		into_acquired(Stage::Interactive, grant, None)
	}

	/// Runs one provider call under the timeout; the outer error is the timeout itself.
	async fn call<T>(
		&self,
		stage: Stage,
		fut: ProviderFuture<'_, T>,
	) -> Result<Result<T, ProviderFailure>> {
		self.metrics.record(stage, StageOutcome::Attempt);

		let Some(result) = bounded(self.config.provider_timeout, fut).await else {
			self.metrics.record(stage, StageOutcome::Failure);

			return Err(Error::timed_out(stage.as_str()));
		};

		self.metrics.record(
			stage,
			if result.is_ok() { StageOutcome::Success } else { StageOutcome::Failure },
		);

		Ok(result)
	}

	async fn commit(&self, resource: ResourceId, acquired: Acquired) -> AccessToken {
		let token = AccessToken::from_session(&resource, &acquired.session);
		let (changed, snapshot) = {
			let mut record = self.record.write();
			let changed = record.commit(resource, acquired.authority, acquired.session);

			(changed, record.clone())
		};

		self.persist(snapshot).await;

		if changed {
			self.listeners.publish(TokenChange::Issued);
		}

		token
	}

	/// Clears token-bearing fields after a terminal failure.
	///
	/// The failed call's resource, when known, replaces the configured one so later calls stay
	/// scoped to it.
	async fn discard_tokens(&self, resource: Option<ResourceId>) {
		let snapshot = {
			let mut record = self.record.write();
			let rescoped = resource.filter(|resource| record.resource.as_ref() != Some(resource));

			if record.session.is_none() && record.authority.is_none() && rescoped.is_none() {
				return;
			}

			if let Some(resource) = rescoped {
				record.resource = Some(resource);
			}

			record.clear_tokens();
			record.clone()
		};

		self.persist(snapshot).await;
	}
}

fn into_acquired(
	stage: Stage,
	grant: TokenGrant,
	previous_refresh: Option<TokenSecret>,
) -> Result<Acquired> {
	let (authority, session) =
		grant.into_session(previous_refresh).map_err(|err| Error::AuthenticationFailed {
			code: "invalid_token_response".into(),
			description: err.to_string(),
		})?;

	Ok(Acquired { stage, authority, session })
}

/// Awaits `fut` for at most `limit`; `None` means the limit elapsed.
#[cfg(feature = "tokio")]
pub(super) async fn bounded<F>(limit: StdDuration, fut: F) -> Option<F::Output>
where
	F: Future,
{
	tokio::time::timeout(limit, fut).await.ok()
}
/// Awaits `fut` without a bound; enable the `tokio` feature to enforce provider timeouts.
#[cfg(not(feature = "tokio"))]
pub(super) async fn bounded<F>(limit: StdDuration, fut: F) -> Option<F::Output>
where
	F: Future,
{
	let _ = limit;

	Some(fut.await)
}
