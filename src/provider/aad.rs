//! Azure AD (v1 endpoint) implementation of [`IdentityProvider`].
//!
//! - Discovery probes `{resource}/_api/` without credentials and reads the tenant from the
//!   `realm` of the `WWW-Authenticate: Bearer` challenge.
//! - Silent acquisition serves tokens from an in-process [`ProviderCache`] keyed by tenant
//!   authority.
//! - Refresh and interactive acquisition go through the `oauth2` token endpoint facade, passing
//!   the resource as a form parameter.
//! - The signed-in principal and tenant come from the returned `id_token`.

pub mod cache;
pub mod prompt;

mod claims;

pub use cache::ProviderCache;
pub use prompt::*;

// crates.io
use oauth2::{
	AsyncHttpClient,
	http::{
		Method, Request,
		header::{AUTHORIZATION, WWW_AUTHENTICATE},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{Authority, ResourceId, TokenSecret, UserId},
	clock::{Clock, SystemClock},
	config::DEFAULT_INSTANCE,
	http::{ProviderHttpClient, ResponseMetadataSlot},
	oauth::{AadFacade, TokenExchange, TransportErrorMapper},
	provider::{
		IdentityProvider, ProviderFailure, ProviderFuture, ResourceDiscovery, TokenGrant,
		TokenRequest,
	},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};
use claims::IdTokenClaims;

/// Azure AD identity provider.
pub struct AadIdentityProvider<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	prompt: Arc<dyn InteractivePrompt>,
	instance: Option<Url>,
	clock: Arc<dyn Clock>,
	silent_margin: Duration,
	cache: ProviderCache,
}
#[cfg(feature = "reqwest")]
impl AadIdentityProvider<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a provider backed by a default reqwest client.
	pub fn new(prompt: Arc<dyn InteractivePrompt>) -> Self {
		Self::with_http_client(prompt, ReqwestHttpClient::default(), ReqwestTransportErrorMapper)
	}
}
impl<C, M> AadIdentityProvider<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Margin applied by silent acquisition before a cached token is considered expired.
	pub const DEFAULT_SILENT_MARGIN: Duration = Duration::minutes(5);

	/// Creates a provider with a caller-supplied transport and error mapper.
	pub fn with_http_client(
		prompt: Arc<dyn InteractivePrompt>,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
			prompt,
			instance: None,
			clock: Arc::new(SystemClock),
			silent_margin: Self::DEFAULT_SILENT_MARGIN,
			cache: ProviderCache::default(),
		}
	}

	/// Overrides the instance used to build authorities from discovered tenants.
	pub fn with_instance(mut self, instance: Url) -> Self {
		self.instance = Some(instance);

		self
	}

	/// Overrides the time source used for cache expiry and token lifetimes.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the margin silent acquisition keeps before expiry.
	pub fn with_silent_margin(mut self, margin: Duration) -> Self {
		self.silent_margin = margin;

		self
	}

	/// Provider-side token cache.
	pub fn cache(&self) -> &ProviderCache {
		&self.cache
	}

	fn facade(&self, request: TokenRequest<'_>) -> Result<AadFacade<C, M>, ProviderFailure> {
		AadFacade::new(
			request.authority,
			request.client_id,
			self.http_client.clone(),
			self.error_mapper.clone(),
		)
	}

	fn instance(&self) -> Result<Url, ProviderFailure> {
		match &self.instance {
			Some(instance) => Ok(instance.clone()),
			None => Url::parse(DEFAULT_INSTANCE).map_err(|err| {
				ProviderFailure::rejected("invalid_instance", Some(err.to_string()))
			}),
		}
	}

	/// Converts a token endpoint answer into a grant and caches it.
	fn complete(
		&self,
		request: TokenRequest<'_>,
		exchange: TokenExchange,
	) -> Result<TokenGrant, ProviderFailure> {
		let claims = exchange
			.id_token
			.as_deref()
			.map(IdTokenClaims::decode)
			.transpose()?
			.unwrap_or_default();
		let user_id = claims.user_id().or_else(|| request.user_hint.cloned()).ok_or_else(|| {
			ProviderFailure::rejected(
				"missing_user",
				Some("Token response did not identify the signed-in user".into()),
			)
		})?;
		let tenant_authority = match claims.tid.as_deref().filter(|tid| !tid.is_empty()) {
			Some(tid) => request.authority.with_tenant(tid).map_err(|err| {
				ProviderFailure::rejected("invalid_tenant", Some(err.to_string()))
			})?,
			None => request.authority.clone(),
		};
		let expires_at = self.clock.now().checked_add(exchange.expires_in).ok_or_else(|| {
			ProviderFailure::rejected(
				"invalid_token_response",
				Some("Token response expires_in is out of range".into()),
			)
		})?;
		let grant = TokenGrant {
			access_token: exchange.access_token,
			refresh_token: exchange.refresh_token,
			expires_at,
			user_id,
			tenant_authority,
		};

		self.cache.insert(request.resource, request.client_id, grant.clone());

		Ok(grant)
	}
}
impl<C, M> IdentityProvider for AadIdentityProvider<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn discover_resource_authority<'a>(
		&'a self,
		resource: &'a ResourceId,
	) -> ProviderFuture<'a, ResourceDiscovery> {
		Box::pin(async move {
			let meta = ResponseMetadataSlot::default();
			let handle = self.http_client.with_metadata(meta.clone());
			let probe = Request::builder()
				.method(Method::GET)
				.uri(resource.api_endpoint().as_str())
				.header(AUTHORIZATION, "Bearer")
				.body(Vec::new())
				.map_err(|err| {
					ProviderFailure::rejected("invalid_resource", Some(err.to_string()))
				})?;
			let response = handle.call(probe).await.map_err(|err| {
				self.error_mapper.map_transport_error("discovery", meta.take().as_ref(), err)
			})?;
			let realm = response
				.headers()
				.get_all(WWW_AUTHENTICATE)
				.iter()
				.filter_map(|value| value.to_str().ok())
				.find_map(bearer_realm);
			let Some(realm) = realm else {
				let status = response.status().as_u16();

				return Err(match status {
					429 | 500.. => ProviderFailure::classify(None, None, Some(status)),
					_ => ProviderFailure::rejected(
						"discovery_failed",
						Some(format!(
							"Resource did not advertise a bearer realm (HTTP {status})"
						)),
					),
				});
			};
			let authority = Authority::for_tenant(&self.instance()?, &realm)
				.map_err(|err| ProviderFailure::rejected("invalid_realm", Some(err.to_string())))?;

			Ok(ResourceDiscovery { authority, user_id: None })
		})
	}

	fn acquire_token_silent<'a>(
		&'a self,
		request: TokenRequest<'a>,
	) -> ProviderFuture<'a, TokenGrant> {
		Box::pin(async move {
			if request.authority.is_common() {
				return Err(ProviderFailure::NoCachedCredential);
			}

			let grant = self
				.cache
				.lookup(request.authority, request.resource, request.client_id, request.user_hint)
				.ok_or(ProviderFailure::NoCachedCredential)?;

			if self.clock.now() < grant.expires_at - self.silent_margin {
				Ok(grant)
			} else {
				Err(ProviderFailure::CredentialExpired)
			}
		})
	}

	fn acquire_token_by_refresh<'a>(
		&'a self,
		request: TokenRequest<'a>,
		refresh_token: &'a TokenSecret,
	) -> ProviderFuture<'a, TokenGrant> {
		Box::pin(async move {
			let facade = self.facade(request)?;
			let exchange = facade.refresh(refresh_token, request.resource).await?;

			self.complete(request, exchange)
		})
	}

	fn acquire_token_interactive<'a>(
		&'a self,
		request: TokenRequest<'a>,
		return_uri: &'a Url,
	) -> ProviderFuture<'a, TokenGrant> {
		Box::pin(async move {
			let authorize = AuthorizeRequest::new(request, return_uri);
			let code = match self.prompt.authorize(&authorize).await {
				PromptOutcome::Redirected(callback) => authorize.authorization_code(&callback)?,
				PromptOutcome::Cancelled => return Err(ProviderFailure::Cancelled),
				PromptOutcome::Failed { message } =>
					return Err(ProviderFailure::unavailable(message)),
			};
			let facade = self.facade(request)?;
			let exchange = facade
				.exchange_code(&code, authorize.pkce_verifier(), return_uri, request.resource)
				.await?;

			self.complete(request, exchange)
		})
	}

	fn logout<'a>(&'a self, user: &'a UserId) -> ProviderFuture<'a, ()> {
		Box::pin(async move {
			self.cache.evict_user(user);

			Ok(())
		})
	}
}
impl<C, M> Debug for AadIdentityProvider<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AadIdentityProvider")
			.field("instance", &self.instance)
			.field("silent_margin", &self.silent_margin)
			.field("cache", &self.cache)
			.finish()
	}
}

/// Extracts the `realm` parameter of a `Bearer` challenge.
fn bearer_realm(challenge: &str) -> Option<String> {
	let (scheme, params) = challenge.trim().split_once(char::is_whitespace)?;

	if !scheme.eq_ignore_ascii_case("bearer") {
		return None;
	}

	params
		.split(',')
		.filter_map(|param| param.split_once('='))
		.find(|(name, _)| name.trim().eq_ignore_ascii_case("realm"))
		.map(|(_, value)| value.trim().trim_matches('"').to_owned())
		.filter(|realm| !realm.is_empty())
}
