//! Identity-provider contract consumed by the broker.
//!
//! The broker never talks HTTP itself. It drives an [`IdentityProvider`] through four
//! acquisition primitives (silent, refresh, discovery, interactive) plus a best-effort logout,
//! and interprets each outcome as a [`TokenGrant`] or a classified [`ProviderFailure`].

pub mod aad;
pub mod failure;

pub use aad::{AadIdentityProvider, AuthorizeRequest, InteractivePrompt, PromptOutcome};
pub use failure::*;

// self
use crate::{
	_prelude::*,
	auth::{Authority, ClientId, ResourceId, SessionBuildError, SessionTokens, TokenSecret, UserId},
};

/// Boxed future returned by provider operations.
pub type ProviderFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ProviderFailure>> + 'a + Send>>;

/// Outcome of a token acquisition primitive.
pub type TokenResult = Result<TokenGrant, ProviderFailure>;

/// Identity provider that can discover authorities and issue resource-scoped tokens.
///
/// Implementations must be `Send + Sync` so a single instance can back a broker shared across
/// tasks. Every method returns a boxed future so the trait stays object safe.
pub trait IdentityProvider
where
	Self: Send + Sync,
{
	/// Learns which tenant authority guards `resource`.
	fn discover_resource_authority<'a>(
		&'a self,
		resource: &'a ResourceId,
	) -> ProviderFuture<'a, ResourceDiscovery>;

	/// Returns a token from the provider's own cache without user interaction.
	fn acquire_token_silent<'a>(
		&'a self,
		request: TokenRequest<'a>,
	) -> ProviderFuture<'a, TokenGrant>;

	/// Exchanges a refresh token for a new access token scoped to the request's resource.
	fn acquire_token_by_refresh<'a>(
		&'a self,
		request: TokenRequest<'a>,
		refresh_token: &'a TokenSecret,
	) -> ProviderFuture<'a, TokenGrant>;

	/// Runs the interactive sign-in prompt and redeems its result.
	fn acquire_token_interactive<'a>(
		&'a self,
		request: TokenRequest<'a>,
		return_uri: &'a Url,
	) -> ProviderFuture<'a, TokenGrant>;

	/// Drops provider-side state for `user`. Failures are tolerated by callers.
	fn logout<'a>(&'a self, user: &'a UserId) -> ProviderFuture<'a, ()>;
}

/// Borrowed inputs shared by the acquisition primitives.
#[derive(Clone, Copy, Debug)]
pub struct TokenRequest<'a> {
	/// Authority the request is addressed to.
	pub authority: &'a Authority,
	/// Resource the token must be scoped to.
	pub resource: &'a ResourceId,
	/// Registered client identifier.
	pub client_id: &'a ClientId,
	/// Principal hint, when a previous session identified one.
	pub user_hint: Option<&'a UserId>,
}

/// Result of resource authority discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceDiscovery {
	/// Tenant authority that issues tokens for the resource.
	pub authority: Authority,
	/// Principal hint, when the discovery channel reveals one.
	pub user_id: Option<UserId>,
}

/// Tokens issued by a successful acquisition.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
	/// Access token secret.
	pub access_token: TokenSecret,
	/// Refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute UTC expiry of the access token.
	pub expires_at: OffsetDateTime,
	/// Principal the tokens were issued to.
	pub user_id: UserId,
	/// Tenant-specific authority that issued the tokens.
	pub tenant_authority: Authority,
}
impl TokenGrant {
	/// Splits the grant into its issuing authority and a session, keeping `previous_refresh` when
	/// the provider did not rotate the refresh token.
	pub fn into_session(
		self,
		previous_refresh: Option<TokenSecret>,
	) -> Result<(Authority, SessionTokens), SessionBuildError> {
		let session = SessionTokens::builder(self.user_id)
			.access_token(self.access_token.expose())
			.maybe_refresh_token(self.refresh_token.or(previous_refresh))
			.expires_at(self.expires_at)
			.build()?;

		Ok((self.tenant_authority, session))
	}
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("user_id", &self.user_id)
			.field("tenant_authority", &self.tenant_authority)
			.finish()
	}
}
