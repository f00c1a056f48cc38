//! The single credential record owned by the broker, its lifecycle status, and a redacted view.

// self
use crate::{
	_prelude::*,
	auth::{Authority, ResourceId, SessionTokens, TokenSecret, UserId},
};

/// Lifecycle status of a [`CredentialRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// No resource has been configured.
	Unconfigured,
	/// A resource is configured but no token has been issued (or it was discarded).
	Configured,
	/// A token is present and fresh once the skew margin is applied.
	Authenticated,
	/// A token is present but expired or inside the skew margin.
	Expired,
}

/// Authenticated-session state for one process or logical user.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Resource the session is scoped to; may be set before any token exists.
	pub resource: Option<ResourceId>,
	/// Tenant authority that last issued a token successfully.
	pub authority: Option<Authority>,
	/// Issued tokens, all present or all absent.
	pub session: Option<SessionTokens>,
}
impl CredentialRecord {
	/// Creates a record that only carries a configured resource.
	pub fn configured(resource: ResourceId) -> Self {
		Self { resource: Some(resource), ..Default::default() }
	}

	/// Attaches an issued session and the authority that produced it.
	pub fn with_session(mut self, authority: Authority, session: SessionTokens) -> Self {
		self.authority = Some(authority);
		self.session = Some(session);

		self
	}

	/// Computes the lifecycle status at `now` with the given skew margin.
	pub fn status_at(&self, now: OffsetDateTime, skew: Duration) -> CredentialStatus {
		match (&self.resource, &self.session) {
			(None, _) => CredentialStatus::Unconfigured,
			(Some(_), None) => CredentialStatus::Configured,
			(Some(_), Some(session)) if session.is_fresh_at(now, skew) =>
				CredentialStatus::Authenticated,
			(Some(_), Some(_)) => CredentialStatus::Expired,
		}
	}

	/// Returns the session when it is scoped to `resource` and still fresh.
	pub fn fresh_session(
		&self,
		resource: &ResourceId,
		now: OffsetDateTime,
		skew: Duration,
	) -> Option<&SessionTokens> {
		self.session_for(resource).filter(|session| session.is_fresh_at(now, skew))
	}

	/// Returns the stored refresh token when it belongs to `resource`.
	pub fn refresh_token_for(&self, resource: &ResourceId) -> Option<&TokenSecret> {
		self.session_for(resource).and_then(|session| session.refresh_token.as_ref())
	}

	/// Principal of the current session.
	pub fn user_id(&self) -> Option<&UserId> {
		self.session.as_ref().map(|session| &session.user_id)
	}

	/// Current access token, if any.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.session.as_ref().map(|session| &session.access_token)
	}

	/// Replaces the session, authority, and resource after a successful acquisition.
	///
	/// Returns `true` when the access token differs from the one it replaces.
	pub fn commit(
		&mut self,
		resource: ResourceId,
		authority: Authority,
		session: SessionTokens,
	) -> bool {
		let changed = self.access_token() != Some(&session.access_token);

		self.resource = Some(resource);
		self.authority = Some(authority);
		self.session = Some(session);

		changed
	}

	/// Drops every token-bearing field while keeping the configured resource.
	pub fn clear_tokens(&mut self) {
		self.session = None;
		self.authority = None;
	}

	/// Resets the record to the empty, unconfigured state.
	pub fn clear(&mut self) {
		*self = Self::default();
	}

	/// Redacted view suitable for display.
	pub fn summary(&self) -> AccountSummary {
		AccountSummary {
			resource: self.resource.clone(),
			user_id: self.user_id().cloned(),
			authority: self.authority.clone(),
			expires_at: self.session.as_ref().map(|session| session.expires_at),
		}
	}

	fn session_for(&self, resource: &ResourceId) -> Option<&SessionTokens> {
		match (&self.resource, &self.session) {
			(Some(stored), Some(session)) if stored == resource => Some(session),
			_ => None,
		}
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialRecord")
			.field("resource", &self.resource)
			.field("authority", &self.authority)
			.field("session", &self.session)
			.finish()
	}
}

/// Secret-free snapshot of the record for account displays.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
	/// Configured resource.
	pub resource: Option<ResourceId>,
	/// Signed-in principal.
	pub user_id: Option<UserId>,
	/// Tenant authority bound to the session.
	pub authority: Option<Authority>,
	/// Access token expiry.
	pub expires_at: Option<OffsetDateTime>,
}
impl AccountSummary {
	/// Returns `true` when a principal is signed in.
	pub fn is_signed_in(&self) -> bool {
		self.user_id.is_some()
	}
}
