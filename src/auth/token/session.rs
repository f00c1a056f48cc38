//! Issued session tokens and their builder.

// self
use crate::{
	_prelude::*,
	auth::{UserId, token::secret::TokenSecret},
};

/// Errors produced by [`SessionTokensBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionBuildError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when the access token value was empty.
	#[error("Access token cannot be empty.")]
	EmptyAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Access token, optional refresh token, expiry, and principal issued together.
///
/// Keeping these in one value means a record either carries a complete authenticated session
/// or none at all.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute UTC expiry of the access token.
	pub expires_at: OffsetDateTime,
	/// Principal the tokens were issued to.
	pub user_id: UserId,
}
impl SessionTokens {
	/// Returns a builder for the provided principal.
	pub fn builder(user_id: UserId) -> SessionTokensBuilder {
		SessionTokensBuilder::new(user_id)
	}

	/// Returns `true` when `now < expires_at - skew`.
	pub fn is_fresh_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		now < self.expires_at - skew
	}

	/// Remaining lifetime at `now` (negative once expired).
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		self.expires_at - now
	}
}
impl Debug for SessionTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTokens")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("user_id", &self.user_id)
			.finish()
	}
}

/// Builder for [`SessionTokens`].
#[derive(Clone, Debug)]
pub struct SessionTokensBuilder {
	user_id: UserId,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl SessionTokensBuilder {
	fn new(user_id: UserId) -> Self {
		Self {
			user_id,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the instant `expires_in` is measured from (defaults to the current clock).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides an optional refresh token secret.
	pub fn maybe_refresh_token(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Consumes the builder and produces [`SessionTokens`].
	pub fn build(self) -> Result<SessionTokens, SessionBuildError> {
		let access_token = self.access_token.ok_or(SessionBuildError::MissingAccessToken)?;

		if access_token.is_empty() {
			return Err(SessionBuildError::EmptyAccessToken);
		}

		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => self.issued_at.unwrap_or_else(OffsetDateTime::now_utc) + delta,
			(None, None) => return Err(SessionBuildError::MissingExpiry),
		};

		Ok(SessionTokens {
			access_token,
			refresh_token: self.refresh_token.filter(|secret| !secret.is_empty()),
			expires_at,
			user_id: self.user_id,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn user() -> UserId {
		UserId::new("alice@contoso.example").expect("User fixture should be valid.")
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let session = SessionTokens::builder(user())
			.access_token("T1")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(60))
			.build()
			.expect("Session builder should support relative expiry.");

		assert_eq!(session.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert!(session.refresh_token.is_none());
	}

	#[test]
	fn builder_rejects_incomplete_sessions() {
		assert_eq!(
			SessionTokens::builder(user()).expires_in(Duration::hours(1)).build(),
			Err(SessionBuildError::MissingAccessToken)
		);
		assert_eq!(
			SessionTokens::builder(user()).access_token("T1").build(),
			Err(SessionBuildError::MissingExpiry)
		);
		assert_eq!(
			SessionTokens::builder(user()).access_token("").expires_in(Duration::hours(1)).build(),
			Err(SessionBuildError::EmptyAccessToken)
		);
	}

	#[test]
	fn freshness_applies_skew() {
		let expires = macros::datetime!(2025-01-01 01:00 UTC);
		let session = SessionTokens::builder(user())
			.access_token("T1")
			.refresh_token("R1")
			.expires_at(expires)
			.build()
			.expect("Session fixture should build.");
		let skew = Duration::seconds(10);

		assert!(session.is_fresh_at(expires - Duration::seconds(11), skew));
		assert!(!session.is_fresh_at(expires - Duration::seconds(10), skew));
		assert!(!session.is_fresh_at(expires - Duration::seconds(5), skew));
		assert_eq!(session.remaining_at(expires - Duration::minutes(1)), Duration::minutes(1));
	}

	#[test]
	fn debug_redacts_secrets() {
		let session = SessionTokens::builder(user())
			.access_token("very-secret")
			.refresh_token("also-secret")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Session fixture should build.");
		let rendered = format!("{session:?}");

		assert!(!rendered.contains("very-secret"));
		assert!(!rendered.contains("also-secret"));
	}
}
