//! Classified provider failures and the heuristics that produce them from OAuth errors.

// self
use crate::{_prelude::*, error::AUTHENTICATION_CANCELED};

/// Failure reported by an [`IdentityProvider`](crate::provider::IdentityProvider) primitive.
///
/// The broker uses the variant to decide whether to fall back to the next acquisition step or to
/// stop: `NoCachedCredential`, `CredentialExpired`, and `Rejected` fall through, while
/// `Cancelled` and `Unavailable` end the chain.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ProviderFailure {
	/// The provider cache holds nothing usable for the request.
	#[error("No cached credential matches the request.")]
	NoCachedCredential,
	/// A cached credential exists but is expired.
	#[error("The cached credential has expired.")]
	CredentialExpired,
	/// The provider rejected the request (bad grant, consent missing, policy, ...).
	#[error("Provider rejected the request ({code}).")]
	Rejected {
		/// OAuth or provider-specific error code.
		code: String,
		/// Human-readable description, if one was returned.
		description: Option<String>,
	},
	/// The user dismissed the interactive prompt.
	#[error("The user canceled the sign-in prompt.")]
	Cancelled,
	/// The provider could not be reached or answered with a transient failure.
	#[error("Provider is unavailable: {message}.")]
	Unavailable {
		/// Summary of the transport failure.
		message: String,
	},
}
impl ProviderFailure {
	const DESCRIPTION_LIMIT: usize = 256;

	/// Builds a [`ProviderFailure::Rejected`] value.
	pub fn rejected(code: impl Into<String>, description: Option<String>) -> Self {
		Self::Rejected { code: code.into(), description: description.map(truncate_description) }
	}

	/// Builds a [`ProviderFailure::Unavailable`] value.
	pub fn unavailable(message: impl Into<String>) -> Self {
		Self::Unavailable { message: message.into() }
	}

	/// Classifies an OAuth error response.
	///
	/// Structured fields (`error`, then `error_description`) win over the HTTP status. Rate limits
	/// and 5xx answers are treated as an unavailable provider.
	pub fn classify(
		oauth_error: Option<&str>,
		error_description: Option<&str>,
		http_status: Option<u16>,
	) -> Self {
		if is_cancellation(oauth_error, error_description) {
			return Self::Cancelled;
		}
		if oauth_error.is_some_and(is_transient_code)
			|| error_description.is_some_and(mentions_transient)
		{
			return Self::unavailable(
				error_description.or(oauth_error).unwrap_or("temporarily unavailable"),
			);
		}
		if let Some(code) = oauth_error.filter(|code| !code.is_empty()) {
			return Self::rejected(code, error_description.map(ToOwned::to_owned));
		}

		classify_status(http_status, error_description)
	}

	/// Returns `true` when the broker must stop instead of trying the next acquisition step.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Cancelled | Self::Unavailable { .. })
	}
}

fn is_cancellation(oauth_error: Option<&str>, error_description: Option<&str>) -> bool {
	match oauth_error {
		Some(code) if code.eq_ignore_ascii_case(AUTHENTICATION_CANCELED) => true,
		Some(code) if code.eq_ignore_ascii_case("access_denied") => error_description
			.is_some_and(|description| description.to_ascii_lowercase().contains("cancel")),
		_ => false,
	}
}

fn is_transient_code(code: &str) -> bool {
	["temporarily_unavailable", "server_error"]
		.into_iter()
		.any(|transient| code.eq_ignore_ascii_case(transient))
}

fn mentions_transient(description: &str) -> bool {
	let lowered = description.to_ascii_lowercase();

	lowered.contains("temporarily_unavailable") || lowered.contains("service unavailable")
}

fn classify_status(status: Option<u16>, description: Option<&str>) -> ProviderFailure {
	match status {
		Some(429) => ProviderFailure::unavailable("provider is throttling requests"),
		Some(code) if code >= 500 =>
			ProviderFailure::unavailable(format!("provider answered with HTTP {code}")),
		Some(code) => ProviderFailure::rejected(
			format!("http_{code}"),
			description.map(ToOwned::to_owned),
		),
		None => ProviderFailure::rejected("unknown_error", description.map(ToOwned::to_owned)),
	}
}

fn truncate_description(description: String) -> String {
	if description.chars().count() <= ProviderFailure::DESCRIPTION_LIMIT {
		return description;
	}

	let mut buf: String = description.chars().take(ProviderFailure::DESCRIPTION_LIMIT).collect();

	buf.push('…');

	buf
}
