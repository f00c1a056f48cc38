//! Broker-level error types surfaced by acquisition, sign-out, configuration, and persistence.

// self
use crate::{_prelude::*, provider::ProviderFailure};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error code reported when the user dismisses the interactive sign-in prompt.
pub const AUTHENTICATION_CANCELED: &str = "authentication_canceled";

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// No resource has been configured yet; call the resource-scoped operation first.
	#[error("No service resource is configured.")]
	ConfigurationMissing,
	/// The supplied resource is not a well-formed absolute URI.
	#[error("Resource `{value}` is not a valid absolute URI.")]
	InvalidResource {
		/// Raw value supplied by the caller.
		value: String,
		/// Underlying parsing failure, when the value did not parse at all.
		#[source]
		source: Option<url::ParseError>,
	},
	/// The identity provider rejected every acquisition attempt.
	#[error("Authentication failed ({code}): {description}.")]
	AuthenticationFailed {
		/// Provider- or broker-supplied error code.
		code: String,
		/// Human-readable description of the failure.
		description: String,
	},
	/// Discovery or token endpoints could not be reached in time.
	#[error("Identity provider is unavailable: {message}.")]
	ProviderUnavailable {
		/// Summary of the transport failure.
		message: String,
		/// `true` when the configured provider timeout elapsed.
		timed_out: bool,
	},

	/// Broker configuration is invalid.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Persistence-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
}
impl Error {
	/// Returns `true` for errors that require the caller to fix its input or configuration.
	pub fn is_configuration(&self) -> bool {
		matches!(
			self,
			Self::ConfigurationMissing | Self::InvalidResource { .. } | Self::Config(_)
		)
	}

	/// Returns `true` when the failure came from the user dismissing the sign-in prompt.
	pub fn is_cancellation(&self) -> bool {
		matches!(self, Self::AuthenticationFailed { code, .. } if code == AUTHENTICATION_CANCELED)
	}

	pub(crate) fn timed_out(stage: &'static str) -> Self {
		Self::ProviderUnavailable {
			message: format!("The {stage} call exceeded the provider timeout"),
			timed_out: true,
		}
	}
}
impl From<ProviderFailure> for Error {
	fn from(failure: ProviderFailure) -> Self {
		match failure {
			ProviderFailure::Unavailable { message } =>
				Self::ProviderUnavailable { message, timed_out: false },
			ProviderFailure::Cancelled => Self::AuthenticationFailed {
				code: AUTHENTICATION_CANCELED.into(),
				description: "The user canceled the sign-in prompt".into(),
			},
			ProviderFailure::Rejected { code, description } => Self::AuthenticationFailed {
				description: description.unwrap_or_else(|| code.clone()),
				code,
			},
			ProviderFailure::NoCachedCredential => Self::AuthenticationFailed {
				code: "no_cached_credential".into(),
				description: "No cached credential is available for the resource".into(),
			},
			ProviderFailure::CredentialExpired => Self::AuthenticationFailed {
				code: "credential_expired".into(),
				description: "The cached credential has expired".into(),
			},
		}
	}
}

/// Configuration and validation failures raised while building the broker or its collaborators.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client identifier is empty or contains whitespace.
	#[error("Client identifier is invalid.")]
	InvalidClientId(#[from] crate::auth::IdentifierError),
	/// Return (redirect) URI cannot be parsed.
	#[error("Return URI is invalid.")]
	InvalidReturnUri {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Authority URL cannot be parsed or is not hierarchical.
	#[error("Authority `{value}` is invalid.")]
	InvalidAuthority {
		/// Raw authority value.
		value: String,
	},
	/// Skew margin must not be negative.
	#[error("Expiry skew must not be negative.")]
	NegativeSkew,
	/// Provider timeout must be greater than zero.
	#[error("Provider timeout must be greater than zero.")]
	ZeroTimeout,
	/// Configuration document could not be parsed.
	#[error("Configuration document is malformed.")]
	Parse {
		/// Structured parsing failure including the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
