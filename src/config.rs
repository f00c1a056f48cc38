//! Registration-time broker settings (client id, return URI, authorities, timing margins).

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::{Authority, ClientId},
	error::ConfigError,
};

/// Azure AD instance used when no authority is configured.
pub const DEFAULT_INSTANCE: &str = "https://login.microsoftonline.com";

/// Validated broker configuration.
///
/// The document form (`BrokerSettings`) can be loaded from JSON; [`BrokerConfig::from_json`]
/// reports the exact path of any malformed field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
	/// Identifier of the registered native client.
	pub client_id: ClientId,
	/// Redirect URI registered for the interactive prompt.
	pub return_uri: Url,
	/// Multi-tenant authority queried until a tenant authority is learned.
	pub common_authority: Authority,
	/// Margin subtracted from expiry before a token is considered fresh.
	pub skew: Duration,
	/// Upper bound for each identity-provider call.
	pub provider_timeout: StdDuration,
}
impl BrokerConfig {
	/// Default expiry skew margin.
	pub const DEFAULT_SKEW: Duration = Duration::seconds(10);
	/// Default bound for a single identity-provider call.
	pub const DEFAULT_PROVIDER_TIMEOUT: StdDuration = StdDuration::from_secs(60);

	/// Creates a configuration against the default multi-tenant authority.
	pub fn new(
		client_id: impl AsRef<str>,
		return_uri: impl AsRef<str>,
	) -> Result<Self, ConfigError> {
		let instance = Url::parse(DEFAULT_INSTANCE)
			.map_err(|_| ConfigError::InvalidAuthority { value: DEFAULT_INSTANCE.into() })?;

		Ok(Self {
			client_id: ClientId::new(client_id)?,
			return_uri: parse_return_uri(return_uri.as_ref())?,
			common_authority: Authority::common(&instance)?,
			skew: Self::DEFAULT_SKEW,
			provider_timeout: Self::DEFAULT_PROVIDER_TIMEOUT,
		})
	}

	/// Parses and validates a JSON settings document.
	pub fn from_json(payload: &[u8]) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_slice(payload);
		let settings: BrokerSettings = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ConfigError::Parse { source })?;

		settings.try_into()
	}

	/// Overrides the multi-tenant authority (e.g. a sovereign cloud instance).
	pub fn with_common_authority(mut self, authority: Authority) -> Self {
		self.common_authority = authority;

		self
	}

	/// Overrides the expiry skew margin.
	pub fn with_skew(mut self, skew: Duration) -> Result<Self, ConfigError> {
		if skew.is_negative() {
			return Err(ConfigError::NegativeSkew);
		}

		self.skew = skew;

		Ok(self)
	}

	/// Overrides the bound applied to each identity-provider call.
	pub fn with_provider_timeout(mut self, timeout: StdDuration) -> Result<Self, ConfigError> {
		if timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout);
		}

		self.provider_timeout = timeout;

		Ok(self)
	}
}

/// Serialized settings document accepted by [`BrokerConfig::from_json`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrokerSettings {
	/// Client identifier.
	pub client_id: String,
	/// Return URI.
	pub return_uri: String,
	/// Optional multi-tenant authority override.
	#[serde(default)]
	pub authority: Option<String>,
	/// Optional skew margin in seconds.
	#[serde(default)]
	pub skew_secs: Option<i64>,
	/// Optional provider timeout in seconds.
	#[serde(default)]
	pub provider_timeout_secs: Option<u64>,
}
impl TryFrom<BrokerSettings> for BrokerConfig {
	type Error = ConfigError;

	fn try_from(settings: BrokerSettings) -> Result<Self, Self::Error> {
		let mut config = BrokerConfig::new(&settings.client_id, &settings.return_uri)?;

		if let Some(authority) = settings.authority {
			config = config.with_common_authority(Authority::parse(authority)?);
		}
		if let Some(secs) = settings.skew_secs {
			config = config.with_skew(Duration::seconds(secs))?;
		}
		if let Some(secs) = settings.provider_timeout_secs {
			config = config.with_provider_timeout(StdDuration::from_secs(secs))?;
		}

		Ok(config)
	}
}

fn parse_return_uri(value: &str) -> Result<Url, ConfigError> {
	Url::parse(value).map_err(|source| ConfigError::InvalidReturnUri { source })
}
