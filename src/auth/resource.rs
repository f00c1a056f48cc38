//! Resource and authority addressing.
//!
//! A [`ResourceId`] is the audience a token is scoped to (for example a SharePoint site). An
//! [`Authority`] is the issuer endpoint (`{instance}/{tenant}`); the `common` tenant is the
//! multi-tenant entry point that is narrowed to a specific tenant after the first successful
//! sign-in.

// self
use crate::{_prelude::*, error::ConfigError};

/// Tenant segment used by the multi-tenant authority.
pub const COMMON_TENANT: &str = "common";

/// Absolute URI of the backend resource a token is scoped to.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(Url);
impl ResourceId {
	/// Parses and validates a resource URI.
	///
	/// The value must be an absolute, hierarchical URI with a host; anything else is rejected
	/// with [`Error::InvalidResource`].
	pub fn parse(value: impl AsRef<str>) -> Result<Self> {
		let raw = value.as_ref();
		let url = Url::parse(raw.trim()).map_err(|source| Error::InvalidResource {
			value: raw.to_owned(),
			source: Some(source),
		})?;

		if url.cannot_be_a_base() || url.host_str().is_none_or(str::is_empty) {
			return Err(Error::InvalidResource { value: raw.to_owned(), source: None });
		}

		Ok(Self(url))
	}

	/// Returns the normalized URI string.
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}

	/// Returns the parsed URL.
	pub fn url(&self) -> &Url {
		&self.0
	}

	/// REST endpoint root of the resource (`{resource}/_api/`).
	pub fn api_endpoint(&self) -> Url {
		let mut url = self.0.clone();

		url.set_query(None);
		url.set_fragment(None);

		if let Ok(mut segments) = url.path_segments_mut() {
			segments.pop_if_empty().push("_api").push("");
		}

		url
	}
}
impl AsRef<str> for ResourceId {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}
impl From<ResourceId> for String {
	fn from(value: ResourceId) -> Self {
		value.0.into()
	}
}
impl TryFrom<String> for ResourceId {
	type Error = Error;

	fn try_from(value: String) -> Result<Self> {
		Self::parse(value)
	}
}
impl FromStr for ResourceId {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}
impl Debug for ResourceId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Resource({})", self.0)
	}
}
impl Display for ResourceId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Token-issuing endpoint for a tenant (`{instance}/{tenant}`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Authority(Url);
impl Authority {
	/// Parses an authority URL such as `https://login.microsoftonline.com/contoso.com`.
	pub fn parse(value: impl AsRef<str>) -> Result<Self, ConfigError> {
		let raw = value.as_ref();
		let invalid = || ConfigError::InvalidAuthority { value: raw.to_owned() };
		let mut url = Url::parse(raw.trim()).map_err(|_| invalid())?;

		if url.cannot_be_a_base() || url.host_str().is_none() {
			return Err(invalid());
		}

		url.set_query(None);
		url.set_fragment(None);

		if let Ok(mut segments) = url.path_segments_mut() {
			segments.pop_if_empty();
		}

		let authority = Self(url);

		if authority.tenant().is_empty() {
			return Err(invalid());
		}

		Ok(authority)
	}

	/// Builds the multi-tenant authority for an instance such as
	/// `https://login.microsoftonline.com`.
	pub fn common(instance: &Url) -> Result<Self, ConfigError> {
		Self::for_tenant(instance, COMMON_TENANT)
	}

	/// Builds the authority for `tenant` under `instance`.
	pub fn for_tenant(instance: &Url, tenant: &str) -> Result<Self, ConfigError> {
		let invalid = || ConfigError::InvalidAuthority { value: format!("{instance}{tenant}") };

		if tenant.is_empty() || tenant.contains('/') {
			return Err(invalid());
		}

		let mut url = instance.clone();

		url.set_query(None);
		url.set_fragment(None);
		url.path_segments_mut().map_err(|_| invalid())?.pop_if_empty().push(tenant);

		Self::parse(url.as_str())
	}

	/// Returns a copy of this authority rebound to another tenant on the same instance.
	pub fn with_tenant(&self, tenant: &str) -> Result<Self, ConfigError> {
		Self::for_tenant(&self.instance(), tenant)
	}

	/// Tenant segment (the last path segment).
	pub fn tenant(&self) -> &str {
		self.0.path_segments().and_then(|segments| segments.last()).unwrap_or_default()
	}

	/// Returns `true` for the multi-tenant authority, which never yields cache hits.
	pub fn is_common(&self) -> bool {
		self.tenant().eq_ignore_ascii_case(COMMON_TENANT)
	}

	/// Instance URL without the tenant segment.
	pub fn instance(&self) -> Url {
		let mut url = self.0.clone();

		if let Ok(mut segments) = url.path_segments_mut() {
			segments.pop();
		}

		url
	}

	/// OAuth token endpoint (`{authority}/oauth2/token`).
	pub fn token_endpoint(&self) -> Url {
		self.endpoint("token")
	}

	/// OAuth authorization endpoint (`{authority}/oauth2/authorize`).
	pub fn authorize_endpoint(&self) -> Url {
		self.endpoint("authorize")
	}

	/// Returns the normalized authority string.
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}

	fn endpoint(&self, leaf: &str) -> Url {
		let mut url = self.0.clone();

		if let Ok(mut segments) = url.path_segments_mut() {
			segments.push("oauth2").push(leaf);
		}

		url
	}
}
impl From<Authority> for String {
	fn from(value: Authority) -> Self {
		value.0.into()
	}
}
impl TryFrom<String> for Authority {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, ConfigError> {
		Self::parse(value)
	}
}
impl Debug for Authority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Authority({})", self.0)
	}
}
impl Display for Authority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn resource_requires_absolute_hierarchical_uri() {
		assert!(matches!(ResourceId::parse("not a uri"), Err(Error::InvalidResource { .. })));
		assert!(matches!(ResourceId::parse("/relative/site"), Err(Error::InvalidResource { .. })));
		assert!(matches!(
			ResourceId::parse("mailto:admin@contoso.example"),
			Err(Error::InvalidResource { source: None, .. })
		));

		let resource = ResourceId::parse("https://contoso.example/site")
			.expect("Absolute resource should parse.");

		assert_eq!(resource.as_str(), "https://contoso.example/site");
	}

	#[test]
	fn api_endpoint_appends_rest_root() {
		let site = ResourceId::parse("https://contoso.example/sites/dev")
			.expect("Site resource should parse.");
		let root = ResourceId::parse("https://contoso.example").expect("Root should parse.");

		assert_eq!(site.api_endpoint().as_str(), "https://contoso.example/sites/dev/_api/");
		assert_eq!(root.api_endpoint().as_str(), "https://contoso.example/_api/");
	}

	#[test]
	fn authority_rebinds_tenant_and_builds_endpoints() {
		let instance =
			Url::parse("https://login.example.com").expect("Instance fixture should parse.");
		let common = Authority::common(&instance).expect("Common authority should build.");

		assert!(common.is_common());
		assert_eq!(common.as_str(), "https://login.example.com/common");

		let tenant = common.with_tenant("contoso.example").expect("Tenant should rebind.");

		assert!(!tenant.is_common());
		assert_eq!(tenant.tenant(), "contoso.example");
		assert_eq!(
			tenant.token_endpoint().as_str(),
			"https://login.example.com/contoso.example/oauth2/token"
		);
		assert_eq!(
			tenant.authorize_endpoint().as_str(),
			"https://login.example.com/contoso.example/oauth2/authorize"
		);
	}

	#[test]
	fn authority_parse_strips_trailing_slash() {
		let authority = Authority::parse("https://login.example.com/tenant-id/")
			.expect("Authority with trailing slash should parse.");

		assert_eq!(authority.as_str(), "https://login.example.com/tenant-id");
		assert!(Authority::parse("https://login.example.com/").is_err());
		assert!(Authority::parse("urn:tenant").is_err());
	}
}
