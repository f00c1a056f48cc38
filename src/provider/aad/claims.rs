// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, auth::UserId, provider::ProviderFailure};

/// Subset of Azure AD `id_token` claims used to identify the session.
///
/// The token is only decoded, never verified; it arrives over the same TLS channel as the access
/// token it describes.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct IdTokenClaims {
	#[serde(default)]
	pub(crate) tid: Option<String>,
	#[serde(default)]
	upn: Option<String>,
	#[serde(default)]
	unique_name: Option<String>,
	#[serde(default)]
	preferred_username: Option<String>,
	#[serde(default)]
	email: Option<String>,
	#[serde(default)]
	oid: Option<String>,
}
impl IdTokenClaims {
	pub(crate) fn decode(id_token: &str) -> Result<Self, ProviderFailure> {
		let invalid = |detail: String| ProviderFailure::rejected("invalid_id_token", Some(detail));
		let payload = id_token
			.split('.')
			.nth(1)
			.filter(|segment| !segment.is_empty())
			.ok_or_else(|| invalid("id_token is not a JWT".into()))?;
		let bytes = URL_SAFE_NO_PAD
			.decode(payload.trim_end_matches('='))
			.map_err(|err| invalid(format!("id_token payload is not base64url: {err}")))?;

		let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&bytes)
			.map_err(|err| invalid(format!("id_token payload is not a JSON object: {err}")))?;

		serde_json::from_value(serde_json::Value::Object(object))
			.map_err(|err| invalid(format!("id_token claims are malformed: {err}")))
	}

	/// First usable principal name, preferring sign-in names over the object id.
	pub(crate) fn user_id(&self) -> Option<UserId> {
		[&self.upn, &self.unique_name, &self.preferred_username, &self.email, &self.oid]
			.into_iter()
			.flatten()
			.find_map(|value| UserId::new(value).ok())
	}
}
