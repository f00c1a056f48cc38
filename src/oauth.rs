//! Token endpoint facade built on the `oauth2` crate.
//!
//! Azure AD's v1 endpoint scopes tokens with a `resource` form parameter and returns an
//! `id_token` next to the access token; [`AadTokenFields`] carries those extras through `oauth2`.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, Client, ClientId as OAuthClientId, EndpointNotSet,
	EndpointSet, ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken,
	RequestTokenError, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{Authority, ClientId, ResourceId, TokenSecret},
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{ProviderFailure, ProviderFuture},
};

type AadTokenResponse = StandardTokenResponse<AadTokenFields, BasicTokenType>;
type AadClient = Client<
	BasicErrorResponse,
	AadTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Azure AD specific fields returned next to the standard token response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AadTokenFields {
	/// Unsigned view of the signed-in principal (JWT).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
	/// Resource echoed back by the token endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub resource: Option<String>,
}
impl ExtraTokenFields for AadTokenFields {}

/// Maps HTTP transport failures into [`ProviderFailure`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts a transport error raised while calling `endpoint`.
	fn map_transport_error(
		&self,
		endpoint: &'static str,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> ProviderFailure;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: &'static str,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> ProviderFailure {
		let suffix = meta.map(ResponseMetadata::describe).unwrap_or_default();
		let message = match err {
			HttpClientError::Reqwest(inner) if inner.is_timeout() =>
				format!("request to the {endpoint} endpoint timed out{suffix}"),
			HttpClientError::Reqwest(inner) if inner.is_connect() =>
				format!("could not connect to the {endpoint} endpoint{suffix}"),
			HttpClientError::Reqwest(inner) =>
				format!("{endpoint} endpoint call failed: {inner}{suffix}"),
			HttpClientError::Http(inner) =>
				format!("{endpoint} request could not be built: {inner}"),
			HttpClientError::Io(inner) => format!("{endpoint} endpoint I/O failure: {inner}"),
			HttpClientError::Other(message) =>
				format!("{endpoint} endpoint call failed: {message}{suffix}"),
			_ => format!("{endpoint} endpoint call failed with an unknown transport error{suffix}"),
		};

		ProviderFailure::unavailable(message)
	}
}

/// Raw result of a token endpoint exchange.
#[derive(Clone)]
pub(crate) struct TokenExchange {
	pub(crate) access_token: TokenSecret,
	pub(crate) refresh_token: Option<TokenSecret>,
	pub(crate) expires_in: Duration,
	pub(crate) id_token: Option<String>,
}

/// Token endpoint client bound to one authority.
pub(crate) struct AadFacade<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: AadClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> AadFacade<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		authority: &Authority,
		client_id: &ClientId,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self, ProviderFailure> {
		let auth_url =
			AuthUrl::new(authority.authorize_endpoint().into()).map_err(invalid_authority)?;
		let token_url =
			TokenUrl::new(authority.token_endpoint().into()).map_err(invalid_authority)?;
		// Native clients are public; the client id travels in the form body.
		let oauth_client = Client::new(OAuthClientId::new(client_id.to_string()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { oauth_client, http_client, error_mapper })
	}

	pub(crate) fn refresh<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
		resource: &'a ResourceId,
	) -> ProviderFuture<'a, TokenExchange> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let secret = RefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&secret)
				.add_extra_param("resource", resource.as_str().to_owned())
				.request_async(&instrumented)
				.await
				.map_err(|err| self.map_request_error(meta.take(), err))?;

			map_token_response(response)
		})
	}

	pub(crate) fn exchange_code<'a>(
		&'a self,
		code: &'a str,
		pkce_verifier: &'a str,
		redirect_uri: &'a Url,
		resource: &'a ResourceId,
	) -> ProviderFuture<'a, TokenExchange> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::new(redirect_uri.to_string()).map_err(|err| {
				ProviderFailure::rejected("invalid_redirect_uri", Some(err.to_string()))
			})?;
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url))
				.add_extra_param("resource", resource.as_str().to_owned())
				.request_async(&instrumented)
				.await
				.map_err(|err| self.map_request_error(meta.take(), err))?;

			map_token_response(response)
		})
	}

	fn map_request_error(
		&self,
		meta: Option<ResponseMetadata>,
		err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
	) -> ProviderFailure {
		let meta_ref = meta.as_ref();

		match err {
			RequestTokenError::ServerResponse(response) => ProviderFailure::classify(
				Some(response.error().as_ref()),
				response.error_description().map(String::as_str),
				meta_ref.and_then(|meta| meta.status),
			),
			RequestTokenError::Request(error) =>
				self.error_mapper.map_transport_error("token", meta_ref, error),
			RequestTokenError::Parse(error, _body) => ProviderFailure::unavailable(format!(
				"token response could not be parsed at `{}`{}",
				error.path(),
				meta_ref.map(ResponseMetadata::describe).unwrap_or_default()
			)),
			RequestTokenError::Other(message) => ProviderFailure::unavailable(format!(
				"token endpoint returned an unexpected response: {message}"
			)),
		}
	}
}

fn map_token_response(response: AadTokenResponse) -> Result<TokenExchange, ProviderFailure> {
	let expires_in = response
		.expires_in()
		.and_then(|lifetime| i64::try_from(lifetime.as_secs()).ok())
		.filter(|secs| *secs > 0)
		.ok_or_else(|| {
			ProviderFailure::rejected(
				"invalid_token_response",
				Some("Token response is missing a positive expires_in".into()),
			)
		})?;

	Ok(TokenExchange {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned()))
			.filter(|token| !token.is_empty()),
		expires_in: Duration::seconds(expires_in),
		id_token: response.extra_fields().id_token.clone(),
	})
}

fn invalid_authority(err: url::ParseError) -> ProviderFailure {
	ProviderFailure::rejected("invalid_authority", Some(err.to_string()))
}
