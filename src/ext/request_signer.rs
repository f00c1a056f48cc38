//! Attaching broker-issued access tokens to outbound requests.
//!
//! [`BearerAuth`] covers the request shapes dependents usually hold: a reqwest builder, a typed
//! `http::Request`, or a plain header list rendered from a template such as
//! `[("Authorization", "Bearer "), ("Accept", "application/json")]`.

// std
use std::convert::Infallible;
// crates.io
use oauth2::http::{
	self, HeaderValue,
	header::{AUTHORIZATION, InvalidHeaderValue},
};
// self
use crate::broker::AccessToken;

/// Attaches an [`AccessToken`] to a request without constraining the HTTP client type.
pub trait RequestSignerExt<Request, Error>
where
	Self: Send + Sync,
{
	/// Consumes the request and returns it carrying the token.
	fn attach_token(&self, request: Request, token: &AccessToken) -> Result<Request, Error>;
}

/// Signs requests with an `Authorization: Bearer <token>` header.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerAuth;
#[cfg(feature = "reqwest")]
impl RequestSignerExt<reqwest::RequestBuilder, Infallible> for BearerAuth {
	fn attach_token(
		&self,
		request: reqwest::RequestBuilder,
		token: &AccessToken,
	) -> Result<reqwest::RequestBuilder, Infallible> {
		Ok(request.bearer_auth(token.expose()))
	}
}
impl<B> RequestSignerExt<http::Request<B>, InvalidHeaderValue> for BearerAuth {
	fn attach_token(
		&self,
		mut request: http::Request<B>,
		token: &AccessToken,
	) -> Result<http::Request<B>, InvalidHeaderValue> {
		let mut value = HeaderValue::from_str(&token.bearer())?;

		value.set_sensitive(true);
		request.headers_mut().insert(AUTHORIZATION, value);

		Ok(request)
	}
}
impl RequestSignerExt<Vec<(String, String)>, Infallible> for BearerAuth {
	/// Completes every templated `Authorization` entry, or appends one when the template has
	/// none.
	fn attach_token(
		&self,
		mut headers: Vec<(String, String)>,
		token: &AccessToken,
	) -> Result<Vec<(String, String)>, Infallible> {
		let bearer = token.bearer();
		let mut found = false;

		for (name, value) in headers.iter_mut() {
			if name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
				*value = bearer.clone();
				found = true;
			}
		}

		if !found {
			headers.push((AUTHORIZATION.as_str().to_owned(), bearer));
		}

		Ok(headers)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{ResourceId, TokenSecret, UserId};

	fn token() -> AccessToken {
		AccessToken {
			secret: TokenSecret::new("T1"),
			expires_at: macros::datetime!(2025-01-01 01:00 UTC),
			user_id: UserId::new("alice@contoso.example").expect("User fixture should be valid."),
			resource: ResourceId::parse("https://contoso.example/site")
				.expect("Resource fixture should parse."),
		}
	}

	#[test]
	fn header_template_is_completed() {
		let headers = BearerAuth
			.attach_token(
				vec![
					("Accept".into(), "application/json;odata=verbose".into()),
					("Authorization".into(), "Bearer ".into()),
				],
				&token(),
			)
			.expect("Header templates never fail.");

		assert_eq!(headers[1], ("Authorization".to_owned(), "Bearer T1".to_owned()));

		let appended = BearerAuth
			.attach_token(Vec::<(String, String)>::new(), &token())
			.expect("Header templates never fail.");

		assert_eq!(appended, vec![("authorization".to_owned(), "Bearer T1".to_owned())]);
	}

	#[test]
	fn http_request_receives_sensitive_header() {
		let request = http::Request::builder()
			.uri("https://contoso.example/site/_api/web")
			.body(())
			.expect("Request fixture should build.");
		let signed =
			BearerAuth.attach_token(request, &token()).expect("Token should be a valid header.");
		let value =
			signed.headers().get(AUTHORIZATION).expect("Authorization header should be set.");

		assert_eq!(value, "Bearer T1");
		assert!(value.is_sensitive());
	}
}
