//! Signs in against a mocked Azure AD tenant, serves the cached token, and attaches it to a
//! templated header list while a listener reports token changes.

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use credential_broker::{
	Broker,
	auth::Authority,
	config::BrokerConfig,
	ext::request_signer::{BearerAuth, RequestSignerExt},
	notify::TokenChange,
	provider::{
		AadIdentityProvider, AuthorizeRequest, InteractivePrompt, PromptOutcome,
		aad::PromptFuture,
	},
};

/// Consents on the user's behalf by echoing the state back to the return URI.
struct Consent;
impl InteractivePrompt for Consent {
	fn authorize<'a>(&'a self, request: &'a AuthorizeRequest) -> PromptFuture<'a> {
		Box::pin(async move {
			println!("Prompt opened at {}.", request.authorize_url);

			let mut callback = request.return_uri.clone();

			callback
				.query_pairs_mut()
				.append_pair("code", "demo-code")
				.append_pair("state", &request.state);

			PromptOutcome::Redirected(callback)
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let claims =
		URL_SAFE_NO_PAD.encode(r#"{"tid":"contoso-tenant","upn":"alice@contoso.example"}"#);
	let discovery_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/site/_api/");
			then.status(401).header("www-authenticate", r#"Bearer realm="contoso-tenant""#);
		})
		.await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/contoso-tenant/oauth2/token");
			then.status(200).header("content-type", "application/json").body(
				serde_json::json!({
					"access_token": "demo-access",
					"refresh_token": "demo-refresh",
					"token_type": "Bearer",
					"expires_in": 3600,
					"id_token": format!("e30.{claims}."),
				})
				.to_string(),
			);
		})
		.await;
	let instance = Url::parse(&server.base_url())?;
	let provider = AadIdentityProvider::new(Arc::new(Consent)).with_instance(instance.clone());
	let config = BrokerConfig::new("demo-client", "https://localhost/callback")?
		.with_common_authority(Authority::common(&instance)?);
	let broker = Broker::new(config, Arc::new(provider));
	let _subscription = broker.subscribe(Arc::new(|change: TokenChange| {
		println!("Token changed: {change:?}.");
	}));
	let token = broker.ensure_access_token_for(server.url("/site")).await?;
	let again = broker.ensure_access_token().await?;

	println!("Signed in as {} until {}.", token.user_id, token.expires_at);
	println!("Second call reused the cached token: {}.", token == again);

	let template = vec![
		("Authorization".to_owned(), "Bearer ".to_owned()),
		("Accept".to_owned(), "application/json".to_owned()),
	];
	let headers = BearerAuth.attach_token(template, &again)?;
	let names = headers.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>();

	println!("Signed header names: {names:?}.");
	println!("Account: {:?}.", broker.account());

	discovery_mock.assert_async().await;
	token_mock.assert_async().await;

	broker.sign_out().await;

	println!("Status after sign-out: {:?}.", broker.status());

	Ok(())
}
