#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use httpmock::prelude::*;
use parking_lot::Mutex;
use time::{Duration, macros};
use url::Url;
// self
use credential_broker::{
	Broker,
	auth::{Authority, CredentialStatus},
	clock::ManualClock,
	config::BrokerConfig,
	error::Error,
	provider::{
		AadIdentityProvider, AuthorizeRequest, InteractivePrompt, PromptOutcome,
		aad::PromptFuture,
	},
};

const CLIENT_ID: &str = "client-1";
const RETURN_URI: &str = "https://localhost/callback";
const TENANT: &str = "contoso-tenant";
const USER: &str = "alice@contoso.example";
const CHALLENGE: &str =
	r#"Bearer realm="contoso-tenant", client_id="00000003-0000-0ff1-ce00-000000000000""#;

/// Prompt that consents immediately, or dismisses the page when `cancel` is set.
#[derive(Default)]
struct AutoConsent {
	cancel: bool,
	opened: Mutex<Vec<Url>>,
}
impl InteractivePrompt for AutoConsent {
	fn authorize<'a>(&'a self, request: &'a AuthorizeRequest) -> PromptFuture<'a> {
		Box::pin(async move {
			self.opened.lock().push(request.authorize_url.clone());

			if self.cancel {
				return PromptOutcome::Cancelled;
			}

			let mut callback = request.return_uri.clone();

			callback
				.query_pairs_mut()
				.append_pair("code", "auth-code-1")
				.append_pair("state", &request.state);

			PromptOutcome::Redirected(callback)
		})
	}
}

struct Harness {
	server: MockServer,
	resource: String,
	clock: ManualClock,
	prompt: Arc<AutoConsent>,
	broker: Broker,
}
impl Harness {
	async fn start(prompt: AutoConsent) -> Result<Self> {
		let server = MockServer::start_async().await;
		let instance = Url::parse(&server.base_url())?;
		let resource = format!("{}/site", server.base_url());
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let prompt = Arc::new(prompt);
		let provider = AadIdentityProvider::new(prompt.clone())
			.with_instance(instance.clone())
			.with_clock(Arc::new(clock.clone()));
		let config = BrokerConfig::new(CLIENT_ID, RETURN_URI)?
			.with_common_authority(Authority::common(&instance)?);
		let broker = Broker::new(config, Arc::new(provider)).with_clock(Arc::new(clock.clone()));

		Ok(Self { server, resource, clock, prompt, broker })
	}
}

fn id_token(claims: &str) -> String {
	format!(
		"{}.{}.",
		URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#),
		URL_SAFE_NO_PAD.encode(claims)
	)
}

fn token_body(access_token: &str, refresh_token: &str) -> String {
	token_body_expiring(access_token, refresh_token, 3600)
}

fn token_body_expiring(access_token: &str, refresh_token: &str, expires_in: i64) -> String {
	serde_json::json!({
		"access_token": access_token,
		"refresh_token": refresh_token,
		"token_type": "Bearer",
		"expires_in": expires_in,
		"id_token": id_token(&format!(r#"{{"tid":"{TENANT}","upn":"{USER}"}}"#)),
	})
	.to_string()
}

#[tokio::test]
async fn interactive_sign_in_then_cache_then_refresh() -> Result<()> {
	let harness = Harness::start(AutoConsent::default()).await?;
	let resource = harness.resource.clone();
	let token_path = format!("/{TENANT}/oauth2/token");
	let discovery = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/site/_api/").header("authorization", "Bearer");
			then.status(401).header("www-authenticate", CHALLENGE);
		})
		.await;
	let code_exchange = harness
		.server
		.mock_async(|when, then| {
			when.method(POST)
				.path(&token_path)
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "auth-code-1")
				.form_urlencoded_tuple("client_id", CLIENT_ID)
				.form_urlencoded_tuple("resource", &resource);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", "refresh-1"));
		})
		.await;
	let refresh = harness
		.server
		.mock_async(|when, then| {
			when.method(POST)
				.path(&token_path)
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-1")
				.form_urlencoded_tuple("resource", &resource);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-2", "refresh-2"));
		})
		.await;
	let first = harness.broker.ensure_access_token_for(&resource).await?;

	assert_eq!(first.expose(), "access-1");
	assert_eq!(&*first.user_id, USER);
	assert_eq!(first.expires_at, macros::datetime!(2025-01-01 01:00 UTC));

	let account = harness.broker.account();
	let authority = account.authority.expect("Sign-in should narrow the authority.");

	assert_eq!(authority.tenant(), TENANT);

	let opened = harness.prompt.opened.lock().clone();
	let authorize_url = opened.first().expect("The prompt should have been opened.");
	let query: Vec<(String, String)> = authorize_url.query_pairs().into_owned().collect();

	assert_eq!(authorize_url.path(), format!("/{TENANT}/oauth2/authorize"));
	assert!(query.contains(&("resource".into(), resource.clone())));
	assert!(query.contains(&("code_challenge_method".into(), "S256".into())));

	let cached = harness.broker.ensure_access_token().await?;

	assert_eq!(cached.expose(), "access-1");

	harness.clock.advance(Duration::hours(1));

	assert_eq!(harness.broker.status(), CredentialStatus::Expired);

	let refreshed = harness.broker.ensure_access_token().await?;

	assert_eq!(refreshed.expose(), "access-2");

	discovery.assert_calls_async(1).await;
	code_exchange.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	Ok(())
}

#[tokio::test]
async fn dismissed_prompt_skips_the_token_endpoint() -> Result<()> {
	let harness = Harness::start(AutoConsent { cancel: true, ..Default::default() }).await?;
	let discovery = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/site/_api/");
			then.status(401).header("www-authenticate", CHALLENGE);
		})
		.await;
	let token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path(format!("/{TENANT}/oauth2/token"));
			then.status(500);
		})
		.await;
	let err = harness
		.broker
		.ensure_access_token_for(&harness.resource)
		.await
		.expect_err("A dismissed prompt must fail the call.");

	assert!(err.is_cancellation());
	assert_eq!(harness.broker.status(), CredentialStatus::Configured);

	discovery.assert_async().await;
	token.assert_calls_async(0).await;

	Ok(())
}

#[tokio::test]
async fn rejected_code_exchange_reports_oauth_error() -> Result<()> {
	let harness = Harness::start(AutoConsent::default()).await?;
	let _discovery = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/site/_api/");
			then.status(401).header("www-authenticate", CHALLENGE);
		})
		.await;
	let token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path(format!("/{TENANT}/oauth2/token"));
			then.status(400).header("content-type", "application/json").body(
				r#"{"error":"invalid_client","error_description":"AADSTS700016: Application not found"}"#,
			);
		})
		.await;
	let err = harness
		.broker
		.ensure_access_token_for(&harness.resource)
		.await
		.expect_err("The token endpoint rejection should surface.");

	match err {
		Error::AuthenticationFailed { code, description } => {
			assert_eq!(code, "invalid_client");
			assert!(description.contains("AADSTS700016"));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	token.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn unreachable_resource_is_reported_as_unavailable() -> Result<()> {
	let harness = Harness::start(AutoConsent::default()).await?;
	let discovery = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/site/_api/");
			then.status(503);
		})
		.await;
	let err = harness
		.broker
		.ensure_access_token_for(&harness.resource)
		.await
		.expect_err("A failing discovery probe should surface.");

	assert!(matches!(err, Error::ProviderUnavailable { timed_out: false, .. }));
	assert!(harness.prompt.opened.lock().is_empty());

	discovery.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn out_of_range_lifetime_is_rejected() -> Result<()> {
	let harness = Harness::start(AutoConsent::default()).await?;
	let _discovery = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/site/_api/");
			then.status(401).header("www-authenticate", CHALLENGE);
		})
		.await;
	let token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path(format!("/{TENANT}/oauth2/token"));
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body_expiring("access-1", "refresh-1", i64::MAX));
		})
		.await;
	let err = harness
		.broker
		.ensure_access_token_for(&harness.resource)
		.await
		.expect_err("An unrepresentable expiry should fail the call.");

	match err {
		Error::AuthenticationFailed { code, .. } => assert_eq!(code, "invalid_token_response"),
		other => panic!("Unexpected error: {other:?}."),
	}

	assert_eq!(harness.broker.status(), CredentialStatus::Configured);

	token.assert_async().await;

	Ok(())
}
