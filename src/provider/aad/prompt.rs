//! Interactive sign-in prompt contract and the authorization request it renders.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	provider::{ProviderFailure, TokenRequest},
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;
const PKCE_METHOD: &str = "S256";

/// Boxed future returned by [`InteractivePrompt::authorize`].
pub type PromptFuture<'a> = Pin<Box<dyn Future<Output = PromptOutcome> + 'a + Send>>;

/// Shows the provider's sign-in page to the user.
///
/// Desktop apps typically back this with an embedded web view, CLIs with the system browser and
/// a loopback listener.
pub trait InteractivePrompt
where
	Self: Send + Sync,
{
	/// Navigates to [`AuthorizeRequest::authorize_url`] and resolves once the browser reaches
	/// [`AuthorizeRequest::return_uri`] or the user closes the prompt.
	fn authorize<'a>(&'a self, request: &'a AuthorizeRequest) -> PromptFuture<'a>;
}

/// How an interactive prompt ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptOutcome {
	/// The browser was redirected to the return URI; carries the full callback URL.
	Redirected(Url),
	/// The user dismissed the prompt.
	Cancelled,
	/// The prompt could not be shown or lost connectivity.
	Failed {
		/// Description of the failure.
		message: String,
	},
}

/// Authorization-code request (with PKCE) handed to an [`InteractivePrompt`].
#[derive(Clone)]
pub struct AuthorizeRequest {
	/// Fully formed authorize URL the prompt should open.
	pub authorize_url: Url,
	/// Redirect URI that ends the prompt.
	pub return_uri: Url,
	/// Opaque state value that must round-trip through the redirect.
	pub state: String,
	code_challenge: String,
	pkce_verifier: String,
}
impl AuthorizeRequest {
	pub(crate) fn new(request: TokenRequest<'_>, return_uri: &Url) -> Self {
		let state = random_string(STATE_LEN);
		let pkce_verifier = random_string(PKCE_VERIFIER_LEN);
		let code_challenge = compute_pkce_challenge(&pkce_verifier);
		let mut authorize_url = request.authority.authorize_endpoint();
		let mut pairs = authorize_url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", request.client_id);
		pairs.append_pair("redirect_uri", return_uri.as_str());
		pairs.append_pair("resource", request.resource.as_str());
		pairs.append_pair("state", &state);
		pairs.append_pair("code_challenge", &code_challenge);
		pairs.append_pair("code_challenge_method", PKCE_METHOD);

		if let Some(user) = request.user_hint {
			pairs.append_pair("login_hint", user);
		}

		drop(pairs);

		Self { authorize_url, return_uri: return_uri.clone(), state, code_challenge, pkce_verifier }
	}

	/// PKCE challenge embedded in the authorize URL.
	pub fn code_challenge(&self) -> &str {
		&self.code_challenge
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		&self.pkce_verifier
	}

	/// Extracts the authorization code from the callback URL the prompt landed on.
	pub(crate) fn authorization_code(&self, callback: &Url) -> Result<String, ProviderFailure> {
		let mut code = None;
		let mut state = None;
		let mut error = None;
		let mut error_description = None;

		for (key, value) in callback.query_pairs() {
			match key.as_ref() {
				"code" => code = Some(value.into_owned()),
				"state" => state = Some(value.into_owned()),
				"error" => error = Some(value.into_owned()),
				"error_description" => error_description = Some(value.into_owned()),
				_ => {},
			}
		}

		if let Some(error) = error {
			return Err(ProviderFailure::classify(Some(&error), error_description.as_deref(), None));
		}
		if state.as_deref() != Some(self.state.as_str()) {
			return Err(ProviderFailure::rejected(
				"state_mismatch",
				Some("Authorization state did not round-trip".into()),
			));
		}

		code.filter(|code| !code.is_empty()).ok_or_else(|| {
			ProviderFailure::rejected(
				"missing_authorization_code",
				Some("Callback carried no authorization code".into()),
			)
		})
	}
}
impl Debug for AuthorizeRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizeRequest")
			.field("authorize_url", &self.authorize_url)
			.field("return_uri", &self.return_uri)
			.field("state", &self.state)
			.field("code_challenge", &self.code_challenge)
			.finish()
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
