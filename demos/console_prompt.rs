//! Signs in against Azure AD from a terminal.
//!
//! The authorize URL is printed; finish the sign-in in a browser and paste the URL the browser
//! was redirected to (an empty line cancels). The session is kept in a JSON file so later runs
//! reuse or refresh it.
//!
//! ```sh
//! cargo run --example console_prompt -- <client-id> <return-uri> <resource> [store-path]
//! ```

// std
use std::{
	env,
	io::{self, BufRead, Write},
	sync::Arc,
};
// crates.io
use color_eyre::{Result, eyre::eyre};
use url::Url;
// self
use credential_broker::{
	Broker,
	config::BrokerConfig,
	provider::{
		AadIdentityProvider, AuthorizeRequest, InteractivePrompt, PromptOutcome,
		aad::PromptFuture,
	},
	store::FileStore,
};

/// Prompt backed by stdin and stdout.
struct ConsolePrompt;
impl InteractivePrompt for ConsolePrompt {
	fn authorize<'a>(&'a self, request: &'a AuthorizeRequest) -> PromptFuture<'a> {
		Box::pin(async move {
			println!("Open this URL to sign in:\n\n{}\n", request.authorize_url);
			print!("Paste the {} redirect (empty to cancel): ", request.return_uri);

			if let Err(e) = io::stdout().flush() {
				return PromptOutcome::Failed { message: e.to_string() };
			}

			let mut line = String::new();

			if let Err(e) = io::stdin().lock().read_line(&mut line) {
				return PromptOutcome::Failed { message: e.to_string() };
			}

			match line.trim() {
				"" => PromptOutcome::Cancelled,
				raw => match Url::parse(raw) {
					Ok(callback) => PromptOutcome::Redirected(callback),
					Err(e) => PromptOutcome::Failed { message: format!("Invalid redirect: {e}") },
				},
			}
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let mut args = env::args().skip(1);
	let usage = || eyre!("Usage: console_prompt <client-id> <return-uri> <resource> [store-path]");
	let client_id = args.next().ok_or_else(usage)?;
	let return_uri = args.next().ok_or_else(usage)?;
	let resource = args.next().ok_or_else(usage)?;
	let store_path = args
		.next()
		.map(Into::into)
		.unwrap_or_else(|| env::temp_dir().join("credential-broker").join("session.json"));
	let broker = Broker::new(
		BrokerConfig::new(client_id, return_uri)?,
		Arc::new(AadIdentityProvider::new(Arc::new(ConsolePrompt))),
	)
	.with_store(Arc::new(FileStore::open(store_path)?));

	println!("Restored status: {:?}.", broker.restore().await?);

	let token = broker.ensure_access_token_for(resource).await?;

	println!("Signed in as {} until {}.", token.user_id, token.expires_at);
	println!("Account: {:?}.", broker.account());

	Ok(())
}
