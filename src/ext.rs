//! Extension points for consumers of broker-issued tokens.

pub mod request_signer;

pub use request_signer::*;
