//! Persistence contract for the broker's credential record, with in-memory and file backends.
//!
//! The broker saves the whole record after every committed change (token issued, resource
//! reconfigured, sign-out) and loads it once through [`Broker::restore`](crate::Broker::restore).

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::CredentialRecord};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend for the single credential record.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Loads the persisted record, if any.
	fn load(&self) -> StoreFuture<'_, Option<CredentialRecord>>;

	/// Replaces the persisted record.
	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()>;

	/// Removes the persisted record.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// The record could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
