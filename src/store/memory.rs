//! Thread-safe in-memory [`CredentialStore`] for tests and ephemeral sessions.

// self
use crate::{
	_prelude::*,
	auth::CredentialRecord,
	store::{CredentialStore, StoreFuture},
};

/// Keeps the record in-process; clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<CredentialRecord>>>);
impl MemoryStore {
	/// Creates a store pre-populated with `record`.
	pub fn with_record(record: CredentialRecord) -> Self {
		Self(Arc::new(RwLock::new(Some(record))))
	}

	/// Returns the stored record without going through the async contract.
	pub fn snapshot(&self) -> Option<CredentialRecord> {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<CredentialRecord>> {
		Box::pin(async move { Ok(self.snapshot()) })
	}

	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			*self.0.write() = Some(record);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.0.write().take();

			Ok(())
		})
	}
}
