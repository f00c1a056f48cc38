//! JSON file-backed [`CredentialStore`] for desktop apps and CLIs.
//!
//! Writes go to a sibling `.tmp` file which is synced and then renamed over the target, so a
//! crash never leaves a half-written record behind.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::CredentialRecord,
	store::{CredentialStore, StoreError, StoreFuture},
};

/// Persists the credential record as pretty-printed JSON at a fixed path.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	write_lock: Mutex<()>,
}
impl FileStore {
	/// Opens a store at `path`, creating parent directories as needed.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		Ok(Self { path, write_lock: Mutex::new(()) })
	}

	/// Location of the JSON document.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read_now(&self) -> Result<Option<CredentialRecord>, StoreError> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(backend(format!("Failed to read {}: {e}", self.path.display()))),
		};

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(None);
		}

		serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", self.path.display()),
		})
	}

	fn write_now(&self, record: &CredentialRecord) -> Result<(), StoreError> {
		let _guard = self.write_lock.lock();

		ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(record).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credential record: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path)
				.map_err(|e| backend(format!("Failed to create {}: {e}", tmp_path.display())))?;

			file.write_all(&serialized)
				.map_err(|e| backend(format!("Failed to write {}: {e}", tmp_path.display())))?;
			file.sync_all()
				.map_err(|e| backend(format!("Failed to sync {}: {e}", tmp_path.display())))?;
		}

		fs::rename(&tmp_path, &self.path)
			.map_err(|e| backend(format!("Failed to replace {}: {e}", self.path.display())))
	}

	fn remove_now(&self) -> Result<(), StoreError> {
		let _guard = self.write_lock.lock();

		match fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(backend(format!("Failed to remove {}: {e}", self.path.display()))),
		}
	}
}
impl CredentialStore for FileStore {
	fn load(&self) -> StoreFuture<'_, Option<CredentialRecord>> {
		Box::pin(async move { self.read_now() })
	}

	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.write_now(&record) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.remove_now() })
	}
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| {
			backend(format!("Failed to create store directory {}: {e}", parent.display()))
		})?;
	}

	Ok(())
}

fn backend(message: String) -> StoreError {
	StoreError::Backend { message }
}
