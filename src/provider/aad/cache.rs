//! Provider-side token cache backing silent acquisition.

// self
use crate::{
	_prelude::*,
	auth::{Authority, ClientId, ResourceId, UserId},
	provider::TokenGrant,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
	authority: Authority,
	resource: ResourceId,
	client_id: ClientId,
	user_id: UserId,
}

/// In-process token cache consulted by silent acquisition.
///
/// Entries are keyed by the issuing tenant authority, so lookups against the `common` authority
/// never match.
#[derive(Debug, Default)]
pub struct ProviderCache {
	entries: RwLock<HashMap<CacheKey, TokenGrant>>,
}
impl ProviderCache {
	/// Stores `grant` for `resource`, replacing any previous entry for the same principal.
	pub fn insert(&self, resource: &ResourceId, client_id: &ClientId, grant: TokenGrant) {
		let key = CacheKey {
			authority: grant.tenant_authority.clone(),
			resource: resource.clone(),
			client_id: client_id.clone(),
			user_id: grant.user_id.clone(),
		};

		self.entries.write().insert(key, grant);
	}

	/// Finds the entry for the request, picking the longest-lived one when no user is given.
	pub fn lookup(
		&self,
		authority: &Authority,
		resource: &ResourceId,
		client_id: &ClientId,
		user: Option<&UserId>,
	) -> Option<TokenGrant> {
		self.entries
			.read()
			.iter()
			.filter(|(key, _)| {
				&key.authority == authority
					&& &key.resource == resource
					&& &key.client_id == client_id
					&& user.is_none_or(|user| &key.user_id == user)
			})
			.map(|(_, grant)| grant)
			.max_by_key(|grant| grant.expires_at)
			.cloned()
	}

	/// Drops every entry issued to `user` and returns how many were removed.
	pub fn evict_user(&self, user: &UserId) -> usize {
		let mut entries = self.entries.write();
		let before = entries.len();

		entries.retain(|key, _| &key.user_id != user);

		before - entries.len()
	}

	/// Number of cached entries.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when the cache is empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
