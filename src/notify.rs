//! Token-changed notifications delivered synchronously to registered listeners.
//!
//! Listeners are invoked in registration order on the task that committed the change, after the
//! record has been fully written, so a listener that inspects the broker observes the new state.
//! Dropping the [`Subscription`] returned by [`ListenerRegistry::subscribe`] unregisters the
//! listener.

// std
use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};
// self
use crate::_prelude::*;

/// Kind of change published to listeners. Carries no secrets; consumers re-query the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenChange {
	/// A different access token was committed.
	Issued,
	/// The session was signed out and the token discarded.
	Cleared,
}

/// Observer notified whenever the broker's access token changes.
pub trait TokenListener
where
	Self: Send + Sync,
{
	/// Called synchronously after the change has been committed.
	fn on_token_changed(&self, change: TokenChange);
}
impl<F> TokenListener for F
where
	F: Fn(TokenChange) + Send + Sync,
{
	fn on_token_changed(&self, change: TokenChange) {
		self(change)
	}
}

type ListenerList = RwLock<Vec<(u64, Arc<dyn TokenListener>)>>;

/// Registry of token listeners owned by a broker.
#[derive(Default)]
pub struct ListenerRegistry {
	listeners: Arc<ListenerList>,
	next_id: AtomicU64,
}
impl ListenerRegistry {
	/// Registers `listener` until the returned [`Subscription`] is dropped.
	pub fn subscribe(&self, listener: Arc<dyn TokenListener>) -> Subscription {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);

		self.listeners.write().push((id, listener));

		Subscription { id, listeners: Arc::downgrade(&self.listeners) }
	}

	/// Delivers `change` to every current listener.
	pub fn publish(&self, change: TokenChange) {
		// Snapshot first so listeners may subscribe or unsubscribe re-entrantly.
		let snapshot: Vec<_> =
			self.listeners.read().iter().map(|(_, listener)| listener.clone()).collect();

		for listener in snapshot {
			listener.on_token_changed(change);
		}
	}

	/// Number of registered listeners.
	pub fn len(&self) -> usize {
		self.listeners.read().len()
	}

	/// Returns `true` when no listener is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl Debug for ListenerRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ListenerRegistry").field("listeners", &self.len()).finish()
	}
}

/// Registration handle; dropping it removes the listener.
#[must_use = "dropping a Subscription immediately unregisters its listener"]
pub struct Subscription {
	id: u64,
	listeners: Weak<ListenerList>,
}
impl Subscription {
	/// Explicitly unregisters the listener.
	pub fn unsubscribe(self) {}
}
impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(listeners) = self.listeners.upgrade() {
			listeners.write().retain(|(id, _)| *id != self.id);
		}
	}
}
impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Subscription").field("id", &self.id).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn publish_reaches_every_listener_in_order() {
		let registry = ListenerRegistry::default();
		let seen = Arc::new(Mutex::new(Vec::new()));
		let first = {
			let seen = seen.clone();

			registry.subscribe(Arc::new(move |change: TokenChange| seen.lock().push((1, change))))
		};
		let second = {
			let seen = seen.clone();

			registry.subscribe(Arc::new(move |change: TokenChange| seen.lock().push((2, change))))
		};

		registry.publish(TokenChange::Issued);

		assert_eq!(*seen.lock(), vec![(1, TokenChange::Issued), (2, TokenChange::Issued)]);

		drop(first);
		registry.publish(TokenChange::Cleared);

		assert_eq!(seen.lock().last(), Some(&(2, TokenChange::Cleared)));
		assert_eq!(seen.lock().len(), 3);

		second.unsubscribe();

		assert!(registry.is_empty());
	}

	#[test]
	fn subscription_outliving_registry_is_harmless() {
		let registry = ListenerRegistry::default();
		let subscription = registry.subscribe(Arc::new(|_change: TokenChange| {}));

		drop(registry);
		drop(subscription);
	}
}
