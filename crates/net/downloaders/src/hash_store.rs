use chainsync_primitives::{B256, U256};
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Default)]
struct Inner {
    hashes: VecDeque<B256>,
    highest_td: Option<U256>,
}

/// The auxiliary ordered store of hashes awaiting block retrieval, plus the highest total
/// difficulty known to `SyncManager` for the peer currently authoritative for hash retrieval.
#[derive(Default)]
pub struct HashStore {
    inner: Mutex<Inner>,
}

impl HashStore {
    /// Builds an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `hash` onto the front of the pending queue, for immediate retrieval next.
    pub fn push_front(&self, hash: B256) {
        self.inner.lock().hashes.push_front(hash);
    }

    /// Pushes `hash` onto the back of the pending queue.
    pub fn push_back(&self, hash: B256) {
        self.inner.lock().hashes.push_back(hash);
    }

    /// Pops the next hash to retrieve, if any.
    pub fn pop_front(&self) -> Option<B256> {
        self.inner.lock().hashes.pop_front()
    }

    /// `true` if no hashes are pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().hashes.is_empty()
    }

    /// The number of pending hashes.
    pub fn len(&self) -> usize {
        self.inner.lock().hashes.len()
    }

    /// Drops every pending hash, leaving `highest_td` untouched.
    pub fn clear(&self) {
        self.inner.lock().hashes.clear();
    }

    /// The highest total difficulty known for the current master peer, if one has been elected.
    pub fn highest_td(&self) -> Option<U256> {
        self.inner.lock().highest_td
    }

    /// Records the total difficulty of the newly elected master peer.
    pub fn set_highest_td(&self, td: U256) {
        self.inner.lock().highest_td = Some(td);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_and_back_preserve_order() {
        let store = HashStore::new();
        store.push_back(B256::repeat_byte(1));
        store.push_back(B256::repeat_byte(2));
        store.push_front(B256::repeat_byte(0));
        assert_eq!(store.pop_front(), Some(B256::repeat_byte(0)));
        assert_eq!(store.pop_front(), Some(B256::repeat_byte(1)));
        assert_eq!(store.pop_front(), Some(B256::repeat_byte(2)));
        assert_eq!(store.pop_front(), None);
    }

    #[test]
    fn clear_preserves_highest_td() {
        let store = HashStore::new();
        store.push_back(B256::repeat_byte(1));
        store.set_highest_td(U256::from(42u64));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.highest_td(), Some(U256::from(42u64)));
    }
}
