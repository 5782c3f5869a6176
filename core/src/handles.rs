//! Integer handle table for host objects
//!
//! Guest code cannot hold references to host objects, so every object the
//! bridge hands out is stored here and the guest gets a small integer back.
//! Handle `0` is the null handle and is never allocated.

use serde::{Deserialize, Serialize};

/// Integer surrogate for a host object (0 = null)
pub type Handle = u32;

/// The null handle
pub const NULL_HANDLE: Handle = 0;

/// What happens to a handle after its object is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReusePolicy {
    /// Handles strictly increase and are never handed out twice
    #[default]
    Monotonic,
    /// Released slots go on a free list and are reused
    Recycle,
}

/// Slot-based table mapping handles to objects
///
/// Handle `n` lives in slot `n - 1`.
#[derive(Debug)]
pub struct HandleTable<T> {
    slots: Vec<Option<T>>,
    free: Vec<Handle>,
    live: usize,
    policy: ReusePolicy,
}

impl<T> HandleTable<T> {
    /// Create an empty table that never reuses handles
    pub fn new() -> Self {
        Self::with_policy(ReusePolicy::Monotonic)
    }

    /// Create an empty table with the given reuse policy
    pub fn with_policy(policy: ReusePolicy) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            policy,
        }
    }

    pub fn policy(&self) -> ReusePolicy {
        self.policy
    }

    /// Store an object and return its fresh handle
    pub fn insert(&mut self, object: T) -> Handle {
        self.live += 1;
        if let Some(handle) = self.free.pop() {
            self.slots[(handle - 1) as usize] = Some(object);
            return handle;
        }
        self.slots.push(Some(object));
        self.slots.len() as Handle
    }

    /// Look up an object; null and unknown handles yield `None`
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let index = (handle as usize).checked_sub(1)?;
        self.slots.get(index)?.as_ref()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Release a handle, returning its object
    ///
    /// Under [`ReusePolicy::Recycle`] the handle becomes available to the next
    /// `insert`; under [`ReusePolicy::Monotonic`] it is retired for good.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = (handle as usize).checked_sub(1)?;
        let object = self.slots.get_mut(index)?.take()?;
        self.live -= 1;
        if self.policy == ReusePolicy::Recycle {
            self.free.push(handle);
        }
        Some(object)
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The handle the next `insert` will return
    pub fn next_handle(&self) -> Handle {
        self.free
            .last()
            .copied()
            .unwrap_or(self.slots.len() as Handle + 1)
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_start_at_one() {
        let mut table = HandleTable::new();
        assert_eq!(table.next_handle(), 1);
        assert_eq!(table.insert("buffer"), 1);
        assert_eq!(table.insert("program"), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_null_handle_never_resolves() {
        let mut table = HandleTable::new();
        table.insert(10);
        assert_eq!(table.get(NULL_HANDLE), None);
        assert!(!table.contains(NULL_HANDLE));
    }

    #[test]
    fn test_unknown_handle_resolves_to_none() {
        let mut table = HandleTable::new();
        table.insert(10);
        assert_eq!(table.get(2), None);
        assert_eq!(table.get(u32::MAX), None);
    }

    #[test]
    fn test_monotonic_handles_are_never_reused() {
        let mut table = HandleTable::new();
        let mut seen = Vec::new();
        for i in 0..64 {
            let handle = table.insert(i);
            if i % 3 == 0 {
                assert_eq!(table.remove(handle), Some(i));
            }
            seen.push(handle);
        }
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), seen.len());
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_remove_releases_object() {
        let mut table = HandleTable::new();
        let a = table.insert('a');
        let b = table.insert('b');
        assert_eq!(table.remove(a), Some('a'));
        assert_eq!(table.remove(a), None);
        assert_eq!(table.get(a), None);
        assert_eq!(table.get(b), Some(&'b'));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_recycle_reuses_released_slots() {
        let mut table = HandleTable::with_policy(ReusePolicy::Recycle);
        let a = table.insert(1);
        let b = table.insert(2);
        table.remove(a);
        assert_eq!(table.next_handle(), a);
        assert_eq!(table.insert(3), a);
        assert_eq!(table.get(a), Some(&3));
        assert_eq!(table.get(b), Some(&2));
        assert_eq!(table.insert(4), 3);
    }

    #[test]
    fn test_recycle_live_handles_stay_unique() {
        let mut table = HandleTable::with_policy(ReusePolicy::Recycle);
        let handles: Vec<_> = (0..8).map(|i| table.insert(i)).collect();
        for handle in &handles[2..5] {
            table.remove(*handle);
        }
        let fresh: Vec<_> = (0..3).map(|i| table.insert(100 + i)).collect();
        let mut live: Vec<_> = handles[..2]
            .iter()
            .chain(&handles[5..])
            .chain(&fresh)
            .copied()
            .collect();
        live.sort_unstable();
        live.dedup();
        assert_eq!(live.len(), 8);
        assert_eq!(table.len(), 8);
    }
}
