//! Keyboard input: key map and the guest event queue
//!
//! Host key events are filtered through a [`KeyMap`] and queued as short
//! strings: `"K<name>"` for a press and `"k<name>"` for a release. The guest
//! pulls them one at a time through the `fetch_event` import.

use std::collections::VecDeque;
use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::marshal::encode_into;

/// Whether a key went down or up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    #[serde(alias = "pressed")]
    Down,
    #[serde(alias = "released")]
    Up,
}

impl KeyState {
    fn prefix(self) -> char {
        match self {
            KeyState::Down => 'K',
            KeyState::Up => 'k',
        }
    }
}

/// A logical key event as delivered to the guest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub state: KeyState,
    pub name: String,
}

impl KeyEvent {
    pub fn new(state: KeyState, name: impl Into<String>) -> Self {
        Self {
            state,
            name: name.into(),
        }
    }

    /// Parse the wire form (`"KUP"`, `"kSPACE"`)
    pub fn parse(encoded: &str) -> Option<Self> {
        let mut chars = encoded.chars();
        let state = match chars.next()? {
            'K' => KeyState::Down,
            'k' => KeyState::Up,
            _ => return None,
        };
        let name = chars.as_str();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(state, name))
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.state.prefix(), self.name)
    }
}

/// Physical key code (DOM `KeyboardEvent.code` naming) to logical key name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMap {
    bindings: HashMap<String, String>,
}

impl KeyMap {
    /// An empty map; every key is ignored
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Bind a physical key code to a logical name, replacing any old binding
    pub fn bind(&mut self, code: impl Into<String>, name: impl Into<String>) {
        self.bindings.insert(code.into(), name.into());
    }

    pub fn unbind(&mut self, code: &str) -> Option<String> {
        self.bindings.remove(code)
    }

    /// Logical name for a physical key, if mapped
    pub fn resolve(&self, code: &str) -> Option<&str> {
        self.bindings.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        let mut map = Self::empty();
        for (code, name) in [
            ("ArrowDown", "DOWN"),
            ("ArrowLeft", "LEFT"),
            ("ArrowRight", "RIGHT"),
            ("ArrowUp", "UP"),
            ("KeyA", "a"),
            ("KeyC", "c"),
            ("KeyD", "d"),
            ("KeyS", "s"),
            ("KeyW", "w"),
            ("Space", "SPACE"),
        ] {
            map.bind(code, name);
        }
        map
    }
}

/// FIFO of encoded key events waiting for the guest
///
/// Pulls are budgeted per tick: after `max_per_tick` events have been fetched,
/// further pulls report "no event" until [`EventQueue::begin_tick`] is called.
/// A budget of 0 means unlimited.
#[derive(Debug, Clone)]
pub struct EventQueue {
    pending: VecDeque<String>,
    max_per_tick: u32,
    fetched_this_tick: u32,
}

/// Returned by `fetch_event` when nothing was delivered
pub const NO_EVENT: u32 = 0;

impl EventQueue {
    pub fn new(max_per_tick: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            max_per_tick,
            fetched_this_tick: 0,
        }
    }

    /// Queue a host key event if the key map knows it
    ///
    /// Returns `false` for unmapped keys, which are dropped.
    pub fn push_key(&mut self, keymap: &KeyMap, code: &str, state: KeyState) -> bool {
        let Some(name) = keymap.resolve(code) else {
            tracing::trace!(code, ?state, "Ignoring unmapped key");
            return false;
        };
        self.push(KeyEvent::new(state, name));
        true
    }

    pub fn push(&mut self, event: KeyEvent) {
        self.pending.push_back(event.to_string());
    }

    /// Remove the oldest event, ignoring the tick budget
    pub fn pop(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn max_per_tick(&self) -> u32 {
        self.max_per_tick
    }

    /// Reset the per-tick pull budget
    pub fn begin_tick(&mut self) {
        self.fetched_this_tick = 0;
    }

    /// Deliver the next event into `dst`
    ///
    /// Returns the number of bytes written, or [`NO_EVENT`] when the queue is
    /// empty or this tick's budget is spent. An event that does not fit is
    /// truncated on a character boundary and still consumed. When not even
    /// one character fits, the event stays queued and no budget is spent.
    pub fn fetch_into(&mut self, dst: &mut [u8]) -> u32 {
        if self.max_per_tick != 0 && self.fetched_this_tick >= self.max_per_tick {
            return NO_EVENT;
        }
        let Some(event) = self.pending.front() else {
            return NO_EVENT;
        };

        let written = encode_into(event, dst);
        if written == 0 {
            tracing::debug!(event = %event, "Guest buffer too small, keeping event");
            return NO_EVENT;
        }
        if written < event.len() {
            tracing::debug!(
                event = %event,
                capacity = dst.len(),
                "Event truncated to fit guest buffer"
            );
        }
        self.pending.pop_front();
        self.fetched_this_tick += 1;
        written as u32
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_event_wire_form() {
        assert_eq!(KeyEvent::new(KeyState::Down, "UP").to_string(), "KUP");
        assert_eq!(KeyEvent::new(KeyState::Up, "SPACE").to_string(), "kSPACE");
        assert_eq!(
            KeyEvent::parse("kLEFT"),
            Some(KeyEvent::new(KeyState::Up, "LEFT"))
        );
        assert_eq!(KeyEvent::parse("K"), None);
        assert_eq!(KeyEvent::parse("xUP"), None);
        assert_eq!(KeyEvent::parse(""), None);
    }

    #[test]
    fn test_default_keymap() {
        let map = KeyMap::default();
        assert_eq!(map.len(), 10);
        assert_eq!(map.resolve("Space"), Some("SPACE"));
        assert_eq!(map.resolve("ArrowUp"), Some("UP"));
        assert_eq!(map.resolve("KeyW"), Some("w"));
        assert_eq!(map.resolve("KeyQ"), None);
    }

    #[test]
    fn test_unmapped_keys_are_ignored() {
        let map = KeyMap::default();
        let mut queue = EventQueue::new(0);
        assert!(!queue.push_key(&map, "Escape", KeyState::Down));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_space_press_is_queued() {
        let map = KeyMap::default();
        let mut queue = EventQueue::default();
        assert!(queue.push_key(&map, "Space", KeyState::Down));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().as_deref(), Some("KSPACE"));
    }

    #[test]
    fn test_empty_queue_yields_sentinel() {
        let mut queue = EventQueue::default();
        let mut buf = [0u8; 16];
        assert_eq!(queue.fetch_into(&mut buf), NO_EVENT);
    }

    #[test]
    fn test_fifo_order() {
        let map = KeyMap::default();
        let mut queue = EventQueue::new(0);
        queue.push_key(&map, "ArrowUp", KeyState::Down);
        queue.push_key(&map, "ArrowUp", KeyState::Up);

        let mut buf = [0u8; 16];
        let n = queue.fetch_into(&mut buf) as usize;
        assert_eq!(&buf[..n], b"KUP");
        let n = queue.fetch_into(&mut buf) as usize;
        assert_eq!(&buf[..n], b"kUP");
        assert!(queue.is_empty());
        assert_eq!(queue.fetch_into(&mut buf), NO_EVENT);
    }

    #[test]
    fn test_per_tick_budget() {
        let map = KeyMap::default();
        let mut queue = EventQueue::new(1);
        queue.push_key(&map, "KeyA", KeyState::Down);
        queue.push_key(&map, "KeyA", KeyState::Up);

        let mut buf = [0u8; 8];
        queue.begin_tick();
        assert_eq!(queue.fetch_into(&mut buf), 2);
        assert_eq!(queue.fetch_into(&mut buf), NO_EVENT);
        assert_eq!(queue.len(), 1);

        queue.begin_tick();
        assert_eq!(queue.fetch_into(&mut buf), 2);
        assert_eq!(&buf[..2], b"ka");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_small_buffer_truncates_and_consumes() {
        let mut queue = EventQueue::new(0);
        queue.push(KeyEvent::new(KeyState::Down, "SPACE"));
        let mut buf = [0u8; 3];
        assert_eq!(queue.fetch_into(&mut buf), 3);
        assert_eq!(&buf, b"KSP");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_empty_buffer_keeps_event() {
        let mut queue = EventQueue::new(1);
        queue.push(KeyEvent::new(KeyState::Down, "UP"));
        queue.begin_tick();

        assert_eq!(queue.fetch_into(&mut []), NO_EVENT);
        assert_eq!(queue.len(), 1);

        // The failed pull did not spend this tick's budget
        let mut buf = [0u8; 8];
        assert_eq!(queue.fetch_into(&mut buf), 3);
        assert_eq!(&buf[..3], b"KUP");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_keymap_serde_roundtrip() {
        let mut map = KeyMap::empty();
        map.bind("KeyJ", "jump");
        let text = toml::to_string(&map).unwrap();
        let back: KeyMap = toml::from_str(&text).unwrap();
        assert_eq!(back.resolve("KeyJ"), Some("jump"));
    }
}
