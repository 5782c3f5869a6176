//! Scripted key input for headless runs
//!
//! ```toml
//! [[event]]
//! frame = 10
//! code = "Space"
//! state = "down"
//!
//! [[event]]
//! frame = 14
//! code = "Space"
//! state = "up"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use glbridge_core::KeyState;
use serde::Deserialize;

/// One key event injected before a given refresh
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptedKey {
    pub frame: u64,
    /// Physical key code, e.g. `ArrowUp` or `KeyW`
    pub code: String,
    pub state: KeyState,
}

/// Parsed input script
#[derive(Debug, Default, Deserialize)]
pub struct InputScript {
    #[serde(default, rename = "event")]
    pub events: Vec<ScriptedKey>,
}

impl InputScript {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid input script")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input script {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("In {}", path.display()))
    }

    /// Group events by frame, keeping file order within a frame
    pub fn into_schedule(self) -> BTreeMap<u64, Vec<ScriptedKey>> {
        let mut schedule: BTreeMap<u64, Vec<ScriptedKey>> = BTreeMap::new();
        for event in self.events {
            schedule.entry(event.frame).or_default().push(event);
        }
        schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script = InputScript::parse(
            r#"
[[event]]
frame = 3
code = "ArrowUp"
state = "down"

[[event]]
frame = 1
code = "Space"
state = "pressed"

[[event]]
frame = 3
code = "KeyW"
state = "up"
"#,
        )
        .unwrap();
        assert_eq!(script.events.len(), 3);
        assert_eq!(script.events[1].state, KeyState::Down);

        let schedule = script.into_schedule();
        assert_eq!(schedule.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        let codes: Vec<_> = schedule[&3].iter().map(|key| key.code.as_str()).collect();
        assert_eq!(codes, vec!["ArrowUp", "KeyW"]);
    }

    #[test]
    fn test_empty_script() {
        let script = InputScript::parse("").unwrap();
        assert!(script.events.is_empty());
    }

    #[test]
    fn test_bad_state_rejected() {
        let result = InputScript::parse(
            "[[event]]\nframe = 0\ncode = \"Space\"\nstate = \"sideways\"\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.toml");
        std::fs::write(&path, "[[event]]\nframe = 2\ncode = \"KeyA\"\nstate = \"down\"\n").unwrap();

        let script = InputScript::load(&path).unwrap();
        assert_eq!(
            script.events,
            vec![ScriptedKey {
                frame: 2,
                code: "KeyA".into(),
                state: KeyState::Down
            }]
        );
    }
}
