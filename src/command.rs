//! The command vocabulary accepted by the daemon.
//!
//! Commands arrive as JSON (see [`ipc`](crate::ipc)).  Presets can be
//! addressed by position, identifier or name through [`PresetSelector`].

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// How a command refers to a preset.
///
/// On the wire a JSON number is an index into the ordered preset list, a
/// string that parses as a UUID is a preset id, and any other string is a
/// preset name.
///
/// A `Name` that is itself a valid UUID string serializes as that string
/// and therefore parses back as `Id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PresetSelector {
    Index(usize),
    Id(Uuid),
    Name(String),
}

impl fmt::Display for PresetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetSelector::Index(i) => write!(f, "#{}", i),
            PresetSelector::Id(id) => write!(f, "{}", id),
            PresetSelector::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

impl<'de> Deserialize<'de> for PresetSelector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = PresetSelector;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "preset index, id or name")
            }
            fn visit_u64<E>(self, n: u64) -> Result<PresetSelector, E> {
                Ok(PresetSelector::Index(n as usize))
            }
            fn visit_i64<E>(self, n: i64) -> Result<PresetSelector, E>
            where
                E: DeError,
            {
                usize::try_from(n)
                    .map(PresetSelector::Index)
                    .map_err(|_| DeError::custom(format!("preset index must be non-negative, got {}", n)))
            }
            fn visit_str<E>(self, s: &str) -> Result<PresetSelector, E>
            where
                E: DeError,
            {
                let s = s.trim();
                if s.is_empty() {
                    return Err(DeError::custom("empty preset name"));
                }
                Ok(match Uuid::parse_str(s) {
                    Ok(id) => PresetSelector::Id(id),
                    Err(_) => PresetSelector::Name(s.to_string()),
                })
            }
        }
        deserializer.deserialize_any(V)
    }
}

/// Every action the daemon can perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Capture the windows of `apps` (bundle identifiers) into a new preset
    /// called `name`.  With `main_only`, only each app's main window is
    /// taken.  An empty capture saves nothing.
    Capture {
        name: String,
        apps: Vec<String>,
        #[serde(default)]
        launch_items: Vec<String>,
        #[serde(default)]
        main_only: bool,
    },

    /// Restore a preset.  Runs in the background; completion is reported
    /// as an event.
    Apply(PresetSelector),

    Delete(PresetSelector),

    Rename { preset: PresetSelector, name: String },

    /// Move the preset at index `from` to index `to`.
    Reorder { from: usize, to: usize },

    /// Append the current windows of running app `app` to a preset.
    AddWindow { preset: PresetSelector, app: String },

    RemoveWindow { preset: PresetSelector, window: Uuid },

    /// Add a URL or path.  The input is normalized first.
    AddLaunchItem { preset: PresetSelector, path: String },

    RemoveLaunchItem { preset: PresetSelector, item: Uuid },

    /// Overwrite a preset's stored geometry with where its windows are now.
    RefreshPositions(PresetSelector),

    /// Rebuild the running-application list.
    ///
    /// On the wire this is the JSON string `"RefreshApps"`.
    RefreshApps,
}
