use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::dispatch::Cue;

/// Per-cue sound configuration. `sound` is an opaque payload (the
/// front-end uploads it; typically a data URL) handed back verbatim in
/// `PlayCue` events. No payload means the cue is skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CueSetting {
    pub enabled: bool,
    pub sound: Option<String>,
}

impl Default for CueSetting {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub default_focus_minutes: u32,
    pub default_break_minutes: u32,
    pub master_sound_enabled: bool,
    pub focus_start: CueSetting,
    pub focus_end: CueSetting,
    pub break_start: CueSetting,
    pub break_end: CueSetting,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            default_focus_minutes: 25,
            default_break_minutes: 5,
            master_sound_enabled: true,
            focus_start: CueSetting::default(),
            focus_end: CueSetting::default(),
            break_start: CueSetting::default(),
            break_end: CueSetting::default(),
        }
    }
}

impl UserSettings {
    pub fn cue(&self, cue: Cue) -> &CueSetting {
        match cue {
            Cue::FocusStart => &self.focus_start,
            Cue::FocusEnd => &self.focus_end,
            Cue::BreakStart => &self.break_start,
            Cue::BreakEnd => &self.break_end,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn snapshot(&self) -> UserSettings {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, apply: impl FnOnce(&mut UserSettings)) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        apply(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }
}
