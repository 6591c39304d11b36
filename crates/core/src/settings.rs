use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::logger::Level;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: Paths,
    pub target: Target,
    pub detection: Detection,
    pub input: InputSettings,
    pub buttons: BTreeMap<String, ButtonSettings>,
    pub log_level: Level,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub buttons_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub tesseract: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    /// Case-insensitive regex on the owning process image path.
    pub process_pattern: String,
    /// Case-insensitive regex on the window title.
    pub title_pattern: String,
    pub launch_command: String,
    pub startup_wait_secs: f64,
    pub focus_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Detection {
    pub confidence: f32,
    /// Downscale factor for the coarse template-matching pass; 1 disables it.
    pub coarse_scale: u32,
    pub ocr_lang: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    pub move_steps: u32,
    pub move_delay: (f64, f64),
    pub wiggle_iterations: u32,
    pub wiggle_min_offset: (i32, i32),
    pub wiggle_max_offset: (i32, i32),
    pub wiggle_delay: (f64, f64),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonSettings {
    /// Template file name inside `buttons_dir`; `<name>.png` when unset.
    pub file: Option<String>,
    pub offset: (i32, i32),
    pub confidence: Option<f32>,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            buttons_dir: PathBuf::from("buttons"),
            logs_dir: PathBuf::from("logs"),
            tesseract: PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe"),
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self {
            process_pattern: "roblox".into(),
            title_pattern: "roblox".into(),
            launch_command: "RobloxPlayerBeta.exe".into(),
            startup_wait_secs: 5.0,
            focus_delay_ms: 50,
        }
    }
}

impl Default for Detection {
    fn default() -> Self {
        Self { confidence: 0.8, coarse_scale: 4, ocr_lang: "eng".into() }
    }
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            move_steps: 3,
            move_delay: (0.0012, 0.0015),
            wiggle_iterations: 2,
            wiggle_min_offset: (-2, -1),
            wiggle_max_offset: (2, 1),
            wiggle_delay: (0.015, 0.019),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut buttons = BTreeMap::new();
        for name in ["fight", "ranked", "refresh", "reconnect", "enter_dungeon", "leave_dungeon"] {
            buttons.insert(name.to_string(), ButtonSettings::default());
        }
        // Click 15px above center
        if let Some(ranked) = buttons.get_mut("ranked") {
            ranked.offset = (0, -15);
        }
        if let Some(reconnect) = buttons.get_mut("reconnect") {
            reconnect.confidence = Some(0.9);
        }

        Self {
            paths: Paths::default(),
            target: Target::default(),
            detection: Detection::default(),
            input: InputSettings::default(),
            buttons,
            log_level: Level::Info,
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing file gives the defaults; a file
    /// that does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn button(&self, name: &str) -> Option<&ButtonSettings> {
        self.buttons.get(name)
    }

    /// Path of the reference bitmap for `name`.
    pub fn template_path(&self, name: &str) -> PathBuf {
        let file = self
            .buttons
            .get(name)
            .and_then(|b| b.file.clone())
            .unwrap_or_else(|| format!("{}.png", name));
        self.paths.buttons_dir.join(file)
    }

    /// Reject configurations the bot cannot run with. `used` are the button
    /// names the selected routine clicks.
    pub fn validate<'a>(&self, used: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for name in used {
            if !self.buttons.contains_key(name) {
                bail!("unknown button '{}' (add it under \"buttons\")", name);
            }
        }
        if !(0.0..=1.0).contains(&self.detection.confidence) {
            bail!("detection.confidence must be within [0, 1], got {}", self.detection.confidence);
        }
        for (name, b) in &self.buttons {
            if let Some(c) = b.confidence {
                if !(0.0..=1.0).contains(&c) {
                    bail!("buttons.{}.confidence must be within [0, 1], got {}", name, c);
                }
            }
        }
        if self.detection.coarse_scale == 0 {
            bail!("detection.coarse_scale must be at least 1");
        }
        let i = &self.input;
        if i.wiggle_min_offset.0 > i.wiggle_max_offset.0 || i.wiggle_min_offset.1 > i.wiggle_max_offset.1 {
            bail!("input.wiggle_min_offset must not exceed input.wiggle_max_offset");
        }
        if i.move_delay.0 < 0.0 || i.move_delay.1 < 0.0 || i.wiggle_delay.0 < 0.0 || i.wiggle_delay.1 < 0.0 {
            bail!("input delays must not be negative");
        }
        if self.target.startup_wait_secs < 0.0 {
            bail!("target.startup_wait_secs must not be negative");
        }
        Ok(())
    }
}
