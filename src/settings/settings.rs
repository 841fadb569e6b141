// Settings management and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::effects::Effect;
use crate::audio::resource::TrackSource;
use crate::error::SettingsError;

/// Ambient track and its timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientSettings {
    pub track: PathBuf,
    pub looping: bool,
    pub streaming: bool,
    pub base_volume: f32,      // cruising level, 0.0-1.0
    pub bootstrap_volume: f32, // level the track starts at before rising
    pub fade_up_delay_ms: u64,
    pub fade_up_ms: u64,
    pub resume_fade_up_ms: u64,
    pub duck_ms: u64,
    pub silent_duck_ms: u64,
    pub fade_out_ms: u64,
    pub teardown_fade_ms: u64,
    pub navigation_grace_ms: u64,
    pub cta_grace_ms: u64,
}

impl Default for AmbientSettings {
    fn default() -> Self {
        Self {
            track: PathBuf::from("music/confess.mp3"),
            looping: false,
            streaming: true,
            base_volume: 0.25,
            bootstrap_volume: 0.06,
            fade_up_delay_ms: 3000,
            fade_up_ms: 2000,
            resume_fade_up_ms: 1500,
            duck_ms: 600,
            silent_duck_ms: 1500,
            fade_out_ms: 1500,
            teardown_fade_ms: 1500,
            navigation_grace_ms: 1500,
            cta_grace_ms: 200,
        }
    }
}

impl AmbientSettings {
    pub fn source(&self) -> TrackSource {
        TrackSource::new(&self.track)
            .looping(self.looping)
            .streaming(self.streaming)
    }

    pub fn fade_up_delay(&self) -> Duration {
        Duration::from_millis(self.fade_up_delay_ms)
    }

    pub fn fade_up(&self) -> Duration {
        Duration::from_millis(self.fade_up_ms)
    }

    pub fn resume_fade_up(&self) -> Duration {
        Duration::from_millis(self.resume_fade_up_ms)
    }

    pub fn duck(&self) -> Duration {
        Duration::from_millis(self.duck_ms)
    }

    pub fn silent_duck(&self) -> Duration {
        Duration::from_millis(self.silent_duck_ms)
    }

    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }

    pub fn teardown_fade(&self) -> Duration {
        Duration::from_millis(self.teardown_fade_ms)
    }

    pub fn navigation_grace(&self) -> Duration {
        Duration::from_millis(self.navigation_grace_ms)
    }

    pub fn cta_grace(&self) -> Duration {
        Duration::from_millis(self.cta_grace_ms)
    }
}

/// A short sound effect clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectClip {
    pub path: PathBuf,
    pub volume: f32,
}

/// Sound effect clips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    pub tap: EffectClip,
    pub switch: EffectClip,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            tap: EffectClip {
                path: PathBuf::from("sounds/tap.wav"),
                volume: Effect::Tap.default_volume(),
            },
            switch: EffectClip {
                path: PathBuf::from("sounds/switch.wav"),
                volume: Effect::Switch.default_volume(),
            },
        }
    }
}

impl EffectSettings {
    pub fn clip(&self, effect: Effect) -> &EffectClip {
        match effect {
            Effect::Tap => &self.tap,
            Effect::Switch => &self.switch,
        }
    }
}

/// Frame driver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    pub frame_interval_ms: u64, // ~60 fps by default
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
        }
    }
}

impl DriverSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

/// Main application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub version: i32, // Settings schema version for future migrations
    pub ambient: AmbientSettings,
    pub effects: EffectSettings,
    pub driver: DriverSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: 1,
            ambient: AmbientSettings::default(),
            effects: EffectSettings::default(),
            driver: DriverSettings::default(),
        }
    }
}

impl AppSettings {
    /// Get the settings file path
    pub fn settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join("settings.json")
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(app_dir: &Path) -> Result<Self, SettingsError> {
        let path = Self::settings_path(app_dir);

        if !path.exists() {
            tracing::info!("No settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let settings: AppSettings = serde_json::from_str(&content)?;

        tracing::info!("Loaded settings from {:?}", path);
        Ok(settings.normalized())
    }

    /// Save settings to file
    pub fn save(&self, app_dir: &Path) -> Result<(), SettingsError> {
        // Ensure directory exists
        fs::create_dir_all(app_dir)?;

        let path = Self::settings_path(app_dir);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;

        tracing::info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Clamp every volume into [0, 1]
    pub fn normalized(mut self) -> Self {
        let ambient = &mut self.ambient;
        ambient.base_volume = ambient.base_volume.clamp(0.0, 1.0);
        ambient.bootstrap_volume = ambient.bootstrap_volume.clamp(0.0, 1.0);
        for clip in [&mut self.effects.tap, &mut self.effects.switch] {
            clip.volume = clip.volume.clamp(0.0, 1.0);
        }
        self
    }
}
