// One-shot sound effects
//
// Independent of the ambient track: each effect owns one lazily opened clip
// which is stopped and restarted on every call, so an effect never overlaps
// itself. Gated by the shared sound toggle.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::resource::{AudioResource, ResourceFactory, TrackSource};
use crate::preferences::SoundToggle;
use crate::settings::EffectSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Tap,
    Switch,
}

impl Effect {
    pub const ALL: [Effect; 2] = [Effect::Tap, Effect::Switch];

    pub fn default_volume(self) -> f32 {
        match self {
            Effect::Tap => 0.18,
            Effect::Switch => 0.15,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Tap => f.write_str("tap"),
            Effect::Switch => f.write_str("switch"),
        }
    }
}

pub struct EffectPlayer {
    clips: EffectSettings,
    factory: Arc<dyn ResourceFactory>,
    sound: SoundToggle,
    loaded: HashMap<Effect, Box<dyn AudioResource>>,
    unlocked: bool,
}

impl EffectPlayer {
    pub fn new(clips: EffectSettings, factory: Arc<dyn ResourceFactory>, sound: SoundToggle) -> Self {
        Self {
            clips,
            factory,
            sound,
            loaded: HashMap::new(),
            unlocked: false,
        }
    }

    /// Restart `effect` from the top. Silent when sound is off.
    pub fn play(&mut self, effect: Effect) {
        self.unlock();
        if !self.sound.enabled() {
            return;
        }

        let volume = self.clips.clip(effect).volume;
        let Some(clip) = self.clip_mut(effect) else {
            return;
        };
        if let Err(e) = clip.stop() {
            tracing::debug!("Failed to stop {} effect: {}", effect, e);
        }
        if let Err(e) = clip.set_volume(volume) {
            tracing::debug!("Failed to set {} effect volume: {}", effect, e);
        }
        if let Err(e) = clip.play() {
            tracing::debug!("Failed to play {} effect: {}", effect, e);
        }
    }

    /// Play and immediately stop every clip at zero volume, once
    pub fn unlock(&mut self) {
        if self.unlocked {
            return;
        }
        self.unlocked = true;

        for effect in Effect::ALL {
            let volume = self.clips.clip(effect).volume;
            if let Some(clip) = self.clip_mut(effect) {
                let unlocked = clip
                    .set_volume(0.0)
                    .and_then(|_| clip.play())
                    .and_then(|_| clip.stop());
                if let Err(e) = unlocked {
                    tracing::debug!("Failed to unlock {} effect: {}", effect, e);
                }
                if let Err(e) = clip.set_volume(volume) {
                    tracing::debug!("Failed to restore {} effect volume: {}", effect, e);
                }
            }
        }
        tracing::debug!("Sound effects unlocked");
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn sound(&self) -> &SoundToggle {
        &self.sound
    }

    fn clip_mut(&mut self, effect: Effect) -> Option<&mut Box<dyn AudioResource>> {
        let source = TrackSource::new(&self.clips.clip(effect).path);
        match self.loaded.entry(effect) {
            Entry::Occupied(entry) => Some(entry.into_mut()),
            Entry::Vacant(entry) => match self.factory.open(&source) {
                Ok(clip) => Some(entry.insert(clip)),
                Err(e) => {
                    // Not cached, so the next call tries again
                    tracing::warn!("Failed to load {} effect: {}", effect, e);
                    None
                }
            },
        }
    }
}
