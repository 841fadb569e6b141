// Ambient track controller
//
// Owns the single background track, its target duck level, the volume fade
// in flight and the timers that drive delayed transitions. Callers only ask
// for transitions; backend failures are logged and swallowed here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::clock::Clock;
use super::fade::Fade;
use super::resource::{AudioResource, ResourceFactory, TrackSource};
use super::scheduler::Scheduler;
use crate::error::AudioError;
use crate::settings::AmbientSettings;

/// Named volume presets, as fractions of the base volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuckLevel {
    #[default]
    Cruise,
    Hover,
    Click,
    Silent,
}

impl DuckLevel {
    pub const ALL: [DuckLevel; 4] = [
        DuckLevel::Cruise,
        DuckLevel::Hover,
        DuckLevel::Click,
        DuckLevel::Silent,
    ];

    pub fn factor(self) -> f32 {
        match self {
            DuckLevel::Cruise => 1.0,
            DuckLevel::Hover => 0.6,
            DuckLevel::Click => 0.32,
            DuckLevel::Silent => 0.0,
        }
    }

    /// Output level for this preset given the base volume
    pub fn volume(self, base: f32) -> f32 {
        (base * self.factor()).clamp(0.0, 1.0)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DuckLevel::Cruise => "cruise",
            DuckLevel::Hover => "hover",
            DuckLevel::Click => "click",
            DuckLevel::Silent => "silent",
        }
    }
}

impl fmt::Display for DuckLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuckLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DuckLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown duck level: {}", s))
    }
}

/// What `start()` managed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyPlaying,
    /// The environment refused playback; retry after a user gesture
    Blocked,
    /// The track could not be opened or played
    Unavailable,
}

impl StartOutcome {
    pub fn is_playing(self) -> bool {
        matches!(self, StartOutcome::Started | StartOutcome::AlreadyPlaying)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    /// Fade from the bootstrap level up to the duck target over the duration
    RiseToTarget(Duration),
    StopAfterFade,
    ReleaseAfterFade,
}

impl Task {
    fn is_rise(&self) -> bool {
        matches!(self, Task::RiseToTarget(_))
    }

    fn is_close(&self) -> bool {
        matches!(self, Task::StopAfterFade | Task::ReleaseAfterFade)
    }
}

/// Snapshot for rendering a play/pause glyph
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmbientStatus {
    pub playing: bool,
    pub duck_level: DuckLevel,
    pub volume: f32,
    pub autoplay_unlocked: bool,
}

pub struct AmbientController {
    settings: AmbientSettings,
    source: TrackSource,
    factory: Arc<dyn ResourceFactory>,
    clock: Arc<dyn Clock>,
    resource: Option<Box<dyn AudioResource>>,
    current_volume: f32,
    duck_level: DuckLevel,
    fade: Option<Fade>,
    tasks: Scheduler<Task>,
    playing: bool,
    /// Fading towards a scheduled stop or release
    closing: bool,
    ended_naturally: bool,
    autoplay_unlocked: bool,
}

impl AmbientController {
    pub fn new(
        settings: AmbientSettings,
        factory: Arc<dyn ResourceFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let source = settings.source();
        Self {
            settings,
            source,
            factory,
            clock,
            resource: None,
            current_volume: 0.0,
            duck_level: DuckLevel::default(),
            fade: None,
            tasks: Scheduler::new(),
            playing: false,
            closing: false,
            ended_naturally: false,
            autoplay_unlocked: false,
        }
    }

    /// Start the track at the bootstrap level and schedule the rise to the
    /// duck target. No-op while playing; cancels a fade-out in progress.
    pub fn start(&mut self) -> StartOutcome {
        if self.playing {
            if !self.closing {
                return StartOutcome::AlreadyPlaying;
            }
            self.tasks.cancel_where(Task::is_close);
            self.closing = false;
            self.fade_to(self.target_volume(), self.settings.fade_up());
            tracing::debug!("Fade-out cancelled, rising back to {}", self.duck_level);
            return StartOutcome::Started;
        }
        self.begin_transport(self.settings.fade_up())
    }

    /// Set the target level. While playing, retarget from the live volume.
    pub fn duck(&mut self, level: DuckLevel) {
        self.duck_level = level;
        if !self.playing || self.closing {
            return;
        }
        let duration = match level {
            DuckLevel::Silent => self.settings.silent_duck(),
            _ => self.settings.duck(),
        };
        self.fade_to(level.volume(self.settings.base_volume), duration);
        tracing::debug!("Ducking to {} over {:?}", level, duration);
    }

    /// Pause when playing, resume otherwise. Returns whether the track plays afterwards.
    pub fn toggle_pause(&mut self) -> bool {
        if self.playing {
            let release_pending = self.abandon_tasks();
            if let Some(resource) = self.resource.as_mut() {
                if let Err(e) = resource.pause() {
                    tracing::warn!("Failed to pause ambient track: {}", e);
                }
            }
            self.playing = false;
            self.closing = false;
            tracing::debug!("Ambient track paused");
            if release_pending {
                self.release();
            }
            return false;
        }

        self.begin_transport(self.settings.resume_fade_up())
            .is_playing()
    }

    /// Fade to silence over `duration`, then stop transport
    pub fn fade_out(&mut self, duration: Duration) {
        self.tasks.cancel_where(Task::is_rise);
        if !self.playing {
            // Nothing audible, so the level can drop at once
            self.fade = None;
            self.tasks.cancel_where(|task| *task == Task::StopAfterFade);
            self.write_volume(0.0);
            if let Some(resource) = self.resource.as_mut() {
                if let Err(e) = resource.stop() {
                    tracing::warn!("Failed to stop ambient track: {}", e);
                }
            }
            return;
        }

        let release = self
            .tasks
            .take_where(Task::is_close)
            .iter()
            .any(|(_, task)| *task == Task::ReleaseAfterFade);
        self.closing = true;
        self.fade_to(0.0, duration);
        let due = self.clock.now() + duration;
        let task = if release {
            Task::ReleaseAfterFade
        } else {
            Task::StopAfterFade
        };
        self.tasks.schedule(due, task);
        tracing::debug!("Fading out over {:?}", duration);
    }

    /// Halt at once, without a fade
    pub fn stop(&mut self) {
        let release_pending = self.abandon_tasks();
        self.halt();
        if release_pending {
            self.release();
        }
    }

    /// Drop the resource and every pending timer. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.fade = None;
        self.tasks.clear();
        if let Some(mut resource) = self.resource.take() {
            if let Err(e) = resource.stop() {
                tracing::debug!("Stop during release failed: {}", e);
            }
            tracing::info!("Ambient track released");
        }
        self.playing = false;
        self.closing = false;
        self.ended_naturally = false;
        self.current_volume = 0.0;
    }

    /// Unmount path: fade to silence, then release
    pub fn teardown(&mut self) {
        self.tasks.cancel_where(Task::is_rise);
        if !self.playing {
            self.release();
            return;
        }

        if self.closing {
            // Keep the fade in flight, release where it would have stopped
            let due = self
                .tasks
                .take_where(Task::is_close)
                .into_iter()
                .map(|(due, _)| due)
                .min()
                .unwrap_or_else(|| self.clock.now());
            self.tasks.schedule(due, Task::ReleaseAfterFade);
        } else {
            let duration = self.settings.teardown_fade();
            self.closing = true;
            self.fade_to(0.0, duration);
            self.tasks
                .schedule(self.clock.now() + duration, Task::ReleaseAfterFade);
        }
        tracing::debug!("Ambient teardown scheduled");
    }

    /// Advance the fade, notice a natural end of track and fire due timers
    pub fn tick(&mut self) {
        let now = self.clock.now();
        self.sync_transport();

        if let Some(fade) = self.fade {
            self.write_volume(fade.value_at(now));
            if fade.is_complete(now) {
                self.fade = None;
            }
        }

        while let Some((_, task)) = self.tasks.pop_due(now) {
            match task {
                Task::RiseToTarget(duration) => {
                    if self.playing && !self.closing {
                        self.fade_to(self.target_volume(), duration);
                    }
                }
                Task::StopAfterFade => {
                    self.write_volume(0.0);
                    self.halt();
                }
                Task::ReleaseAfterFade => self.release(),
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn duck_level(&self) -> DuckLevel {
        self.duck_level
    }

    /// Live output level
    pub fn current_volume(&self) -> f32 {
        self.current_volume
    }

    /// Level the current duck preset resolves to
    pub fn target_volume(&self) -> f32 {
        self.duck_level.volume(self.settings.base_volume)
    }

    pub fn autoplay_unlocked(&self) -> bool {
        self.autoplay_unlocked
    }

    pub fn ended_naturally(&self) -> bool {
        self.ended_naturally
    }

    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn pending_rises(&self) -> usize {
        self.tasks.count_where(Task::is_rise)
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Released with nothing left to run
    pub fn is_quiet(&self) -> bool {
        self.resource.is_none() && self.tasks.is_empty() && self.fade.is_none()
    }

    pub fn status(&self) -> AmbientStatus {
        AmbientStatus {
            playing: self.playing,
            duck_level: self.duck_level,
            volume: self.current_volume,
            autoplay_unlocked: self.autoplay_unlocked,
        }
    }

    fn begin_transport(&mut self, rise: Duration) -> StartOutcome {
        if !self.ensure_resource() {
            return StartOutcome::Unavailable;
        }
        // A track that played out stays at its end until rewound
        if self.ended_naturally && !self.source.looping {
            if let Some(resource) = self.resource.as_mut() {
                if let Err(e) = resource.seek_to_start() {
                    tracing::warn!("Failed to rewind ambient track: {}", e);
                }
            }
            self.ended_naturally = false;
        }
        self.fade = None;
        self.tasks.cancel_where(Task::is_rise);
        self.write_volume(self.settings.bootstrap_volume);

        let result = match self.resource.as_mut() {
            Some(resource) => resource.play(),
            None => return StartOutcome::Unavailable,
        };
        match result {
            Ok(()) => {}
            Err(AudioError::PlaybackDenied) => {
                tracing::debug!("Ambient playback blocked until user input");
                return StartOutcome::Blocked;
            }
            Err(e @ AudioError::Unavailable(_)) => {
                tracing::warn!("Ambient track unavailable: {}", e);
                self.resource = None;
                return StartOutcome::Unavailable;
            }
            Err(e) => {
                tracing::warn!("Failed to start ambient track: {}", e);
                return StartOutcome::Unavailable;
            }
        }

        self.playing = true;
        self.closing = false;
        self.ended_naturally = false;
        self.autoplay_unlocked = true;
        let due = self.clock.now() + self.settings.fade_up_delay();
        self.tasks.schedule(due, Task::RiseToTarget(rise));
        tracing::info!("Ambient track playing at bootstrap volume");
        StartOutcome::Started
    }

    fn ensure_resource(&mut self) -> bool {
        if self.resource.is_some() {
            return true;
        }
        match self.factory.open(&self.source) {
            Ok(resource) => {
                tracing::debug!("Opened ambient track {:?}", self.source.path);
                self.resource = Some(resource);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to open ambient track {:?}: {}", self.source.path, e);
                false
            }
        }
    }

    /// Replace any fade in flight with one starting from the live level
    fn fade_to(&mut self, target: f32, duration: Duration) {
        let now = self.clock.now();
        let from = match self.fade {
            Some(fade) => fade.value_at(now),
            None => self.current_volume,
        };
        self.write_volume(from);
        if duration.is_zero() {
            self.fade = None;
            self.write_volume(target);
        } else {
            self.fade = Some(Fade::new(from, target, now, duration));
        }
    }

    fn write_volume(&mut self, volume: f32) {
        self.current_volume = volume.clamp(0.0, 1.0);
        if let Some(resource) = self.resource.as_mut() {
            if let Err(e) = resource.set_volume(self.current_volume) {
                tracing::debug!("Failed to set ambient volume: {}", e);
            }
        }
    }

    fn halt(&mut self) {
        self.fade = None;
        if let Some(resource) = self.resource.as_mut() {
            if let Err(e) = resource.stop() {
                tracing::warn!("Failed to stop ambient track: {}", e);
            }
        }
        self.playing = false;
        self.closing = false;
    }

    /// Drop the fade and every timer. Returns whether a release was pending.
    fn abandon_tasks(&mut self) -> bool {
        self.fade = None;
        let release_pending = self
            .tasks
            .count_where(|task| *task == Task::ReleaseAfterFade)
            > 0;
        self.tasks.clear();
        release_pending
    }

    fn sync_transport(&mut self) {
        let ended = self.playing
            && self
                .resource
                .as_ref()
                .is_some_and(|resource| resource.has_ended());
        if !ended {
            return;
        }

        let release_pending = self.abandon_tasks();
        self.playing = false;
        self.closing = false;
        self.ended_naturally = true;
        tracing::info!("Ambient track reached its end");
        if release_pending {
            self.release();
        }
    }
}
