// Application state management
use parking_lot::Mutex;
use std::sync::Arc;

use crate::audio::{
    AmbientController, AmbientHandle, Clock, EffectPlayer, FrameDriver, ResourceFactory,
    StartOutcome,
};
use crate::preferences::{PreferenceStore, SoundToggle};
use crate::settings::AppSettings;
use crate::unlock::{arm_unlock, InputBus, InputKind, UnlockGuard};

/// Inputs that count as a real gesture for sound effects
const EFFECT_GESTURES: [InputKind; 3] = [InputKind::Click, InputKind::Touch, InputKind::Key];

pub struct AppState {
    pub settings: AppSettings,
    pub ambient: AmbientHandle,
    pub effects: Arc<Mutex<EffectPlayer>>,
    pub sound: SoundToggle,
    pub inputs: InputBus,
    unlocks: Mutex<Vec<UnlockGuard>>,
    driver: Mutex<Option<FrameDriver>>,
}

impl AppState {
    pub fn new(
        settings: AppSettings,
        factory: Arc<dyn ResourceFactory>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn PreferenceStore>,
    ) -> Self {
        let sound = SoundToggle::load(store);
        let ambient = AmbientHandle::new(AmbientController::new(
            settings.ambient.clone(),
            factory.clone(),
            clock,
        ));
        let effects = EffectPlayer::new(settings.effects.clone(), factory, sound.clone());

        Self {
            settings,
            ambient,
            effects: Arc::new(Mutex::new(effects)),
            sound,
            inputs: InputBus::new(),
            unlocks: Mutex::new(Vec::new()),
            driver: Mutex::new(None),
        }
    }

    /// Page mount: start the frame driver and ambient playback, and arm
    /// the unlock paths. Must be called from within a tokio runtime.
    pub fn mount(&self) -> StartOutcome {
        let mut driver = self.driver.lock();
        if driver.is_none() {
            *driver = Some(self.ambient.spawn_driver(self.settings.driver.frame_interval()));
        }
        drop(driver);

        let (outcome, ambient_unlock) = self.ambient.start_with_unlock(&self.inputs);
        tracing::info!("Ambient start on mount: {:?}", outcome);

        let mut unlocks = self.unlocks.lock();
        unlocks.retain(|guard| !guard.is_finished());
        unlocks.extend(ambient_unlock);

        if !self.effects.lock().is_unlocked() {
            let effects = self.effects.clone();
            unlocks.push(arm_unlock(
                self.inputs.listen(),
                EFFECT_GESTURES.to_vec(),
                move |_| effects.lock().unlock(),
            ));
        }

        outcome
    }

    /// Publish a host input event
    pub fn input(&self, kind: InputKind) -> usize {
        self.inputs.emit(kind)
    }

    pub fn is_mounted(&self) -> bool {
        self.driver.lock().is_some()
    }

    /// Page unmount: disarm pending unlocks and fade the track out for good
    pub async fn dispose(&self) {
        self.unlocks.lock().clear();

        let driver = self.driver.lock().take();
        let driver =
            driver.unwrap_or_else(|| self.ambient.spawn_driver(self.settings.driver.frame_interval()));
        self.ambient.shutdown(driver).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::TokioClock;
    use crate::preferences::MemoryStore;
    use crate::testing::MockFactory;
    use std::path::Path;
    use std::time::Duration;

    fn app(factory: &MockFactory) -> AppState {
        AppState::new(
            AppSettings::default(),
            Arc::new(factory.clone()),
            Arc::new(TokioClock),
            Arc::new(MemoryStore::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_starts_ambient() {
        let factory = MockFactory::new();
        let state = app(&factory);

        assert_eq!(state.mount(), StartOutcome::Started);
        assert!(state.is_mounted());
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!((state.ambient.status().volume - 0.25).abs() < 1e-4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_gesture_unlocks_effects() {
        let factory = MockFactory::new();
        let state = app(&factory);
        state.mount();

        // Pointer movement is not a gesture for effects
        state.input(InputKind::PointerMove);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!state.effects.lock().is_unlocked());

        state.input(InputKind::Touch);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(state.effects.lock().is_unlocked());
        assert_eq!(factory.volume(Path::new("sounds/tap.wav")), Some(0.18));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_mount_recovers_on_click() {
        let factory = MockFactory::new();
        factory.deny_next_plays(1);
        let state = app(&factory);

        assert_eq!(state.mount(), StartOutcome::Blocked);
        state.input(InputKind::Click);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(state.ambient.is_playing());
        assert!(state.ambient.status().autoplay_unlocked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_disarms_and_releases() {
        let factory = MockFactory::new();
        factory.deny_next_plays(1);
        let state = app(&factory);
        state.mount();
        assert!(state.inputs.listener_count() > 0);

        state.dispose().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(state.inputs.listener_count(), 0);
        assert!(!state.is_mounted());
        assert_eq!(factory.live_resources(), 0);

        // A late gesture starts nothing
        state.input(InputKind::Click);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!state.ambient.is_playing());
    }
}
