// Page interaction commands
//
// What the greeting page's components invoke: hero hover, the call to
// action, the music and sound toggles, and navigation away.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::audio::{DuckLevel, Effect};
use crate::state::AppState;

/// Pages the greeting flow can move to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Home,
    Letter,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => f.write_str("/"),
            Route::Letter => f.write_str("/letter"),
        }
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('/') {
            "" | "home" => Ok(Route::Home),
            "letter" => Ok(Route::Letter),
            other => Err(format!("unknown route: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub playing: bool,
    pub duck_level: DuckLevel,
    pub volume: f32,
    pub sound_enabled: bool,
}

// ===== Hero Commands =====

pub fn hero_enter(state: &AppState) {
    state.ambient.duck(DuckLevel::Hover);
}

pub fn hero_leave(state: &AppState) {
    state.ambient.duck(DuckLevel::Cruise);
}

/// Call to action: click feedback, duck under it, then move on to the letter
pub async fn confirm(state: &AppState) -> Route {
    state.effects.lock().play(Effect::Switch);
    state.ambient.duck(DuckLevel::Click);
    tokio::time::sleep(state.settings.ambient.cta_grace()).await;
    Route::Letter
}

// ===== Toggle Commands =====

/// Returns whether the ambient track plays afterwards
pub fn toggle_music(state: &AppState) -> bool {
    state.effects.lock().play(Effect::Switch);
    state.ambient.toggle_pause()
}

/// Returns whether sound effects are enabled afterwards
pub fn toggle_sound(state: &AppState) -> bool {
    // Played before the flip, so turning sound off still clicks
    state.effects.lock().play(Effect::Switch);
    state.sound.toggle()
}

pub fn tap(state: &AppState) {
    state.effects.lock().play(Effect::Tap);
}

// ===== Navigation Commands =====

/// Fade the ambient track out and wait out the grace period before navigating
pub async fn leave_page(state: &AppState, to: Route) -> Route {
    let ambient = &state.settings.ambient;
    state
        .ambient
        .leave(ambient.fade_out(), ambient.navigation_grace())
        .await;
    tracing::info!("Navigating to {}", to);
    to
}

pub fn get_status(state: &AppState) -> PlaybackStatus {
    let ambient = state.ambient.status();
    PlaybackStatus {
        playing: ambient.playing,
        duck_level: ambient.duck_level,
        volume: ambient.volume,
        sound_enabled: state.sound.enabled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::TokioClock;
    use crate::preferences::{MemoryStore, PreferenceStore, SOUND_ENABLED_KEY};
    use crate::settings::AppSettings;
    use crate::testing::MockFactory;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    fn mounted(factory: &MockFactory, store: Arc<MemoryStore>) -> AppState {
        let state = AppState::new(
            AppSettings::default(),
            Arc::new(factory.clone()),
            Arc::new(TokioClock),
            store,
        );
        state.mount();
        state
    }

    async fn settle(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_hover_ducks_and_restores() {
        let factory = MockFactory::new();
        let state = mounted(&factory, Arc::new(MemoryStore::new()));
        settle(6).await;

        hero_enter(&state);
        settle(2).await;
        assert!((get_status(&state).volume - 0.15).abs() < 1e-4);
        assert_eq!(get_status(&state).duck_level, DuckLevel::Hover);

        hero_leave(&state);
        settle(2).await;
        assert!((get_status(&state).volume - 0.25).abs() < 1e-4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_clicks_ducks_and_routes() {
        let factory = MockFactory::new();
        let state = mounted(&factory, Arc::new(MemoryStore::new()));
        settle(6).await;

        let route = confirm(&state).await;

        assert_eq!(route, Route::Letter);
        assert_eq!(get_status(&state).duck_level, DuckLevel::Click);
        assert_eq!(factory.playing_count(Path::new("sounds/switch.wav")), 1);
        // Ducking is still under way after the short grace
        let volume = get_status(&state).volume;
        assert!(volume < 0.25 && volume > 0.08);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_music_pauses_and_resumes() {
        let factory = MockFactory::new();
        let state = mounted(&factory, Arc::new(MemoryStore::new()));
        settle(6).await;

        assert!(!toggle_music(&state));
        assert!(!get_status(&state).playing);

        assert!(toggle_music(&state));
        assert!(get_status(&state).playing);
        assert!((get_status(&state).volume - 0.06).abs() < 1e-4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_sound_persists_and_silences_effects() {
        let factory = MockFactory::new();
        let store = Arc::new(MemoryStore::new());
        let state = mounted(&factory, store.clone());

        assert!(!toggle_sound(&state));
        assert_eq!(store.get(SOUND_ENABLED_KEY).as_deref(), Some("false"));
        assert!(!get_status(&state).sound_enabled);

        let plays = factory.count(&crate::testing::MockEvent::Play);
        tap(&state);
        assert_eq!(factory.count(&crate::testing::MockEvent::Play), plays);

        // The ambient track is unaffected
        assert!(get_status(&state).playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_page_fades_before_navigating() {
        let factory = MockFactory::new();
        let state = mounted(&factory, Arc::new(MemoryStore::new()));
        settle(6).await;

        let route = leave_page(&state, Route::Home).await;

        assert_eq!(route, Route::Home);
        let status = get_status(&state);
        assert!(!status.playing);
        assert_eq!(status.volume, 0.0);
    }

    #[test]
    fn test_route_parsing() {
        assert_eq!("/letter".parse::<Route>(), Ok(Route::Letter));
        assert_eq!("/".parse::<Route>(), Ok(Route::Home));
        assert_eq!(Route::Letter.to_string(), "/letter");
        assert!("/admin".parse::<Route>().is_err());
    }
}
