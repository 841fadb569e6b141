// Serenade - Ambient audio for an interactive greeting page
// Module declarations
pub mod audio;
pub mod commands;
pub mod error;
pub mod preferences;
pub mod settings;
pub mod state;
pub mod testing;
pub mod unlock;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use audio::{ResourceFactory, TokioClock};
use commands::Route;
use preferences::{FileStore, MemoryStore, PreferenceStore};
use settings::AppSettings;
use state::AppState;
use unlock::InputKind;

/// Host configuration resolved from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Holds settings.json and preferences.json
    pub app_dir: PathBuf,
    /// Root that track and clip paths are resolved against
    pub asset_dir: PathBuf,
    pub track: Option<PathBuf>,
    pub looping: bool,
}

/// One line of host input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    HeroEnter,
    HeroLeave,
    Confirm,
    ToggleMusic,
    ToggleSound,
    Tap,
    Input(InputKind),
    Status,
    Quit,
}

impl FromStr for Interaction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim().to_ascii_lowercase();
        Ok(match word.as_str() {
            "hover" => Interaction::HeroEnter,
            "leave" => Interaction::HeroLeave,
            "confirm" => Interaction::Confirm,
            "music" => Interaction::ToggleMusic,
            "sound" => Interaction::ToggleSound,
            "tap" => Interaction::Tap,
            "status" => Interaction::Status,
            "quit" | "exit" => Interaction::Quit,
            other => Interaction::Input(other.parse()?),
        })
    }
}

/// Apply one interaction, returning the line to echo back
pub async fn dispatch(state: &AppState, interaction: Interaction) -> anyhow::Result<String> {
    let reply = match interaction {
        Interaction::HeroEnter => {
            commands::hero_enter(state);
            "ducked to hover".to_string()
        }
        Interaction::HeroLeave => {
            commands::hero_leave(state);
            "back to cruise".to_string()
        }
        Interaction::Confirm => {
            let route = commands::confirm(state).await;
            format!("navigate {}", route)
        }
        Interaction::ToggleMusic => {
            let playing = commands::toggle_music(state);
            format!("music {}", if playing { "playing" } else { "paused" })
        }
        Interaction::ToggleSound => {
            let enabled = commands::toggle_sound(state);
            format!("sound {}", if enabled { "on" } else { "off" })
        }
        Interaction::Tap => {
            commands::tap(state);
            "tap".to_string()
        }
        Interaction::Input(kind) => {
            let listeners = state.input(kind);
            format!("{} ({} listening)", kind, listeners)
        }
        Interaction::Status => serde_json::to_string(&commands::get_status(state))?,
        Interaction::Quit => {
            let route = commands::leave_page(state, Route::Home).await;
            format!("navigate {}", route)
        }
    };
    Ok(reply)
}

#[cfg(feature = "device")]
fn resource_factory(options: &RunOptions) -> Arc<dyn ResourceFactory> {
    Arc::new(audio::device::DeviceFactory::new(&options.asset_dir))
}

#[cfg(not(feature = "device"))]
fn resource_factory(_options: &RunOptions) -> Arc<dyn ResourceFactory> {
    tracing::warn!("Built without the `device` feature, playback is silent");
    Arc::new(audio::NullFactory)
}

/// Build the app state. Unreadable settings or preferences fall back to
/// defaults so the page still gets its audio.
pub fn build_state(options: &RunOptions) -> AppState {
    let mut settings = match AppSettings::load(&options.app_dir) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings from {:?}, using defaults: {}", options.app_dir, e);
            AppSettings::default()
        }
    };
    if let Some(track) = &options.track {
        settings.ambient.track = track.clone();
    }
    if options.looping {
        settings.ambient.looping = true;
    }

    let store: Arc<dyn PreferenceStore> = match FileStore::open(&options.app_dir) {
        Ok(store) => {
            tracing::info!("Preferences at {:?}", store.path());
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!("Failed to open preferences, keeping them in memory: {}", e);
            Arc::new(MemoryStore::new())
        }
    };

    AppState::new(
        settings,
        resource_factory(options),
        Arc::new(TokioClock),
        store,
    )
}

pub async fn run(options: RunOptions) -> anyhow::Result<()> {
    let state = build_state(&options);
    state.mount();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let interaction = match line.parse::<Interaction>() {
            Ok(i) => i,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        println!("{}", dispatch(&state, interaction).await?);
        if interaction == Interaction::Quit {
            break;
        }
    }

    state.dispose().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_parsing() {
        assert_eq!("hover".parse::<Interaction>(), Ok(Interaction::HeroEnter));
        assert_eq!(" Music ".parse::<Interaction>(), Ok(Interaction::ToggleMusic));
        assert_eq!("exit".parse::<Interaction>(), Ok(Interaction::Quit));
        assert_eq!(
            "touch".parse::<Interaction>(),
            Ok(Interaction::Input(InputKind::Touch))
        );
        assert!("dance".parse::<Interaction>().is_err());
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("serenade-run-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn options(app_dir: PathBuf) -> RunOptions {
        RunOptions {
            app_dir,
            asset_dir: PathBuf::from("."),
            track: Some(PathBuf::from("music/other.mp3")),
            looping: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_files_fall_back_to_defaults() {
        let dir = scratch_dir("malformed");
        std::fs::write(AppSettings::settings_path(&dir), "{ not json").unwrap();
        std::fs::write(dir.join("preferences.json"), "[1, 2").unwrap();

        let state = build_state(&options(dir.clone()));

        let mut expected = AppSettings::default();
        expected.ambient.track = PathBuf::from("music/other.mp3");
        expected.ambient.looping = true;
        assert_eq!(state.settings, expected);
        assert!(state.sound.enabled());

        // Startup carries on and the sound toggle still works
        state.mount();
        assert!(!commands::toggle_sound(&state));
        state.dispose().await;

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_valid_files_are_used() {
        let dir = scratch_dir("valid");
        let mut saved = AppSettings::default();
        saved.ambient.base_volume = 0.4;
        saved.save(&dir).unwrap();
        std::fs::write(
            dir.join("preferences.json"),
            r#"{ "serenade-sound-enabled": "false" }"#,
        )
        .unwrap();

        let state = build_state(&options(dir.clone()));

        assert_eq!(state.settings.ambient.base_volume, 0.4);
        assert!(!state.sound.enabled());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
