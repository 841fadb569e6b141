// Test doubles for the playback seam
// MockFactory hands out MockResources that record every call in a shared log

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::resource::{AudioResource, ResourceFactory, TrackSource};
use crate::error::{AudioError, AudioResult};

pub use crate::audio::clock::ManualClock;

#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Opened(PathBuf),
    Play,
    Pause,
    Stop,
    SeekToStart,
    Volume(f32),
    Dropped,
}

#[derive(Debug, Default)]
struct MockState {
    path: PathBuf,
    looping: bool,
    playing: bool,
    ended: bool,
    alive: bool,
    volume: f32,
}

#[derive(Debug, Default)]
struct Shared {
    log: Vec<(usize, MockEvent)>,
    resources: Vec<Arc<Mutex<MockState>>>,
    deny_plays: u32,
    fail_opens: u32,
    /// play() issued while the same resource was already playing
    overlaps: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    shared: Arc<Mutex<Shared>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` calls to `play()` fail with `PlaybackDenied`
    pub fn deny_next_plays(&self, count: u32) {
        self.shared.lock().deny_plays = count;
    }

    /// The next `count` calls to `open()` fail with `Unavailable`
    pub fn fail_next_opens(&self, count: u32) {
        self.shared.lock().fail_opens = count;
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.shared.lock().log.iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn event_count(&self) -> usize {
        self.shared.lock().log.len()
    }

    pub fn opened(&self) -> usize {
        self.shared.lock().resources.len()
    }

    pub fn live_resources(&self) -> usize {
        self.shared
            .lock()
            .resources
            .iter()
            .filter(|state| state.lock().alive)
            .count()
    }

    /// Live resources for `path` that are currently producing sound
    pub fn playing_count(&self, path: &Path) -> usize {
        self.shared
            .lock()
            .resources
            .iter()
            .filter(|state| {
                let state = state.lock();
                state.alive && state.playing && state.path == path
            })
            .count()
    }

    pub fn count(&self, event: &MockEvent) -> usize {
        self.shared.lock().log.iter().filter(|(_, e)| e == event).count()
    }

    pub fn overlaps(&self) -> u32 {
        self.shared.lock().overlaps
    }

    /// Volume of the most recently opened live resource for `path`
    pub fn volume(&self, path: &Path) -> Option<f32> {
        self.shared
            .lock()
            .resources
            .iter()
            .rev()
            .map(|state| state.lock())
            .find(|state| state.alive && state.path == path)
            .map(|state| state.volume)
    }

    /// Let every playing, non-looping resource reach its end
    pub fn finish_tracks(&self) {
        for state in self.shared.lock().resources.iter() {
            let mut state = state.lock();
            if state.alive && state.playing && !state.looping {
                state.playing = false;
                state.ended = true;
            }
        }
    }
}

impl ResourceFactory for MockFactory {
    fn open(&self, source: &TrackSource) -> AudioResult<Box<dyn AudioResource>> {
        let mut shared = self.shared.lock();
        if shared.fail_opens > 0 {
            shared.fail_opens -= 1;
            return Err(AudioError::Unavailable(format!("{:?}", source.path)));
        }

        let id = shared.resources.len();
        let state = Arc::new(Mutex::new(MockState {
            path: source.path.clone(),
            looping: source.looping,
            alive: true,
            volume: 1.0,
            ..MockState::default()
        }));
        shared.resources.push(state.clone());
        shared.log.push((id, MockEvent::Opened(source.path.clone())));

        Ok(Box::new(MockResource {
            id,
            state,
            shared: self.shared.clone(),
        }))
    }
}

pub struct MockResource {
    id: usize,
    state: Arc<Mutex<MockState>>,
    shared: Arc<Mutex<Shared>>,
}

impl MockResource {
    fn record(&self, event: MockEvent) {
        self.shared.lock().log.push((self.id, event));
    }
}

impl AudioResource for MockResource {
    fn play(&mut self) -> AudioResult<()> {
        {
            let mut shared = self.shared.lock();
            if shared.deny_plays > 0 {
                shared.deny_plays -= 1;
                return Err(AudioError::PlaybackDenied);
            }
            if self.state.lock().playing {
                shared.overlaps += 1;
            }
        }
        // Like a real backend, an ended clip stays ended until rewound
        {
            let mut state = self.state.lock();
            state.playing = !state.ended;
        }
        self.record(MockEvent::Play);
        Ok(())
    }

    fn pause(&mut self) -> AudioResult<()> {
        self.state.lock().playing = false;
        self.record(MockEvent::Pause);
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        {
            let mut state = self.state.lock();
            state.playing = false;
            state.ended = false;
        }
        self.record(MockEvent::Stop);
        Ok(())
    }

    fn seek_to_start(&mut self) -> AudioResult<()> {
        self.state.lock().ended = false;
        self.record(MockEvent::SeekToStart);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> AudioResult<()> {
        let volume = volume.clamp(0.0, 1.0);
        self.state.lock().volume = volume;
        self.record(MockEvent::Volume(volume));
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn has_ended(&self) -> bool {
        self.state.lock().ended
    }
}

impl Drop for MockResource {
    fn drop(&mut self) {
        {
            let mut state = self.state.lock();
            state.alive = false;
            state.playing = false;
        }
        self.record(MockEvent::Dropped);
    }
}
