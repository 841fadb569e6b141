// Playback backend seam
//
// The controller and the effect player only talk to these traits. Backends:
// `NullFactory` (silent, always succeeds), `testing::MockFactory`, and the
// cpal/symphonia device backend behind the `device` feature.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::AudioResult;

/// Where a clip comes from and how it should be played
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSource {
    pub path: PathBuf,
    /// Restart from the top at end of stream
    pub looping: bool,
    /// Start playing before the asset is fully loaded
    pub streaming: bool,
}

impl TrackSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            looping: false,
            streaming: false,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

/// One playable, seekable clip
pub trait AudioResource: Send {
    /// Begin or continue transport
    fn play(&mut self) -> AudioResult<()>;

    /// Halt transport, keeping the position
    fn pause(&mut self) -> AudioResult<()>;

    /// Halt transport and rewind
    fn stop(&mut self) -> AudioResult<()>;

    fn seek_to_start(&mut self) -> AudioResult<()>;

    /// Output level in [0, 1]
    fn set_volume(&mut self, volume: f32) -> AudioResult<()>;

    fn volume(&self) -> f32;

    fn is_playing(&self) -> bool;

    /// True once a non-looping clip has reached its end
    fn has_ended(&self) -> bool;
}

/// Opens resources on demand
pub trait ResourceFactory: Send + Sync {
    fn open(&self, source: &TrackSource) -> AudioResult<Box<dyn AudioResource>>;
}

/// Resource that accepts every call and produces no sound
#[derive(Debug, Default)]
pub struct NullResource {
    volume: f32,
    playing: bool,
}

impl AudioResource for NullResource {
    fn play(&mut self) -> AudioResult<()> {
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> AudioResult<()> {
        self.playing = false;
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        self.playing = false;
        Ok(())
    }

    fn seek_to_start(&mut self) -> AudioResult<()> {
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> AudioResult<()> {
        self.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn has_ended(&self) -> bool {
        false
    }
}

/// Factory for hosts without an output device
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFactory;

impl ResourceFactory for NullFactory {
    fn open(&self, _source: &TrackSource) -> AudioResult<Box<dyn AudioResource>> {
        Ok(Box::new(NullResource::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_source_builder() {
        let source = TrackSource::new("music/confess.mp3")
            .looping(true)
            .streaming(true);

        assert_eq!(source.path, PathBuf::from("music/confess.mp3"));
        assert!(source.looping);
        assert!(source.streaming);
    }

    #[test]
    fn test_null_resource_transport() {
        let mut resource = NullFactory.open(&TrackSource::new("x.wav")).unwrap();
        assert!(!resource.is_playing());

        resource.play().unwrap();
        resource.set_volume(2.0).unwrap();
        assert!(resource.is_playing());
        assert_eq!(resource.volume(), 1.0);

        resource.stop().unwrap();
        assert!(!resource.is_playing());
        assert!(!resource.has_ended());
    }
}
