// Device-backed audio resources
//
// Each resource owns a playback thread holding the decoder and the cpal
// stream (which cannot leave the thread that created it). The controller
// talks to it through atomics only.

use parking_lot::Mutex;
use rubato::{FftFixedIn, Resampler};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::decoder::TrackDecoder;
use super::output::AudioOutput;
use super::resource::{AudioResource, ResourceFactory, TrackSource};
use crate::error::{AudioError, AudioResult};

const IDLE_POLL: Duration = Duration::from_millis(5);
const WRITE_BACKOFF: Duration = Duration::from_millis(2);

/// Opens tracks relative to an asset directory
pub struct DeviceFactory {
    root: PathBuf,
}

impl DeviceFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

}

impl ResourceFactory for DeviceFactory {
    fn open(&self, source: &TrackSource) -> AudioResult<Box<dyn AudioResource>> {
        let resolved = TrackSource {
            path: self.root.join(&source.path),
            ..source.clone()
        };
        Ok(Box::new(DeviceResource::spawn(resolved)?))
    }
}

#[derive(Default)]
struct Shared {
    playing: AtomicBool,
    ended: AtomicBool,
    rewind: AtomicBool,
    shutdown: AtomicBool,
    volume: Mutex<f32>,
}

pub struct DeviceResource {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceResource {
    /// Start the playback thread and wait until the track and device are open
    pub fn spawn(source: TrackSource) -> AudioResult<Self> {
        let shared = Arc::new(Shared::default());
        let (init_tx, init_rx) = mpsc::sync_channel(1);

        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name("serenade-playback".into())
            .spawn(move || playback_loop(source, thread_shared, init_tx))
            .map_err(|e| AudioError::Backend(format!("Failed to spawn playback thread: {}", e)))?;

        match init_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                shared,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::Backend("Playback thread exited during startup".into()))
            }
        }
    }

    fn ensure_alive(&self) -> AudioResult<()> {
        match &self.thread {
            Some(thread) if !thread.is_finished() => Ok(()),
            _ => Err(AudioError::Backend("Playback thread stopped".into())),
        }
    }
}

impl AudioResource for DeviceResource {
    fn play(&mut self) -> AudioResult<()> {
        self.ensure_alive()?;
        self.shared.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) -> AudioResult<()> {
        self.shared.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        self.shared.playing.store(false, Ordering::SeqCst);
        self.shared.rewind.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn seek_to_start(&mut self) -> AudioResult<()> {
        self.shared.ended.store(false, Ordering::SeqCst);
        self.shared.rewind.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> AudioResult<()> {
        *self.shared.volume.lock() = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn volume(&self) -> f32 {
        *self.shared.volume.lock()
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::SeqCst)
    }

    fn has_ended(&self) -> bool {
        self.shared.ended.load(Ordering::SeqCst)
    }
}

impl Drop for DeviceResource {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn playback_loop(
    source: TrackSource,
    shared: Arc<Shared>,
    init_tx: mpsc::SyncSender<AudioResult<()>>,
) {
    let mut decoder = match TrackDecoder::open(&source.path, source.streaming) {
        Ok(d) => d,
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };
    let output = match AudioOutput::new() {
        Ok(o) => o,
        Err(e) => {
            let _ = init_tx.send(Err(AudioError::Backend(e)));
            return;
        }
    };

    tracing::debug!(
        "Playback thread started for {:?} ({}Hz x{} -> {}Hz x{})",
        source.path,
        decoder.sample_rate(),
        decoder.channels(),
        output.sample_rate(),
        output.channels()
    );

    let mut converter = match FrameConverter::new(
        decoder.sample_rate(),
        decoder.channels(),
        output.sample_rate(),
        output.channels() as usize,
    ) {
        Ok(c) => c,
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };
    let _ = init_tx.send(Ok(()));
    let mut pending: Vec<f32> = Vec::new();
    let mut offset = 0;
    let mut drained = false;

    while !shared.shutdown.load(Ordering::SeqCst) {
        output.set_volume(*shared.volume.lock());

        if shared.rewind.swap(false, Ordering::SeqCst) {
            output.clear();
            pending.clear();
            offset = 0;
            drained = false;
            shared.ended.store(false, Ordering::SeqCst);
            converter.reset();
            if let Err(e) = decoder.rewind() {
                tracing::warn!("Failed to rewind {:?}: {}", source.path, e);
                drained = true;
            }
        }

        let playing = shared.playing.load(Ordering::SeqCst);
        output.set_paused(!playing);
        if !playing {
            thread::sleep(IDLE_POLL);
            continue;
        }

        if offset >= pending.len() {
            if drained {
                if output.buffered() == 0 {
                    shared.playing.store(false, Ordering::SeqCst);
                    shared.ended.store(true, Ordering::SeqCst);
                    tracing::debug!("Track ended: {:?}", source.path);
                }
                thread::sleep(IDLE_POLL);
                continue;
            }

            match decoder.decode_next() {
                Ok(Some(samples)) => match converter.convert(&samples) {
                    Ok(converted) => {
                        pending = converted;
                        offset = 0;
                    }
                    Err(e) => {
                        tracing::warn!("Resampling failed on {:?}: {}", source.path, e);
                        drained = true;
                    }
                },
                Ok(None) if source.looping => {
                    if let Err(e) = decoder.rewind() {
                        tracing::warn!("Failed to loop {:?}: {}", source.path, e);
                        drained = true;
                    }
                }
                Ok(None) => {
                    drained = true;
                    match converter.flush() {
                        Ok(tail) => {
                            pending = tail;
                            offset = 0;
                        }
                        Err(e) => tracing::debug!("Dropping resampler tail: {}", e),
                    }
                }
                Err(e) => {
                    tracing::warn!("Playback error on {:?}: {}", source.path, e);
                    drained = true;
                }
            }
            continue;
        }

        let written = output.write(&pending[offset..]);
        offset += written;
        if written == 0 {
            thread::sleep(WRITE_BACKOFF);
        }
    }

    tracing::debug!("Playback thread finished for {:?}", source.path);
}


const RESAMPLE_CHUNK: usize = 1024;

/// Converts decoded packets to the device format: rubato for the sample
/// rate, then a channel map (mono fans out, extra channels wrap around).
pub struct FrameConverter {
    in_channels: usize,
    out_channels: usize,
    resampler: Option<FftFixedIn<f32>>,
    // Planar input waiting for a full resampler chunk
    queued: Vec<Vec<f32>>,
}

impl FrameConverter {
    pub fn new(
        in_rate: u32,
        in_channels: usize,
        out_rate: u32,
        out_channels: usize,
    ) -> AudioResult<Self> {
        let in_channels = in_channels.max(1);
        let resampler = if in_rate == out_rate {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                in_rate as usize,
                out_rate as usize,
                RESAMPLE_CHUNK,
                2,
                in_channels,
            )
            .map_err(|e| AudioError::Backend(format!("Failed to create resampler: {}", e)))?;
            Some(resampler)
        };

        Ok(Self {
            in_channels,
            out_channels: out_channels.max(1),
            resampler,
            queued: vec![Vec::new(); in_channels],
        })
    }

    /// Forget queued input and resampler history (after a seek)
    pub fn reset(&mut self) {
        for channel in &mut self.queued {
            channel.clear();
        }
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    fn source_channel(&self, out_ch: usize) -> usize {
        if self.in_channels == 1 {
            0
        } else {
            out_ch % self.in_channels
        }
    }

    /// Interleaved decoder samples in, interleaved device samples out
    pub fn convert(&mut self, input: &[f32]) -> AudioResult<Vec<f32>> {
        let in_ch = self.in_channels;
        let frames = input.len() / in_ch;

        let Some(resampler) = self.resampler.as_mut() else {
            let mut out = Vec::with_capacity(frames * self.out_channels);
            for frame in input[..frames * in_ch].chunks_exact(in_ch) {
                for out_ch in 0..self.out_channels {
                    out.push(frame[self.source_channel(out_ch)]);
                }
            }
            return Ok(out);
        };

        for frame in input[..frames * in_ch].chunks_exact(in_ch) {
            for (channel, sample) in self.queued.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }

        let mut planar: Vec<Vec<f32>> = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.queued[0].len() < needed {
                break;
            }
            let chunk: Vec<&[f32]> = self.queued.iter().map(|c| &c[..needed]).collect();
            let resampled = resampler
                .process(chunk.as_slice(), None)
                .map_err(|e| AudioError::Backend(format!("Resampling failed: {}", e)))?;
            for channel in &mut self.queued {
                channel.drain(..needed);
            }
            append_planar(&mut planar, resampled);
        }

        Ok(self.interleave(&planar))
    }

    /// Push whatever input is still queued through the resampler
    pub fn flush(&mut self) -> AudioResult<Vec<f32>> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(Vec::new());
        };
        if self.queued[0].is_empty() {
            return Ok(Vec::new());
        }

        let resampled = resampler
            .process_partial(Some(self.queued.as_slice()), None)
            .map_err(|e| AudioError::Backend(format!("Resampling failed: {}", e)))?;
        for channel in &mut self.queued {
            channel.clear();
        }
        Ok(self.interleave(&resampled))
    }

    fn interleave(&self, planar: &[Vec<f32>]) -> Vec<f32> {
        let frames = planar.first().map_or(0, Vec::len);
        let mut out = Vec::with_capacity(frames * self.out_channels);
        for i in 0..frames {
            for out_ch in 0..self.out_channels {
                out.push(planar[self.source_channel(out_ch)][i]);
            }
        }
        out
    }
}

fn append_planar(into: &mut Vec<Vec<f32>>, from: Vec<Vec<f32>>) {
    if into.is_empty() {
        *into = from;
        return;
    }
    for (channel, more) in into.iter_mut().zip(from) {
        channel.extend(more);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_formats_pass_through() {
        let mut conv = FrameConverter::new(48000, 2, 48000, 2).unwrap();
        let input = vec![0.1, -0.1, 0.2, -0.2];
        assert_eq!(conv.convert(&input).unwrap(), input);
        assert!(conv.flush().unwrap().is_empty());
    }

    #[test]
    fn test_mono_is_duplicated_to_stereo() {
        let mut conv = FrameConverter::new(44100, 1, 44100, 2).unwrap();
        let out = conv.convert(&[0.5, 0.25, 0.5]).unwrap();
        assert_eq!(out, vec![0.5, 0.5, 0.25, 0.25, 0.5, 0.5]);
    }

    #[test]
    fn test_extra_channels_wrap() {
        let mut conv = FrameConverter::new(48000, 2, 48000, 4).unwrap();
        let out = conv.convert(&[0.1, 0.2]).unwrap();
        assert_eq!(out, vec![0.1, 0.2, 0.1, 0.2]);
    }

    #[test]
    fn test_resampled_length_follows_rate() {
        let mut conv = FrameConverter::new(44100, 2, 48000, 2).unwrap();
        let second = vec![0.5f32; 44100 * 2];

        let mut out = Vec::new();
        // Packets of uneven size, as decoders produce them
        for packet in second.chunks(1152 * 2) {
            out.extend(conv.convert(packet).unwrap());
        }
        out.extend(conv.flush().unwrap());

        assert_eq!(out.len() % 2, 0);
        let frames = out.len() / 2;
        assert!((47000..50000).contains(&frames), "got {} frames", frames);

        // A constant signal stays constant once the filter has settled
        let middle = frames / 2;
        assert!((out[middle * 2] - 0.5).abs() < 0.02);
        assert!((out[middle * 2 + 1] - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_reset_discards_queued_input() {
        let mut conv = FrameConverter::new(44100, 1, 48000, 1).unwrap();
        assert!(conv.convert(&[0.5; 100]).unwrap().is_empty());

        conv.reset();
        assert!(conv.flush().unwrap().is_empty());
    }
}
