// Audio output using cpal
// Feeds the default output device from a ring buffer, applying the live
// volume in the device callback so fades take effect without buffering lag.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::{HeapRb, traits::{Consumer, Observer, Producer, Split}};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const RING_BUFFER_SIZE: usize = 48000 * 2 / 4; // ~250ms of stereo audio at 48kHz

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// Flags shared with the device callback
struct CallbackState {
    consumer: Mutex<RingConsumer>,
    volume: Mutex<f32>,
    paused: AtomicBool,
    clear: AtomicBool,
}

/// Not `Send`: create and keep it on the playback thread
pub struct AudioOutput {
    _stream: Stream,
    producer: Mutex<RingProducer>,
    state: Arc<CallbackState>,
    sample_rate: u32,
    channels: u16,
}

impl AudioOutput {
    /// Open the default output device
    pub fn new() -> Result<Self, String> {
        let host = cpal::default_host();

        let device = host.default_output_device()
            .ok_or("No output device available")?;

        let config = device.default_output_config()
            .map_err(|e| format!("Failed to get default output config: {}", e))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        let rb = HeapRb::<f32>::new(RING_BUFFER_SIZE);
        let (producer, consumer) = rb.split();

        let state = Arc::new(CallbackState {
            consumer: Mutex::new(consumer),
            volume: Mutex::new(0.0),
            paused: AtomicBool::new(true),
            clear: AtomicBool::new(false),
        });

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config.into(), state.clone())?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config.into(), state.clone())?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config.into(), state.clone())?,
            format => return Err(format!("Unsupported sample format: {:?}", format)),
        };

        stream.play().map_err(|e| format!("Failed to start stream: {}", e))?;

        Ok(Self {
            _stream: stream,
            producer: Mutex::new(producer),
            state,
            sample_rate,
            channels,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        state: Arc<CallbackState>,
    ) -> Result<Stream, String> {
        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut consumer = state.consumer.lock();

                if state.clear.swap(false, Ordering::SeqCst) {
                    while consumer.try_pop().is_some() {}
                }

                // Paused: hold the buffered samples and output silence
                if state.paused.load(Ordering::SeqCst) {
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0);
                    }
                    return;
                }

                let vol = *state.volume.lock();
                for sample in data.iter_mut() {
                    let value = consumer.try_pop().unwrap_or(0.0) * vol;
                    *sample = T::from_sample(value);
                }
            },
            move |err| {
                tracing::warn!("Audio output error: {}", err);
            },
            None,
        ).map_err(|e| format!("Failed to build output stream: {}", e))?;

        Ok(stream)
    }

    /// Write samples to the output buffer.
    /// Returns the number of samples actually written.
    pub fn write(&self, samples: &[f32]) -> usize {
        let mut producer = self.producer.lock();
        let mut written = 0;

        for &sample in samples {
            if producer.try_push(sample).is_err() {
                break;
            }
            written += 1;
        }

        written
    }

    /// Samples queued but not yet played
    pub fn buffered(&self) -> usize {
        self.producer.lock().occupied_len()
    }

    /// Drop everything queued (on stop or rewind)
    pub fn clear(&self) {
        self.state.clear.store(true, Ordering::SeqCst);
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.paused.store(paused, Ordering::SeqCst);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Set the output volume (0.0 to 1.0)
    pub fn set_volume(&self, vol: f32) {
        *self.state.volume.lock() = vol.clamp(0.0, 1.0);
    }
}
