// Track decoder using Symphonia
// Decodes an audio file to interleaved f32 PCM, one packet at a time

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::error::AudioError;

pub struct TrackDecoder {
    path: PathBuf,
    streaming: bool,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
}

impl TrackDecoder {
    /// Open a track. Streaming tracks are read from disk as they play;
    /// anything else is loaded into memory up front.
    pub fn open(path: &Path, streaming: bool) -> Result<Self, AudioError> {
        let unavailable = |e: &dyn std::fmt::Display| {
            AudioError::Unavailable(format!("{}: {}", path.display(), e))
        };

        let mut file = File::open(path).map_err(|e| unavailable(&e))?;
        let media: Box<dyn MediaSource> = if streaming {
            Box::new(file)
        } else {
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes).map_err(|e| unavailable(&e))?;
            Box::new(Cursor::new(bytes))
        };
        let mss = MediaSourceStream::new(media, Default::default());

        // Create a hint using the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let detected = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| unavailable(&e))?;
        let format = detected.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| unavailable(&"no audio track found"))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| unavailable(&e))?;

        Ok(Self {
            path: path.to_path_buf(),
            streaming,
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Next packet as interleaved samples, `None` at end of stream
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, AudioError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(AudioError::Backend(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                    buf.copy_interleaved_ref(decoded);
                    return Ok(Some(buf.samples().to_vec()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!("Decode error (skipping): {}", e);
                    continue;
                }
                Err(e) => return Err(AudioError::Backend(format!("Decode failed: {}", e))),
            }
        }
    }

    /// Back to the first sample. Reopens the file when the format cannot seek.
    pub fn rewind(&mut self) -> Result<(), AudioError> {
        let seeked = self.format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: Time::new(0, 0.0),
                track_id: Some(self.track_id),
            },
        );
        match seeked {
            Ok(_) => {
                self.decoder.reset();
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Seek failed ({}), reopening {:?}", e, self.path);
                *self = Self::open(&self.path.clone(), self.streaming)?;
                Ok(())
            }
        }
    }
}
