//! Audio decoding with Symphonia
//!
//! Turns an uploaded payload into an [`AudioClip`]. Decoding is all or
//! nothing: a packet that fails to decode, or a stream that ends before
//! its declared frame count, fails the whole clip. The engine never plays
//! a silently truncated track.

use std::io::{Cursor, ErrorKind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::engine::clip::{file_extension, AudioClip, TrackSlot};
use crate::error::DecodeError;

type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Decoder bound to one track slot's byte ceiling
#[derive(Debug, Clone, Copy)]
pub struct AudioDecoder {
    slot: TrackSlot,
    max_bytes: usize,
}

impl AudioDecoder {
    /// Decoder enforcing the standard upload ceiling for `slot`
    pub fn for_slot(slot: TrackSlot) -> Self {
        Self {
            slot,
            max_bytes: slot.max_upload_bytes(),
        }
    }

    /// Decoder with a custom byte ceiling
    pub fn with_limit(slot: TrackSlot, max_bytes: usize) -> Self {
        Self { slot, max_bytes }
    }

    /// Decode a complete payload into a clip
    ///
    /// `filename` is only used as a container hint; the content itself
    /// decides whether decoding succeeds.
    ///
    /// # Errors
    /// * `TooLarge` - payload exceeds this decoder's byte ceiling
    /// * `Unsupported` - the container or codec is unknown, the data is
    ///   corrupt or truncated, there are more than two channels, or no
    ///   audio was found
    pub fn decode(&self, raw_bytes: Vec<u8>, filename: &str) -> DecodeResult<AudioClip> {
        if raw_bytes.len() > self.max_bytes {
            return Err(DecodeError::TooLarge {
                slot: self.slot,
                size: raw_bytes.len(),
                limit: self.max_bytes,
            });
        }

        let raw: Arc<[u8]> = raw_bytes.into();
        let buffer = decode_buffer(Arc::clone(&raw), filename)?;

        debug!(
            "[DECODER] Track {} '{}': {} ch, {} Hz, {:.3}s",
            self.slot,
            filename,
            buffer.channels(),
            buffer.sample_rate,
            buffer.duration_secs()
        );

        Ok(AudioClip::new(filename, raw, buffer))
    }

    /// Decode on a worker thread and hand the outcome to `on_done`
    ///
    /// The caller is never blocked; completion is signalled only through
    /// the callback.
    pub fn decode_async<F>(
        self,
        raw_bytes: Vec<u8>,
        filename: String,
        on_done: F,
    ) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce(DecodeResult<AudioClip>) + Send + 'static,
    {
        thread::Builder::new()
            .name(format!("phantom-decode-{}", self.slot))
            .spawn(move || on_done(self.decode(raw_bytes, &filename)))
    }
}

fn unsupported(context: &str, err: SymphoniaError) -> DecodeError {
    DecodeError::Unsupported {
        reason: format!("{}: {}", context, err),
        source: Some(err),
    }
}

/// Run the full probe/decode loop over an in-memory payload
fn decode_buffer(raw: Arc<[u8]>, filename: &str) -> DecodeResult<AudioBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(raw)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = file_extension(filename) {
        hint.with_extension(&ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unsupported("failed to probe format", e))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::unsupported("no audio track found"))?;

    let track_id = track.id;
    let expected_frames = track.codec_params.n_frames;
    if let Some(count) = track.codec_params.channels.map(|c| c.count()) {
        check_channels(count)?;
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| unsupported("failed to create decoder", e))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut stream_spec = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(unsupported("failed to read packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| unsupported("failed to decode packet", e))?;

        let spec = *decoded.spec();
        match stream_spec {
            None => {
                check_channels(spec.channels.count())?;
                stream_spec = Some(spec);
            }
            Some(first) if first != spec => {
                return Err(DecodeError::unsupported(
                    "stream changes format mid-way (channels or sample rate)",
                ));
            }
            Some(_) => {}
        }

        let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(samples.samples());
    }

    let spec = stream_spec.ok_or_else(|| DecodeError::unsupported("no audio frames decoded"))?;
    let layout = check_channels(spec.channels.count())?;

    if interleaved.is_empty() {
        return Err(DecodeError::unsupported("no audio frames decoded"));
    }

    // A stream that ends before its declared length is truncated
    let decoded_frames = (interleaved.len() / layout.num_channels()) as u64;
    if let Some(expected) = expected_frames {
        if decoded_frames < expected {
            return Err(DecodeError::unsupported(format!(
                "truncated stream: {} of {} frames present",
                decoded_frames, expected
            )));
        }
    }

    AudioBuffer::from_interleaved(&interleaved, layout, spec.rate)
}

fn check_channels(count: usize) -> DecodeResult<ChannelLayout> {
    ChannelLayout::from_count(count).ok_or_else(|| {
        DecodeError::unsupported(format!(
            "{}-channel audio (only mono/stereo supported)",
            count
        ))
    })
}

// ============================================================================
// Tests
// ============================================================================
