//! Audio decoding utilities
//!
//! **Purpose:** Decode an uploaded artifact to mono f32 PCM for feature
//! extraction.
//!
//! Uses symphonia for format-agnostic decoding (WAV, FLAC, MP3, OGG, ...).
//! Multi-channel audio is downmixed by averaging channels.

use crate::error::ExtractionError;
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Decoded audio result
#[derive(Debug)]
pub struct DecodedAudio {
    /// Mono audio samples (f32, range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
    /// Duration in seconds
    pub duration_seconds: f64,
}

/// Decode audio file to mono f32 PCM samples
///
/// **Algorithm:**
/// 1. Open file and probe format using symphonia
/// 2. Find default audio track
/// 3. Decode all packets of that track (corrupt packets are skipped)
/// 4. Average channels to mono
///
/// # Errors
/// * `ExtractionError::Open` - file missing or unreadable
/// * `ExtractionError::Decode` - unsupported or corrupt container/codec
/// * `ExtractionError::EmptySignal` - no samples decoded
pub fn decode_audio_file(file_path: &Path) -> Result<DecodedAudio, ExtractionError> {
    tracing::debug!(path = %file_path.display(), "Decoding audio file");

    let file = std::fs::File::open(file_path).map_err(|source| ExtractionError::Open {
        path: file_path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create format hint from file extension
    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| ExtractionError::Decode(format!("unrecognized audio format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ExtractionError::Decode("no audio track found".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channel_count = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ExtractionError::Decode(format!("unsupported codec: {}", e)))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of stream
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(ExtractionError::Decode(format!("error reading packet: {}", e)));
            }
        };

        // Skip packets from other tracks
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channel_count.get_or_insert(spec.channels.count());
                all_samples.extend(convert_to_mono_f32(&decoded));
            }
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(path = %file_path.display(), error = %e, "Skipping corrupt packet");
            }
            Err(e) => {
                return Err(ExtractionError::Decode(format!("failed to decode packet: {}", e)));
            }
        }
    }

    if all_samples.is_empty() {
        return Err(ExtractionError::EmptySignal);
    }

    let sample_rate = match sample_rate {
        Some(rate) if rate > 0 => rate,
        other => return Err(ExtractionError::InvalidSampleRate(other.unwrap_or(0))),
    };
    let duration_seconds = all_samples.len() as f64 / sample_rate as f64;

    tracing::debug!(
        path = %file_path.display(),
        sample_rate,
        channels = channel_count.unwrap_or(1),
        total_samples = all_samples.len(),
        duration_seconds = format!("{:.2}", duration_seconds),
        "Audio decoding complete"
    );

    Ok(DecodedAudio {
        samples: all_samples,
        sample_rate,
        channels: channel_count.unwrap_or(1),
        duration_seconds,
    })
}

/// Downmix interleaved multi-channel samples to mono (arithmetic mean)
///
/// A trailing partial frame is dropped.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Convert a decoded buffer of any sample format to mono f32
fn convert_to_mono_f32(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => planar_to_mono(buf),
        AudioBufferRef::F64(buf) => planar_to_mono(buf),
        AudioBufferRef::U8(buf) => planar_to_mono(buf),
        AudioBufferRef::U16(buf) => planar_to_mono(buf),
        AudioBufferRef::U24(buf) => planar_to_mono(buf),
        AudioBufferRef::U32(buf) => planar_to_mono(buf),
        AudioBufferRef::S8(buf) => planar_to_mono(buf),
        AudioBufferRef::S16(buf) => planar_to_mono(buf),
        AudioBufferRef::S24(buf) => planar_to_mono(buf),
        AudioBufferRef::S32(buf) => planar_to_mono(buf),
    }
}

fn planar_to_mono<S: Sample>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    f32: FromSample<S>,
{
    let num_channels = buf.spec().channels.count().max(1);
    let num_frames = buf.frames();
    let mut interleaved = Vec::with_capacity(num_frames * num_channels);

    for frame_idx in 0..num_frames {
        for ch in 0..num_channels {
            interleaved.push(f32::from_sample(buf.chan(ch)[frame_idx]));
        }
    }

    downmix_to_mono(&interleaved, num_channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, channels: u16, frames: &[Vec<i16>]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &sample in frame {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_audio_file_not_found() {
        let result = decode_audio_file(Path::new("/nonexistent/file.wav"));
        assert!(matches!(result, Err(ExtractionError::Open { .. })));
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        assert!(matches!(decode_audio_file(&path), Err(ExtractionError::Decode(_))));
    }

    #[test]
    fn test_decode_stereo_is_downmixed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stereo.wav");
        let frames: Vec<Vec<i16>> = (0..800).map(|_| vec![16384, 0]).collect();
        write_wav(&path, 2, &frames);

        let decoded = decode_audio_file(&path).unwrap();
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.samples.len(), 800);
        // (0.5 + 0.0) / 2
        assert!((decoded.samples[10] - 0.25).abs() < 1e-3);
        assert!((decoded.duration_seconds - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_decode_empty_wav_is_empty_signal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.wav");
        write_wav(&path, 1, &[]);

        assert!(matches!(
            decode_audio_file(&path),
            Err(ExtractionError::EmptySignal) | Err(ExtractionError::Decode(_))
        ));
    }

    #[test]
    fn test_downmix_to_mono() {
        let interleaved = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix_to_mono(&interleaved, 2), vec![0.5, 0.5, 0.0]);
        assert_eq!(downmix_to_mono(&interleaved, 1), interleaved.to_vec());
        // Trailing partial frame dropped
        assert_eq!(downmix_to_mono(&[0.5, 0.5, 0.5, 0.9], 3), vec![0.5]);
    }
}
