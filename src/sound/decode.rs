// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_codecs;
use symphonia::default::get_probe;

use super::DecodeError;

/// A fully decoded audio file: interleaved f32 samples at the file's native rate.
pub(super) struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channel_count: u16,
    pub sample_rate: u32,
}

/// Decodes an entire audio file (WAV, MP3, FLAC, and anything else symphonia
/// supports) into interleaved f32 samples.
pub(super) fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path).map_err(|e| {
        DecodeError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint to help the format registry guess the format
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    // Probe the format
    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let file_path = path.to_string_lossy().to_string();
    let probed = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| DecodeError::DecodeFailed(format!("'{}': {}", file_path, e)))?;

    let mut format_reader = probed.format;

    // Find the first audio track
    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::DecodeFailed("No audio track found".to_string()))?;

    let track_id = track.id;
    let params = &track.codec_params;

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| DecodeError::DecodeFailed("Sample rate not specified".to_string()))?;

    // The reported frame count is a capacity hint only. The true length is
    // known once decoding completes.
    let expected_frames = params.n_frames.unwrap_or(0) as usize;

    // Channel count prefers container/codec metadata. If it's missing we
    // derive it from the first decoded audio buffer below.
    let mut channel_count = params.channels.map(|c| c.count()).unwrap_or(0);

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs()
        .make(params, &decoder_opts)
        .map_err(|e| DecodeError::DecodeFailed(format!("'{}': {}", file_path, e)))?;

    let mut samples = Vec::with_capacity(expected_frames * channel_count.max(1));

    loop {
        let packet = match next_packet(format_reader.as_mut()) {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(DecodeError::AudioError(SymphoniaError::ResetRequired)) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                match decoder.decode(&packet) {
                    Ok(decoded) => decoded,
                    Err(e) => return Err(DecodeError::AudioError(e)),
                }
            }
            Err(e) => return Err(DecodeError::AudioError(e)),
        };

        let decoded_channels = append_interleaved(decoded, &mut samples);
        if channel_count == 0 {
            channel_count = decoded_channels;
        }
    }

    if channel_count == 0 {
        return Err(DecodeError::DecodeFailed(
            "Channels not specified".to_string(),
        ));
    }

    Ok(DecodedAudio {
        samples,
        channel_count: channel_count as u16,
        sample_rate,
    })
}

/// Reads the next packet with common error handling. Returns:
/// - `Ok(Some(packet))` if a packet was successfully read
/// - `Ok(None)` if EOF was reached (UnexpectedEof or DecodeError)
/// - `Err(...)` if an error occurred that should be returned
///
/// Note: ResetRequired errors are propagated to the caller so it can reset the decoder.
fn next_packet(
    format_reader: &mut dyn FormatReader,
) -> Result<Option<symphonia::core::formats::Packet>, DecodeError> {
    match format_reader.next_packet() {
        Ok(packet) => Ok(Some(packet)),
        Err(SymphoniaError::ResetRequired) => {
            Err(DecodeError::AudioError(SymphoniaError::ResetRequired))
        }
        Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            // End of file - we're done reading
            Ok(None)
        }
        Err(SymphoniaError::DecodeError(_)) => {
            // Some decoders return DecodeError at EOF instead of IoError
            Ok(None)
        }
        Err(e) => Err(DecodeError::AudioError(e)),
    }
}

/// Appends a decoded buffer to `out` as interleaved f32 samples and returns
/// the channel count observed in the buffer.
fn append_interleaved(decoded: AudioBufferRef, out: &mut Vec<f32>) -> usize {
    match decoded {
        AudioBufferRef::F32(buf) => append_planar(&buf, out, |sample| sample),
        AudioBufferRef::F64(buf) => append_planar(&buf, out, |sample| sample as f32),
        AudioBufferRef::S8(buf) => append_planar(&buf, out, scale_s8),
        AudioBufferRef::S16(buf) => append_planar(&buf, out, scale_s16),
        AudioBufferRef::S24(buf) => append_planar(&buf, out, |sample| scale_s24(sample.inner())),
        AudioBufferRef::S32(buf) => append_planar(&buf, out, scale_s32),
        AudioBufferRef::U8(buf) => append_planar(&buf, out, scale_u8),
        AudioBufferRef::U16(buf) => append_planar(&buf, out, scale_u16),
        AudioBufferRef::U24(buf) => append_planar(&buf, out, |sample| scale_u24(sample.inner())),
        AudioBufferRef::U32(buf) => append_planar(&buf, out, scale_u32),
    }
}

/// Interleaves planar samples from a generic AudioBuffer into `out`.
/// The closure converts a single sample value to f32.
fn append_planar<T, F>(buf: &AudioBuffer<T>, out: &mut Vec<f32>, convert: F) -> usize
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();
    let planes = buf.planes();
    out.reserve(frames * channels);
    for frame_idx in 0..frames {
        for ch_idx in 0..channels {
            out.push(convert(planes.planes()[ch_idx][frame_idx]));
        }
    }
    channels
}

// Scaling helpers for all integer formats.

#[inline]
fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav_i16;

    #[test]
    fn test_scale_signed() {
        assert_eq!(scale_s8(i8::MIN), -1.0);
        assert!((scale_s8(i8::MAX) - 1.0).abs() < 0.01);
        assert_eq!(scale_s8(0), 0.0);

        assert_eq!(scale_s16(i16::MIN), -1.0);
        assert!((scale_s16(i16::MAX) - 1.0).abs() < 0.001);
        assert_eq!(scale_s16(0), 0.0);

        assert_eq!(scale_s24(-(1 << 23)), -1.0);
        assert!((scale_s24((1 << 23) - 1) - 1.0).abs() < 0.001);

        assert_eq!(scale_s32(i32::MIN), -1.0);
        assert!((scale_s32(i32::MAX) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_scale_unsigned() {
        assert_eq!(scale_u8(0), -1.0);
        assert_eq!(scale_u8(u8::MAX), 1.0);
        assert!(scale_u8(128).abs() < 0.01);

        assert_eq!(scale_u16(0), -1.0);
        assert_eq!(scale_u16(u16::MAX), 1.0);

        assert_eq!(scale_u24(0), -1.0);
        assert_eq!(scale_u24((1 << 24) - 1), 1.0);

        assert_eq!(scale_u32(0), -1.0);
        assert_eq!(scale_u32(u32::MAX), 1.0);
    }

    #[test]
    fn test_decode_wav_interleaved() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("test.wav");

        // Two frames of stereo: full scale left, half scale right.
        let samples = vec![i16::MAX, i16::MAX / 2, i16::MIN, 0];
        write_wav_i16(&path, &samples, 2, 48000).expect("failed to write wav");

        let decoded = decode_file(&path).expect("failed to decode");
        assert_eq!(decoded.channel_count, 2);
        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.samples.len(), 4);
        assert!((decoded.samples[0] - 1.0).abs() < 0.001);
        assert!((decoded.samples[1] - 0.5).abs() < 0.001);
        assert_eq!(decoded.samples[2], -1.0);
        assert_eq!(decoded.samples[3], 0.0);
    }

    #[test]
    fn test_decode_unknown_format() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("noise.bin");
        std::fs::write(&path, [0u8; 64]).expect("failed to write");

        assert!(decode_file(&path).is_err());
    }
}
