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
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::DecodeError;

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Resamples interleaved samples to the target rate, preserving the channel
/// count. The whole buffer is converted up front so playback never resamples.
pub(super) fn resample(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, DecodeError> {
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let ratio = target_rate as f64 / source_rate as f64;

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, channels)
        .map_err(|_e| DecodeError::ResamplingFailed(source_rate, target_rate))?;

    // The sinc filter delays its output; skipped below so the converted sound
    // lines up with the original.
    let delay = resampler.output_delay();
    let expected_frames = (source_frames as f64 * ratio).round() as usize;

    // rubato works on planar data; split the interleaved input once.
    let mut planar: Vec<Vec<f32>> = vec![Vec::with_capacity(source_frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }

    let mut scratch = resampler.output_buffer_allocate(true);
    let mut output: Vec<f32> = Vec::with_capacity((expected_frames + delay) * channels);
    let mut pos = 0;

    // Feed full input blocks.
    while source_frames - pos >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let input: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..pos + needed]).collect();
        let (consumed, produced) = resampler
            .process_into_buffer(&input, &mut scratch, None)
            .map_err(|_e| DecodeError::ResamplingFailed(source_rate, target_rate))?;
        pos += consumed;
        append_interleaved(&scratch, produced, &mut output);
    }

    // Feed whatever partial block remains.
    if pos < source_frames {
        let input: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..]).collect();
        let (_consumed, produced) = resampler
            .process_partial_into_buffer(Some(&input[..]), &mut scratch, None)
            .map_err(|_e| DecodeError::ResamplingFailed(source_rate, target_rate))?;
        append_interleaved(&scratch, produced, &mut output);
    }

    // Keep flushing until the filter delay has been pushed out.
    while output.len() / channels < expected_frames + delay {
        let (_consumed, produced) = resampler
            .process_partial_into_buffer(None::<&[&[f32]]>, &mut scratch, None)
            .map_err(|_e| DecodeError::ResamplingFailed(source_rate, target_rate))?;
        if produced == 0 {
            break;
        }
        append_interleaved(&scratch, produced, &mut output);
    }

    // Drop the leading delay frames and trim to the expected length.
    let total_frames = output.len() / channels;
    let start = delay.min(total_frames);
    output.drain(..start * channels);
    let remaining_frames = total_frames - start;
    output.truncate(expected_frames.min(remaining_frames) * channels);

    Ok(output)
}

/// Interleaves `frames` frames of planar resampler output into `out`.
fn append_interleaved(planar: &[Vec<f32>], frames: usize, out: &mut Vec<f32>) {
    for frame_idx in 0..frames {
        for ch in planar {
            out.push(ch[frame_idx]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{rms, sine_wave};

    #[test]
    fn test_upsample_length() {
        let samples = sine_wave(440.0, 0.5, 22050, 22050);
        let result = resample(&samples, 1, 22050, 44100).expect("resample failed");
        assert_eq!(result.len(), 44100);
    }

    #[test]
    fn test_downsample_length() {
        let samples = sine_wave(440.0, 0.5, 48000, 1000);
        let result = resample(&samples, 1, 48000, 44100).expect("resample failed");
        let expected = (1000.0_f64 * 44100.0 / 48000.0).round() as usize;
        assert_eq!(result.len(), expected);
    }

    #[test]
    fn test_preserves_channel_levels() {
        // Stereo: constant 0.5 on the left, -0.5 on the right.
        let frames = 8192;
        let mut samples = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            samples.push(0.5);
            samples.push(-0.5);
        }

        let result = resample(&samples, 2, 22050, 44100).expect("resample failed");
        assert_eq!(result.len() % 2, 0);

        // Check frames away from the edges where the filter has settled.
        let mid = (result.len() / 4) & !1;
        assert!((result[mid] - 0.5).abs() < 0.02, "left={}", result[mid]);
        assert!(
            (result[mid + 1] + 0.5).abs() < 0.02,
            "right={}",
            result[mid + 1]
        );
    }

    #[test]
    fn test_preserves_sine_amplitude() {
        let samples = sine_wave(440.0, 0.5, 22050, 22050);
        let result = resample(&samples, 1, 22050, 44100).expect("resample failed");

        // RMS of a 0.5 amplitude sine is 0.5/sqrt(2). Use the middle half of
        // the buffer to stay clear of edge effects.
        let quarter = result.len() / 4;
        let level = rms(&result[quarter..3 * quarter]);
        let expected = 0.5 / 2.0_f32.sqrt();
        assert!(
            (level - expected).abs() < 0.02,
            "rms={} expected={}",
            level,
            expected
        );
    }
}
