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

/// A source of interleaved audio frames at the output sample rate.
///
/// Sources are pulled by the mixer from the audio callback, so implementations
/// must not block or allocate in `next_block`.
pub trait FrameSource: Send {
    /// Writes up to `max_frames` frames of interleaved samples into `out`.
    /// Returns the number of frames written (0 = exhausted).
    ///
    /// `out` must hold at least `max_frames * channel_count()` samples. Once a
    /// source returns 0 it will not be polled again.
    fn next_block(&mut self, out: &mut [f32], max_frames: usize) -> usize;

    /// Get the number of interleaved channels this source produces.
    fn channel_count(&self) -> u16;
}

/// Blanket implementation for Box<dyn FrameSource>.
/// This allows boxed sources to be used with generic functions that require
/// S: FrameSource, eliminating the need for wrapper types.
impl FrameSource for Box<dyn FrameSource> {
    fn next_block(&mut self, out: &mut [f32], max_frames: usize) -> usize {
        (**self).next_block(out, max_frames)
    }

    fn channel_count(&self) -> u16 {
        (**self).channel_count()
    }
}
