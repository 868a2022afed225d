// Playback timebase module
// Maps wall-clock time to frame ids using the frame rate stored in the GV header.

use std::time::Duration;

use crate::formats::Header;

/// Frame timing for one clip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timebase {
    fps: f64,
    frame_count: u32,
    looping: bool,
}

impl Timebase {
    /// Returns `None` when the frame rate is zero, negative, not finite, or so small that the
    /// frame period or clip length does not fit in a `Duration`.
    pub fn new(fps: f32, frame_count: u32) -> Option<Self> {
        let fps = f64::from(fps);
        if !fps.is_finite() || fps <= 0.0 {
            return None;
        }
        let longest = f64::from(frame_count.max(1)) / fps;
        Duration::try_from_secs_f64(longest).ok()?;
        Some(Self { fps, frame_count, looping: false })
    }

    pub fn from_header(header: &Header) -> Option<Self> {
        Self::new(header.fps, header.frame_count)
    }

    /// Wrap around to frame 0 after the last frame instead of holding it
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// Total clip length
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.frame_count) / self.fps)
    }

    /// Presentation time of `frame` in seconds: t_n = n / fps
    pub fn time_for_frame(&self, frame: u32) -> f64 {
        f64::from(frame) / self.fps
    }

    /// Frame to show after `elapsed`. `None` for an empty clip, or past the end when not looping.
    pub fn frame_at(&self, elapsed: Duration) -> Option<u32> {
        if self.frame_count == 0 {
            return None;
        }
        let frame = (elapsed.as_secs_f64() * self.fps).floor();
        if self.looping {
            Some((frame % f64::from(self.frame_count)) as u32)
        } else if frame < f64::from(self.frame_count) {
            Some(frame as u32)
        } else {
            None
        }
    }
}
