//! Core environment trait, observation types and the collaborator interfaces
//! the parking environment is built on.
//!
//! - [`ImageStore`] -- preloaded waypoint frames keyed by scenario and step.
//! - [`TextEncoder`] -- instruction text to fixed-length token ids.
//! - [`Environment`] -- the reset/step/render surface agents drive.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Number of discrete actions: 0 advances, 1..=6 select a slot location.
pub const ACTION_COUNT: u8 = 7;

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Interleaved channel order of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// A fixed-shape 8-bit image, row-major with interleaved channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
    pub order: ChannelOrder,
    pub pixels: Vec<u8>,
}

impl Frame {
    /// An all-black frame of the given shape.
    pub fn blank(height: u32, width: u32, channels: u32) -> Self {
        Self {
            height,
            width,
            channels,
            order: ChannelOrder::Rgb,
            pixels: vec![0; Self::buffer_len(height, width, channels)],
        }
    }

    /// Bytes needed for a frame of the given shape, computed in `usize`.
    pub fn buffer_len(height: u32, width: u32, channels: u32) -> usize {
        height as usize * width as usize * channels as usize
    }

    pub fn shape(&self) -> (u32, u32, u32) {
        (self.height, self.width, self.channels)
    }

    /// The same image with channels in RGB order.
    pub fn to_rgb(&self) -> Frame {
        let mut out = self.clone();
        if self.order == ChannelOrder::Bgr && self.channels >= 3 {
            for px in out.pixels.chunks_exact_mut(self.channels as usize) {
                px.swap(0, 2);
            }
        }
        out.order = ChannelOrder::Rgb;
        out
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Key of the waypoint image for `step` in `scenario`. Steps are zero-padded
/// to two digits (`DJI_07.JPG`, `DJI_12.JPG`).
pub fn image_key(scenario: &str, step: u32) -> String {
    format!("{scenario}/DJI_{step:02}.JPG")
}

/// Read access to preloaded waypoint images.
pub trait ImageStore {
    /// The resized frame used in observations.
    fn observation(&self, key: &str) -> Option<Arc<Frame>>;

    /// The full-resolution frame used for rendering. Defaults to the
    /// observation frame.
    fn render(&self, key: &str) -> Option<Arc<Frame>> {
        self.observation(key)
    }
}

/// Turns instruction text into a fixed-length sequence of token ids.
pub trait TextEncoder {
    /// Encode `text`, padding or truncating to exactly `max_len` ids.
    fn encode(&self, text: &str, max_len: usize) -> Vec<u32>;
}

// ---------------------------------------------------------------------------
// Environment surface
// ---------------------------------------------------------------------------

/// What the agent sees: the current waypoint frame and the encoded
/// instruction.
#[derive(Debug, Clone)]
pub struct Observation {
    pub image: Arc<Frame>,
    pub instruction: Vec<u32>,
}

/// The result of a single transition.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    /// Side-channel information; currently always an empty object.
    pub info: serde_json::Value,
}

/// The reset/step/render surface shared by all parking environments.
pub trait Environment {
    /// Start a new episode, optionally targeting a specific instruction.
    fn reset(&mut self, instruction_index: Option<usize>) -> Result<Observation, EnvError>;

    /// Apply `action` (0..[`ACTION_COUNT`]) to the current episode.
    fn step(&mut self, action: u8) -> Result<StepOutcome, EnvError>;

    /// Full-resolution RGB frame of the current step plus the instruction text.
    fn render(&self) -> Result<(Frame, String), EnvError>;

    /// Whether the current episode has terminated.
    fn is_done(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_frame_matches_its_shape() {
        let frame = Frame::blank(128, 400, 3);
        assert_eq!(frame.shape(), (128, 400, 3));
        assert_eq!(frame.pixels.len(), 128 * 400 * 3);
        assert!(frame.pixels.iter().all(|&p| p == 0));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn buffer_len_does_not_wrap_at_u32() {
        assert_eq!(Frame::buffer_len(65_536, 65_536, 3), 12_884_901_888);
    }

    #[test]
    fn bgr_frames_convert_to_rgb() {
        let frame = Frame {
            height: 1,
            width: 2,
            channels: 3,
            order: ChannelOrder::Bgr,
            pixels: vec![1, 2, 3, 4, 5, 6],
        };
        let rgb = frame.to_rgb();
        assert_eq!(rgb.pixels, vec![3, 2, 1, 6, 5, 4]);
        assert_eq!(rgb.order, ChannelOrder::Rgb);
        assert_eq!(rgb.to_rgb(), rgb);
    }

    #[test]
    fn image_keys_pad_steps_to_two_digits() {
        assert_eq!(image_key("20240518_01", 7), "20240518_01/DJI_07.JPG");
        assert_eq!(image_key("20240518_01", 29), "20240518_01/DJI_29.JPG");
    }
}
