//! Waypoint image stores.
//!
//! [`InMemoryImageStore`] holds frames keyed by [`image_key`](super::traits::image_key).
//! [`load_scenario_images`] fills one from the `.JPG` files of scenario
//! directories, keeping a resized copy for observations and the original for
//! rendering.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};

use super::traits::{ChannelOrder, Frame, ImageStore};
use crate::data::reader::scenario_name;

/// Frames held in memory, keyed by `"{scenario}/{file name}"`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryImageStore {
    observations: HashMap<String, Arc<Frame>>,
    renders: HashMap<String, Arc<Frame>>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the observation frame for `key`.
    pub fn insert(&mut self, key: impl Into<String>, frame: Frame) {
        self.observations.insert(key.into(), Arc::new(frame));
    }

    /// Store a separate full-resolution frame for rendering `key`.
    pub fn insert_render(&mut self, key: impl Into<String>, frame: Frame) {
        self.renders.insert(key.into(), Arc::new(frame));
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl ImageStore for InMemoryImageStore {
    fn observation(&self, key: &str) -> Option<Arc<Frame>> {
        self.observations.get(key).cloned()
    }

    fn render(&self, key: &str) -> Option<Arc<Frame>> {
        self.renders
            .get(key)
            .or_else(|| self.observations.get(key))
            .cloned()
    }
}

/// Decode every `.JPG` in `scenario_dirs`, resizing observation frames to
/// `height` x `width`.
pub fn load_scenario_images(
    scenario_dirs: &[PathBuf],
    height: u32,
    width: u32,
) -> Result<InMemoryImageStore> {
    let mut store = InMemoryImageStore::new();

    for dir in scenario_dirs {
        let scenario = scenario_name(dir);
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list images in {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            let is_jpg = path.extension().is_some_and(|ext| ext == "JPG");
            if !is_jpg {
                continue;
            }
            let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };

            let full = image::open(&path)
                .with_context(|| format!("Failed to decode {}", path.display()))?
                .to_rgb8();
            let resized = imageops::resize(&full, width, height, FilterType::Triangle);

            let key = format!("{scenario}/{file_name}");
            let (full_w, full_h) = full.dimensions();
            store.insert(
                key.clone(),
                Frame {
                    height,
                    width,
                    channels: 3,
                    order: ChannelOrder::Rgb,
                    pixels: resized.into_raw(),
                },
            );
            store.insert_render(
                key,
                Frame {
                    height: full_h,
                    width: full_w,
                    channels: 3,
                    order: ChannelOrder::Rgb,
                    pixels: full.into_raw(),
                },
            );
        }

        tracing::debug!(scenario = %scenario, "Loaded scenario images");
    }

    tracing::info!(images = store.len(), "Loaded waypoint images");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_falls_back_to_observation_frame() {
        let mut store = InMemoryImageStore::new();
        store.insert("s/DJI_01.JPG", Frame::blank(2, 2, 3));
        store.insert("s/DJI_02.JPG", Frame::blank(2, 2, 3));
        store.insert_render("s/DJI_02.JPG", Frame::blank(4, 4, 3));

        assert_eq!(store.render("s/DJI_01.JPG").unwrap().shape(), (2, 2, 3));
        assert_eq!(store.render("s/DJI_02.JPG").unwrap().shape(), (4, 4, 3));
        assert!(store.observation("s/DJI_03.JPG").is_none());
    }

    #[test]
    fn loads_and_resizes_jpegs() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("20240518_01");
        std::fs::create_dir_all(&dir).unwrap();
        let img = image::RgbImage::from_pixel(40, 20, image::Rgb([200, 10, 10]));
        img.save_with_format(dir.join("DJI_01.JPG"), image::ImageFormat::Jpeg)
            .unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let store = load_scenario_images(&[dir], 8, 16).unwrap();
        assert_eq!(store.len(), 1);
        let obs = store.observation("20240518_01/DJI_01.JPG").unwrap();
        assert_eq!(obs.shape(), (8, 16, 3));
        assert_eq!(obs.pixels.len(), 8 * 16 * 3);
        let full = store.render("20240518_01/DJI_01.JPG").unwrap();
        assert_eq!(full.shape(), (20, 40, 3));
    }
}
