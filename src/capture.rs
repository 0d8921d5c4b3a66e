use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use tracing::{debug, info};

use crate::error::{AppResult, SessionError};

/// Source of 8-bit luma video frames
///
/// A frame obtained from `checkout_frame` stays valid until `checkin_frame`
/// is called. The capture loop copies it into the detection buffer and
/// checks it back in on the same tick; it never keeps a frame across ticks.
///
/// # Frame layout
/// Tightly packed, row-major, one byte per pixel, `width * height` bytes.
pub trait FrameSource {
    /// Frame size in pixels
    fn dimensions(&self) -> (u32, u32);

    /// Borrow the newest frame, or `None` when no new frame is available
    fn checkout_frame(&mut self) -> Option<&[u8]>;

    /// Release the frame handed out by the last `checkout_frame`
    fn checkin_frame(&mut self);
}

/// Preloaded frames played back in order
#[derive(Debug, Clone)]
pub struct MemoryFrameSource {
    width: u32,
    height: u32,
    frames: Vec<Vec<u8>>,
    next: usize,
    looping: bool,
    checked_out: bool,
}

impl MemoryFrameSource {
    /// Create a source; every frame must be exactly `width * height` bytes
    pub fn new(width: u32, height: u32, frames: Vec<Vec<u8>>) -> Result<Self, SessionError> {
        if width == 0 || height == 0 {
            return Err(SessionError::InvalidDimensions { width, height });
        }

        let frame_len = width as usize * height as usize;
        if frames.iter().any(|frame| frame.len() != frame_len) {
            return Err(SessionError::InvalidDimensions { width, height });
        }

        Ok(Self {
            width,
            height,
            frames,
            next: 0,
            looping: false,
            checked_out: false,
        })
    }

    /// Restart from the first frame after the last one
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn push_frame(&mut self, frame: Vec<u8>) -> Result<(), SessionError> {
        if frame.len() != self.width as usize * self.height as usize {
            return Err(SessionError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Frames not yet played (ignores looping)
    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.next)
    }
}

impl FrameSource for MemoryFrameSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn checkout_frame(&mut self) -> Option<&[u8]> {
        if self.next >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return None;
            }
            self.next = 0;
        }

        self.checked_out = true;
        self.frames.get(self.next).map(Vec::as_slice)
    }

    fn checkin_frame(&mut self) {
        if self.checked_out {
            self.checked_out = false;
            self.next += 1;
        }
    }
}

/// Frames loaded from image files, converted to luma
///
/// Useful for replaying a recorded calibration run without a camera.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    frames: MemoryFrameSource,
    paths: Vec<PathBuf>,
}

impl ImageSequenceSource {
    /// Load every image in `paths`; all must share the same dimensions
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> AppResult<Self> {
        let mut frames: Option<MemoryFrameSource> = None;
        let mut loaded = Vec::with_capacity(paths.len());

        for path in paths {
            let path = path.as_ref();
            let image = image::open(path)
                .with_context(|| format!("Failed to load image {}", path.display()))?
                .to_luma8();
            let (width, height) = image.dimensions();
            debug!("Loaded frame {} ({}x{})", path.display(), width, height);

            match frames.as_mut() {
                None => {
                    frames = Some(MemoryFrameSource::new(width, height, vec![image.into_raw()])?);
                }
                Some(source) => {
                    source.push_frame(image.into_raw()).with_context(|| {
                        format!(
                            "Image {} does not match the sequence size {}x{}",
                            path.display(),
                            source.width,
                            source.height
                        )
                    })?;
                }
            }
            loaded.push(path.to_path_buf());
        }

        let frames = frames.ok_or_else(|| anyhow!("Image sequence is empty"))?;
        info!(
            "Loaded {} frames ({}x{})",
            loaded.len(),
            frames.width,
            frames.height
        );

        Ok(Self {
            frames,
            paths: loaded,
        })
    }

    /// Replay the sequence endlessly
    pub fn looping(mut self, looping: bool) -> Self {
        self.frames = self.frames.looping(looping);
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl FrameSource for ImageSequenceSource {
    fn dimensions(&self) -> (u32, u32) {
        self.frames.dimensions()
    }

    fn checkout_frame(&mut self) -> Option<&[u8]> {
        self.frames.checkout_frame()
    }

    fn checkin_frame(&mut self) {
        self.frames.checkin_frame()
    }
}
