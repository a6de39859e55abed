//! Frame decoding and grid composition for the multi-camera viewer
//!
//! Each tick the viewer receives one compressed frame per camera, decodes
//! it, halves it in both dimensions, and tiles the set into a single
//! composite. The grid is computed from the camera count instead of
//! assuming four inputs: `rows = ceil(sqrt(n))`, `cols = ceil(n / rows)`.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),

    #[error("no frames to compose")]
    NoFrames,

    #[error("frame {index} is {got_width}x{got_height}, expected {want_width}x{want_height}")]
    MismatchedSize {
        index: usize,
        got_width: u32,
        got_height: u32,
        want_width: u32,
        want_height: u32,
    },

    #[error("{got} frames exceed the {cells}-cell grid")]
    TooManyFrames { got: usize, cells: u32 },
}

/// Grid shape for a given camera count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: u32,
    pub cols: u32,
}

impl GridLayout {
    /// Computes the layout for `count` tiles.
    pub fn for_count(count: usize) -> Self {
        let count = count.max(1) as u32;
        let rows = (f64::from(count).sqrt()).ceil() as u32;
        let cols = count.div_ceil(rows);
        Self { rows, cols }
    }

    pub fn cells(&self) -> u32 {
        self.rows * self.cols
    }
}

/// Composite builder for one viewer window.
#[derive(Debug, Clone, Copy)]
pub struct Mosaic {
    layout: GridLayout,
}

impl Mosaic {
    pub fn new(camera_count: usize) -> Self {
        Self {
            layout: GridLayout::for_count(camera_count),
        }
    }

    /// Decodes a compressed frame and halves it in both dimensions.
    pub fn decode_half(&self, data: &[u8]) -> Result<RgbaImage, MosaicError> {
        let frame = image::load_from_memory(data)?.to_rgba8();
        let width = (frame.width() / 2).max(1);
        let height = (frame.height() / 2).max(1);
        Ok(imageops::resize(&frame, width, height, FilterType::Triangle))
    }

    /// Tiles decoded frames into the grid sized at construction, row-major
    /// in receive order.
    ///
    /// All frames must match the first frame's dimensions; the caller is
    /// expected to skip a tick with a short frame set rather than pad here.
    pub fn compose(&self, frames: &[RgbaImage]) -> Result<RgbaImage, MosaicError> {
        let first = frames.first().ok_or(MosaicError::NoFrames)?;
        if frames.len() as u32 > self.layout.cells() {
            return Err(MosaicError::TooManyFrames {
                got: frames.len(),
                cells: self.layout.cells(),
            });
        }
        let (cell_width, cell_height) = (first.width(), first.height());

        for (index, frame) in frames.iter().enumerate() {
            if frame.width() != cell_width || frame.height() != cell_height {
                return Err(MosaicError::MismatchedSize {
                    index,
                    got_width: frame.width(),
                    got_height: frame.height(),
                    want_width: cell_width,
                    want_height: cell_height,
                });
            }
        }

        let mut canvas = RgbaImage::new(
            self.layout.cols * cell_width,
            self.layout.rows * cell_height,
        );
        for (index, frame) in frames.iter().enumerate() {
            let index = index as u32;
            let x = i64::from((index % self.layout.cols) * cell_width);
            let y = i64::from((index / self.layout.cols) * cell_height);
            imageops::replace(&mut canvas, frame, x, y);
        }
        Ok(canvas)
    }
}
