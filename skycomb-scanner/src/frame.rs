//! Minimal owned frame buffers implementing `machine-vision-formats`'s
//! `ImageData`/`Stride` traits, the same interface the teacher's
//! `image-tracker`/`basic-frame` crates use for camera frames.

use machine_vision_formats::{ImageData, PixelFormat, Stride};

/// A single-channel (thresholded) frame: a pixel is "hot" iff its byte is
/// non-zero.
#[derive(Debug, Clone)]
pub struct MonoFrame {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl MonoFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), width as usize * height as usize);
        MonoFrame {
            width,
            height,
            stride: width as usize,
            data,
        }
    }

    #[inline]
    pub fn is_hot(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.stride + x as usize] != 0
    }
}

impl ImageData for MonoFrame {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn image_data(&self) -> &[u8] {
        &self.data
    }
    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::MONO8
    }
}

impl Stride for MonoFrame {
    fn stride(&self) -> usize {
        self.stride
    }
}

/// A 3-channel color frame (the original, un-thresholded camera image);
/// channel order is not semantically significant here, only the mean of
/// the three bytes per pixel is used (spec §4.1's "mean of BGR channels").
#[derive(Debug, Clone)]
pub struct ColorFrame {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl ColorFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), width as usize * height as usize * 3);
        ColorFrame {
            width,
            height,
            stride: width as usize * 3,
            data,
        }
    }

    #[inline]
    pub fn mean_channel(&self, x: u32, y: u32) -> f32 {
        let base = y as usize * self.stride + x as usize * 3;
        let sum: u32 =
            self.data[base] as u32 + self.data[base + 1] as u32 + self.data[base + 2] as u32;
        sum as f32 / 3.0
    }
}

impl ImageData for ColorFrame {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn image_data(&self) -> &[u8] {
        &self.data
    }
    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::RGB8
    }
}

impl Stride for ColorFrame {
    fn stride(&self) -> usize {
        self.stride
    }
}
