//! Camera-blob backend: the laser spot's size on the sensor screen.
//!
//! Frames are converted to 8-bit HSV with hue on a 0..180 scale. Red
//! wraps around the hue origin, so the mask is the union of a low and a
//! high hue range, intersected with minimum saturation and value.

pub use image::RgbImage;
use image::imageops::{self, FilterType};

use focus_traits::BoxError;

use crate::sampler::{SampleReader, SampleSource};

/// Source of RGB frames.
pub trait FrameGrabber {
    fn grab(&mut self) -> Result<RgbImage, BoxError>;
}

impl<T: FrameGrabber + ?Sized> FrameGrabber for Box<T> {
    fn grab(&mut self) -> Result<RgbImage, BoxError> {
        (**self).grab()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobCfg {
    pub low_hue_max: u8,
    pub high_hue_min: u8,
    pub sat_min: u8,
    pub val_min: u8,
    pub normalize: bool,
    pub resize_to: Option<(u32, u32)>,
}

impl Default for BlobCfg {
    fn default() -> Self {
        Self {
            low_hue_max: 10,
            high_hue_min: 160,
            sat_min: 100,
            val_min: 60,
            normalize: true,
            resize_to: None,
        }
    }
}

/// 8-bit RGB to HSV, hue halved into 0..180.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;
    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    let h = (h / 2.0).round() as u32 % 180;
    (h as u8, s.round() as u8, v as u8)
}

#[inline]
fn in_mask(hsv: (u8, u8, u8), cfg: &BlobCfg) -> bool {
    let (h, s, v) = hsv;
    let red = h <= cfg.low_hue_max || (cfg.high_hue_min..=179).contains(&h);
    red && s >= cfg.sat_min && v >= cfg.val_min
}

/// Mask pixel count, or the masked fraction of the frame when normalizing.
pub fn blob_intensity(frame: &RgbImage, cfg: &BlobCfg) -> f64 {
    let count = frame
        .pixels()
        .filter(|p| in_mask(rgb_to_hsv(p[0], p[1], p[2]), cfg))
        .count();
    if !cfg.normalize {
        return count as f64;
    }
    let area = u64::from(frame.width()) * u64::from(frame.height());
    if area == 0 {
        0.0
    } else {
        count as f64 / area as f64
    }
}

/// Builds a grabber on `start()`; the camera is released when sampling stops.
pub struct CameraSource<F> {
    cfg: BlobCfg,
    open: F,
}

impl<F, G> CameraSource<F>
where
    F: Fn() -> Result<G, BoxError>,
    G: FrameGrabber + Send + 'static,
{
    pub fn new(cfg: BlobCfg, open: F) -> Self {
        Self { cfg, open }
    }
}

pub struct CameraReader<G> {
    cfg: BlobCfg,
    grabber: G,
}

impl<G: FrameGrabber> SampleReader for CameraReader<G> {
    fn read(&mut self) -> Result<f64, BoxError> {
        let mut frame = self.grabber.grab()?;
        if let Some((w, h)) = self.cfg.resize_to {
            if frame.dimensions() != (w, h) {
                frame = imageops::resize(&frame, w, h, FilterType::Triangle);
            }
        }
        let value = blob_intensity(&frame, &self.cfg);
        tracing::trace!(value, "blob sample");
        Ok(value)
    }
}

impl<F, G> SampleSource for CameraSource<F>
where
    F: Fn() -> Result<G, BoxError>,
    G: FrameGrabber + Send + 'static,
{
    type Reader = CameraReader<G>;

    fn open(&self) -> Result<CameraReader<G>, BoxError> {
        let grabber = (self.open)()?;
        tracing::debug!("camera opened");
        Ok(CameraReader {
            cfg: self.cfg,
            grabber,
        })
    }
}
