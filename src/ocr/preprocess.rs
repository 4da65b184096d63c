use image::{imageops::FilterType, DynamicImage, GrayImage, Luma};

use crate::settings::OcrSettings;

/// Transformations applied to a capture before it is handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocess {
    pub scale_factor: u32,
    pub invert: bool,
    pub grayscale: bool,
    pub black_white: bool,
    pub threshold: u8,
}

impl Default for Preprocess {
    fn default() -> Self {
        Self::from(&OcrSettings::default())
    }
}

impl From<&OcrSettings> for Preprocess {
    fn from(settings: &OcrSettings) -> Self {
        Self {
            scale_factor: settings.scale_factor.max(1),
            invert: settings.invert,
            grayscale: settings.grayscale || settings.black_white,
            black_white: settings.black_white,
            threshold: settings.black_white_threshold,
        }
    }
}

impl Preprocess {
    /// Upscale, then invert, grayscale and threshold in that order.
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        let scale = self.scale_factor.max(1);
        let mut out = if scale == 1 {
            image.clone()
        } else {
            image.resize_exact(
                image.width().saturating_mul(scale),
                image.height().saturating_mul(scale),
                FilterType::CatmullRom,
            )
        };

        if self.invert {
            out.invert();
        }
        if self.grayscale || self.black_white {
            out = DynamicImage::ImageLuma8(out.to_luma8());
        }
        if self.black_white {
            out = DynamicImage::ImageLuma8(threshold(&out.to_luma8(), self.threshold));
        }
        out
    }
}

/// Values strictly above `cutoff` become white, everything else black.
pub fn threshold(image: &GrayImage, cutoff: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let Luma([value]) = *pixel;
        *pixel = Luma([if value > cutoff { 255 } else { 0 }]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample() -> DynamicImage {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([250, 250, 250]));
        img.put_pixel(1, 0, Rgb([10, 20, 30]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn scales_by_factor() {
        let out = Preprocess::default().apply(&sample());
        assert_eq!((out.width(), out.height()), (6, 3));
    }

    #[test]
    fn invert_flips_channels() {
        let pre = Preprocess {
            scale_factor: 1,
            invert: true,
            ..Preprocess::default()
        };
        let out = pre.apply(&sample()).to_rgb8();
        assert_eq!(out.get_pixel(0, 0), &Rgb([5, 5, 5]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([245, 235, 225]));
    }

    #[test]
    fn black_white_thresholds_luma() {
        let pre = Preprocess {
            scale_factor: 1,
            black_white: true,
            threshold: 200,
            ..Preprocess::default()
        };
        let out = pre.apply(&sample()).to_luma8();
        assert_eq!(out.get_pixel(0, 0), &Luma([255]));
        assert_eq!(out.get_pixel(1, 0), &Luma([0]));
    }

    #[test]
    fn threshold_is_strictly_greater() {
        let img = GrayImage::from_raw(2, 1, vec![200, 201]).unwrap();
        let out = threshold(&img, 200);
        assert_eq!(out.as_raw(), &vec![0, 255]);
    }

    #[test]
    fn black_white_setting_implies_grayscale() {
        let settings = OcrSettings {
            black_white: true,
            ..OcrSettings::default()
        };
        assert!(Preprocess::from(&settings).grayscale);
    }
}
