use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use image::RgbImage;

use super::palette::CSS3_PALETTE;
use crate::ocr::BoundingBox;
use crate::settings::ColorSettings;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

pub const UNKNOWN_COLOR: &str = "unknown";

type Palette = &'static [(&'static str, [u8; 3])];

/// Names the dominant colours inside a glyph box.
///
/// Nearest-palette lookups are memoized per exact RGB value for the lifetime
/// of the namer. The key space is bounded by the pixel values actually
/// sampled, so the cache is never evicted.
pub struct ColorNamer {
    enabled: bool,
    max_colors: i32,
    palette: Palette,
    cache: Mutex<HashMap<[u8; 3], &'static str>>,
}

impl ColorNamer {
    pub fn new(max_colors: i32) -> Self {
        Self::with_palette(max_colors, CSS3_PALETTE)
    }

    pub fn with_palette(max_colors: i32, palette: Palette) -> Self {
        Self {
            enabled: true,
            max_colors,
            palette,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(0)
        }
    }

    pub fn from_settings(settings: &ColorSettings) -> Self {
        if settings.enabled {
            Self::new(settings.max_colors)
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_colors(&self) -> i32 {
        self.max_colors
    }

    pub fn cached_entries(&self) -> usize {
        self.lock_cache().len()
    }

    /// Describe the colours in `bbox`, e.g. `"black: 62%, white: 35%"`.
    ///
    /// Never fails: a disabled namer, a cap below one, a missing image, a
    /// malformed box or an empty palette all yield `"unknown"`.
    pub fn describe(&self, bbox: &BoundingBox, image: Option<&RgbImage>) -> String {
        if !self.enabled || self.max_colors < 1 {
            return UNKNOWN_COLOR.to_string();
        }
        let Some(image) = image else {
            log_debug!("colour lookup skipped: no image");
            return UNKNOWN_COLOR.to_string();
        };

        match self.try_describe(bbox, image) {
            Ok(description) => description,
            Err(err) => {
                log_debug!("colour lookup degraded to unknown: {err}");
                UNKNOWN_COLOR.to_string()
            }
        }
    }

    fn try_describe(&self, bbox: &BoundingBox, image: &RgbImage) -> Result<String> {
        if bbox.is_malformed() {
            bail!("malformed box {bbox:?}");
        }
        if self.palette.is_empty() {
            bail!("reference palette is empty");
        }

        let mut by_value: HashMap<[u8; 3], u64> = HashMap::new();
        for (x, y) in clipped_pixels(bbox, image.width(), image.height()) {
            *by_value.entry(image.get_pixel(x, y).0).or_insert(0) += 1;
        }

        let mut by_name: HashMap<&'static str, u64> = HashMap::new();
        for (value, count) in by_value {
            *by_name.entry(self.nearest_name(value)?).or_insert(0) += count;
        }

        let mut ranked: Vec<(&'static str, u64)> = by_name.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let area = bbox.area();
        let cap = usize::try_from(self.max_colors).unwrap_or(0);
        let mut parts = Vec::new();
        let mut reported = 0u64;
        // Entries that round to 0% still consume a slot under the cap.
        for (name, count) in ranked.into_iter().take(cap) {
            if area != 0 {
                let rounded = (count as f64 / area as f64 * 100.0).round_ties_even() as u64;
                // Rounding up on ties must not push the total past 100.
                let percent = rounded.min(100 - reported);
                if percent > 0 {
                    reported += percent;
                    parts.push(format!("{name}: {percent}%"));
                }
            } else {
                parts.push(format!("{name}: {count} pixel"));
            }
        }

        if parts.is_empty() {
            Ok(UNKNOWN_COLOR.to_string())
        } else {
            Ok(parts.join(", "))
        }
    }

    /// Closest palette entry by Euclidean distance in RGB space.
    pub fn nearest_name(&self, rgb: [u8; 3]) -> Result<&'static str> {
        if let Some(name) = self.lock_cache().get(&rgb).copied() {
            return Ok(name);
        }

        let (name, _) = self
            .palette
            .iter()
            .map(|(name, reference)| (*name, distance_sq(rgb, *reference)))
            .min_by_key(|(_, dist)| *dist)
            .ok_or_else(|| anyhow!("reference palette is empty"))?;

        self.lock_cache().insert(rgb, name);
        Ok(name)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<[u8; 3], &'static str>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn distance_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = i32::from(*x) - i32::from(*y);
            (d * d) as u32
        })
        .sum()
}

/// Pixel coordinates of `bbox` that fall inside a `width` x `height` image.
fn clipped_pixels(bbox: &BoundingBox, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let clamp = |value: i64, max: u32| value.clamp(0, i64::from(max)) as u32;
    let x0 = clamp(i64::from(bbox.left), width);
    let x1 = clamp(i64::from(bbox.left) + i64::from(bbox.width), width);
    let y0 = clamp(i64::from(bbox.top), height);
    let y1 = clamp(i64::from(bbox.top) + i64::from(bbox.height), height);
    (y0..y1).flat_map(move |y| (x0..x1).map(move |x| (x, y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// 10x10 image: top 6 rows black, next 3 white, last row pure red.
    fn striped() -> RgbImage {
        RgbImage::from_fn(10, 10, |_, y| match y {
            0..=5 => Rgb([0, 0, 0]),
            6..=8 => Rgb([255, 255, 255]),
            _ => Rgb([255, 0, 0]),
        })
    }

    fn percents(description: &str) -> Vec<u64> {
        description
            .split(", ")
            .filter_map(|part| part.rsplit(": ").next())
            .filter_map(|p| p.trim_end_matches('%').parse().ok())
            .collect()
    }

    #[test]
    fn cap_below_one_is_unknown_without_sampling() {
        let namer = ColorNamer::new(0);
        let image = striped();
        assert_eq!(namer.describe(&BoundingBox::new(0, 0, 10, 10), Some(&image)), "unknown");
        assert_eq!(namer.cached_entries(), 0);

        let namer = ColorNamer::new(-3);
        assert_eq!(namer.describe(&BoundingBox::new(0, 0, 10, 10), Some(&image)), "unknown");
    }

    #[test]
    fn disabled_namer_is_unknown() {
        let namer = ColorNamer::disabled();
        let image = striped();
        assert_eq!(namer.describe(&BoundingBox::new(0, 0, 10, 10), Some(&image)), "unknown");
        assert_eq!(namer.cached_entries(), 0);
    }

    #[test]
    fn ranks_colours_by_share() {
        let namer = ColorNamer::new(3);
        let image = striped();
        let description = namer.describe(&BoundingBox::new(0, 0, 10, 10), Some(&image));
        assert_eq!(description, "black: 60%, white: 30%, red: 10%");
    }

    #[test]
    fn cap_limits_entries() {
        let namer = ColorNamer::new(1);
        let image = striped();
        assert_eq!(
            namer.describe(&BoundingBox::new(0, 0, 10, 10), Some(&image)),
            "black: 60%"
        );
    }

    #[test]
    fn zero_percent_entries_are_omitted_but_use_a_slot() {
        // 1 red pixel out of 400 rounds to 0%.
        let image = RgbImage::from_fn(20, 20, |x, y| {
            if x == 0 && y == 0 {
                Rgb([255, 0, 0])
            } else if y < 14 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let bbox = BoundingBox::new(0, 0, 20, 20);

        let namer = ColorNamer::new(3);
        let description = namer.describe(&bbox, Some(&image));
        assert_eq!(description, "black: 70%, white: 30%");

        let total: u64 = percents(&description).iter().sum();
        assert!(total <= 100);
    }

    #[test]
    fn tied_rounding_never_reports_more_than_the_whole_box() {
        // 3 red, 3 blue and 2 lime: 37.5% rounds up twice.
        let image = RgbImage::from_fn(4, 2, |x, y| match (x, y) {
            (0..=2, 0) => Rgb([255, 0, 0]),
            (3, 0) | (0..=1, 1) => Rgb([0, 0, 255]),
            _ => Rgb([0, 255, 0]),
        });
        let namer = ColorNamer::new(3);
        let description = namer.describe(&BoundingBox::new(0, 0, 4, 2), Some(&image));

        assert_eq!(description, "blue: 38%, red: 38%, lime: 24%");
        assert_eq!(percents(&description).iter().sum::<u64>(), 100);
    }

    #[test]
    fn near_values_snap_to_the_closest_reference() {
        let namer = ColorNamer::new(1);
        assert_eq!(namer.nearest_name([250, 2, 3]).unwrap(), "red");
        assert_eq!(namer.nearest_name([3, 3, 3]).unwrap(), "black");
        assert_eq!(namer.nearest_name([0x80, 0x80, 0x81]).unwrap(), "gray");
    }

    #[test]
    fn lookups_are_memoized() {
        let namer = ColorNamer::new(3);
        let image = striped();
        namer.describe(&BoundingBox::new(0, 0, 10, 10), Some(&image));
        assert_eq!(namer.cached_entries(), 3);
        namer.describe(&BoundingBox::new(0, 0, 5, 5), Some(&image));
        assert_eq!(namer.cached_entries(), 3);
    }

    #[test]
    fn degraded_inputs_are_unknown() {
        let namer = ColorNamer::new(3);
        let image = striped();
        assert_eq!(namer.describe(&BoundingBox::new(0, 0, -1, 4), Some(&image)), "unknown");
        assert_eq!(namer.describe(&BoundingBox::new(0, 0, 4, 4), None), "unknown");

        let empty = ColorNamer::with_palette(3, &[]);
        assert_eq!(empty.describe(&BoundingBox::new(0, 0, 4, 4), Some(&image)), "unknown");
    }

    #[test]
    fn box_outside_the_image_counts_against_the_area() {
        let namer = ColorNamer::new(3);
        let image = striped();
        // Only the 5x5 top-left quarter of this box is on the image.
        let description = namer.describe(&BoundingBox::new(5, -5, 10, 10), Some(&image));
        assert_eq!(description, "black: 25%");
    }

    #[test]
    fn zero_area_box_is_unknown() {
        let namer = ColorNamer::new(3);
        let image = striped();
        assert_eq!(namer.describe(&BoundingBox::new(2, 2, 0, 5), Some(&image)), "unknown");
    }
}
