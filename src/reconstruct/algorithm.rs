use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::color::ColorNamer;
use crate::ocr::{GlyphRecord, LayoutKey};

use super::cleanup::clean_text;
use super::config::ReconstructConfig;
use super::coords::CoordinateMapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Text,
}

/// One recognised word, positioned in screen space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
    pub text: String,
    /// Heuristic point-size estimate, see [`ReconstructConfig`].
    pub font_size: u32,
    pub color: String,
    pub kind: ObjectKind,
    pub x: i32,
    pub y: i32,
    pub confidence: i32,
}

/// Glyphs recognised from a single source image, plus the transformed
/// raster they came from (used for colour sampling).
#[derive(Debug, Clone, Copy)]
pub struct ImageGlyphs<'a> {
    pub glyphs: &'a [GlyphRecord],
    pub image: Option<&'a RgbImage>,
}

impl<'a> ImageGlyphs<'a> {
    pub fn new(glyphs: &'a [GlyphRecord], image: Option<&'a RgbImage>) -> Self {
        Self { glyphs, image }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconstruction {
    pub text: String,
    /// Reading order.
    pub words: Vec<WordEntry>,
}

pub struct TextReconstructor<'a> {
    config: ReconstructConfig,
    mapper: CoordinateMapper,
    colors: &'a ColorNamer,
}

impl<'a> TextReconstructor<'a> {
    pub fn new(config: ReconstructConfig, mapper: CoordinateMapper, colors: &'a ColorNamer) -> Self {
        Self {
            config,
            mapper,
            colors,
        }
    }

    /// Reconstruct text and words from several images, in capture order.
    pub fn reconstruct(&self, images: &[ImageGlyphs<'_>]) -> Reconstruction {
        let mut raw = String::new();
        let mut words = Vec::new();

        for image in images {
            raw.push_str(&self.image_text(image, &mut words));
        }

        Reconstruction {
            text: clean_text(&raw),
            words,
        }
    }

    /// Single image without a raster; colour labels come out as "unknown".
    pub fn reconstruct_glyphs(&self, glyphs: &[GlyphRecord]) -> Reconstruction {
        self.reconstruct(&[ImageGlyphs::new(glyphs, None)])
    }

    /// Raw text for one image. Ends with a newline when anything was emitted.
    fn image_text(&self, image: &ImageGlyphs<'_>, words: &mut Vec<WordEntry>) -> String {
        let mut text = String::new();
        let mut previous: Option<LayoutKey> = None;

        for glyph in image.glyphs.iter().filter(|g| !g.is_blank()) {
            let key = glyph.layout_key();
            match previous {
                Some(prev) if prev != key => text.push('\n'),
                Some(_) => text.push(' '),
                None => {}
            }
            text.push_str(&glyph.text);
            previous = Some(key);

            if self.config.build_word_list {
                words.push(self.word_entry(glyph, image.image));
            }
        }

        if previous.is_some() {
            text.push('\n');
        }
        text
    }

    fn word_entry(&self, glyph: &GlyphRecord, image: Option<&RgbImage>) -> WordEntry {
        let (cx, cy) = glyph.bbox.center();
        let (sx, sy) = self.mapper.to_screen(f64::from(cx), f64::from(cy));

        WordEntry {
            text: glyph.text.clone(),
            font_size: self.font_size(glyph.bbox.height),
            color: self.colors.describe(&glyph.bbox, image),
            kind: ObjectKind::Text,
            // Anchors are stored as integers and truncate like them.
            x: sx as i32,
            y: sy as i32,
            confidence: glyph.confidence as i32,
        }
    }

    fn font_size(&self, height: i32) -> u32 {
        let divisor = if self.config.font_height_divisor > 0.0 {
            self.config.font_height_divisor
        } else {
            1.0
        };
        let estimate = f64::from(height.max(0)) / divisor * self.config.font_size_factor;
        estimate.round_ties_even() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BoundingBox;
    use image::Rgb;

    fn glyph(text: &str, key: (u32, u32, u32, u32)) -> GlyphRecord {
        GlyphRecord {
            text: text.to_string(),
            bbox: BoundingBox::new(30, 60, 90, 45),
            page: key.0,
            block: key.1,
            paragraph: key.2,
            line: key.3,
            confidence: 93.7,
        }
    }

    fn reconstruct(glyphs: &[GlyphRecord]) -> Reconstruction {
        let colors = ColorNamer::disabled();
        TextReconstructor::new(ReconstructConfig::default(), CoordinateMapper::default(), &colors)
            .reconstruct_glyphs(glyphs)
    }

    #[test]
    fn breaks_lines_when_the_layout_key_changes() {
        let glyphs = vec![glyph("Hello", (1, 1, 1, 1)), glyph("World", (1, 1, 1, 2))];
        assert_eq!(reconstruct(&glyphs).text, "Hello\nWorld");
    }

    #[test]
    fn joins_same_line_with_single_spaces() {
        let glyphs = vec![
            glyph("one", (1, 1, 1, 1)),
            glyph("two", (1, 1, 1, 1)),
            glyph("three", (1, 1, 2, 1)),
            glyph("four", (1, 2, 1, 1)),
        ];
        assert_eq!(reconstruct(&glyphs).text, "one two\nthree\nfour");
    }

    #[test]
    fn blank_glyphs_are_skipped_entirely() {
        let glyphs = vec![
            glyph("", (1, 0, 0, 0)),
            glyph("left", (1, 1, 1, 1)),
            glyph("   ", (1, 1, 1, 2)),
            glyph("right", (1, 1, 1, 1)),
        ];
        let result = reconstruct(&glyphs);
        assert_eq!(result.text, "left right");
        assert_eq!(result.words.len(), 2);
    }

    #[test]
    fn each_image_ends_its_own_line() {
        let first = vec![glyph("A", (1, 1, 1, 1)), glyph("B", (1, 1, 1, 1))];
        let second = vec![glyph("C", (1, 1, 1, 1))];
        let colors = ColorNamer::disabled();
        let reconstructor =
            TextReconstructor::new(ReconstructConfig::default(), CoordinateMapper::default(), &colors);
        let result = reconstructor.reconstruct(&[
            ImageGlyphs::new(&first, None),
            ImageGlyphs::new(&second, None),
        ]);
        assert_eq!(result.text, "A B\nC");
        assert_eq!(result.words.len(), 3);
    }

    #[test]
    fn empty_input_produces_nothing() {
        let result = reconstruct(&[]);
        assert!(result.text.is_empty());
        assert!(result.words.is_empty());
    }

    #[test]
    fn word_entries_carry_mapped_anchor_and_estimates() {
        let colors = ColorNamer::disabled();
        let mapper = CoordinateMapper::new(3.0, 100.0, 50.0);
        let reconstructor = TextReconstructor::new(ReconstructConfig::default(), mapper, &colors);
        let result = reconstructor.reconstruct_glyphs(&[glyph("Save", (1, 1, 1, 1))]);

        let word = &result.words[0];
        assert_eq!(word.text, "Save");
        // Centre (75, 82) in raster space.
        assert_eq!((word.x, word.y), (125, 77));
        // 45 / 3 * 0.78 = 11.7
        assert_eq!(word.font_size, 12);
        assert_eq!(word.color, "unknown");
        assert_eq!(word.kind, ObjectKind::Text);
        assert_eq!(word.confidence, 93);
    }

    #[test]
    fn anchors_truncate_instead_of_rounding() {
        let colors = ColorNamer::disabled();
        // Centre (75, 82) / 2 + (0.2, 0.6) = (37.7, 41.6).
        let mapper = CoordinateMapper::new(2.0, 0.2, 0.6);
        let reconstructor = TextReconstructor::new(ReconstructConfig::default(), mapper, &colors);
        let result = reconstructor.reconstruct_glyphs(&[glyph("Open", (1, 1, 1, 1))]);

        assert_eq!((result.words[0].x, result.words[0].y), (37, 41));
    }

    #[test]
    fn colour_labels_sample_the_transformed_raster() {
        let raster = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        let colors = ColorNamer::new(2);
        let reconstructor =
            TextReconstructor::new(ReconstructConfig::default(), CoordinateMapper::default(), &colors);
        let glyphs = vec![glyph("Paper", (1, 1, 1, 1))];
        let result = reconstructor.reconstruct(&[ImageGlyphs::new(&glyphs, Some(&raster))]);
        assert_eq!(result.words[0].color, "white: 100%");
    }

    #[test]
    fn word_list_can_be_skipped() {
        let colors = ColorNamer::disabled();
        let config = ReconstructConfig {
            build_word_list: false,
            ..ReconstructConfig::default()
        };
        let reconstructor = TextReconstructor::new(config, CoordinateMapper::default(), &colors);
        let result = reconstructor.reconstruct_glyphs(&[glyph("x", (1, 1, 1, 1))]);
        assert_eq!(result.text, "x");
        assert!(result.words.is_empty());
    }

    /// Deterministic glyph streams with monotonically increasing layout keys.
    fn generated_streams() -> Vec<Vec<GlyphRecord>> {
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed % bound
        };
        let words = ["alpha", "beta", "gamma", "delta", "  ", "", "eps\t"];

        (0..64)
            .map(|_| {
                let mut key = (1u32, 1u32, 1u32, 1u32);
                (0..next(40))
                    .map(|_| {
                        match next(6) {
                            0 => key.3 += 1,
                            1 => key = (key.0, key.1, key.2 + 1, 1),
                            2 => key = (key.0, key.1 + 1, 1, 1),
                            _ => {}
                        }
                        glyph(words[next(words.len() as u64) as usize], key)
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn output_never_contains_doubled_whitespace_or_blank_lines() {
        for glyphs in generated_streams() {
            let text = reconstruct(&glyphs).text;
            assert!(!text.ends_with('\n'), "{text:?}");
            assert!(!text.starts_with('\n'), "{text:?}");
            assert!(!text.contains("\n\n"), "{text:?}");
            let chars: Vec<char> = text.chars().collect();
            for pair in chars.windows(2) {
                let doubled = pair.iter().all(|c| c.is_whitespace() && *c != '\n');
                assert!(!doubled, "{text:?}");
            }
        }
    }

    #[test]
    fn line_breaks_match_layout_transitions() {
        for glyphs in generated_streams() {
            let emitted: Vec<&GlyphRecord> = glyphs.iter().filter(|g| !g.is_blank()).collect();
            let transitions = emitted
                .windows(2)
                .filter(|pair| pair[0].layout_key() != pair[1].layout_key())
                .count();
            let text = reconstruct(&glyphs).text;
            assert_eq!(text.matches('\n').count(), transitions, "{text:?}");
        }
    }
}
