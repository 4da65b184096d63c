use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};

use super::engine::OcrEngine;
use super::glyph::GlyphRecord;
use super::preprocess::Preprocess;
use crate::color::ColorNamer;
use crate::reconstruct::{
    CoordinateMapper, ImageGlyphs, ReconstructConfig, TextReconstructor, WordEntry,
};
use crate::settings::UserSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone)]
pub struct OcrOutput {
    pub text: String,
    pub words: Vec<WordEntry>,
    /// The preprocessed rasters, in capture order.
    pub images: Vec<DynamicImage>,
}

/// Capture images -> preprocess -> engine -> reconstruction.
pub struct OcrPipeline<E: OcrEngine> {
    engine: E,
    preprocess: Preprocess,
    colors: ColorNamer,
    config: ReconstructConfig,
}

impl<E: OcrEngine> OcrPipeline<E> {
    pub fn new(engine: E, preprocess: Preprocess, colors: ColorNamer, config: ReconstructConfig) -> Self {
        Self {
            engine,
            preprocess,
            colors,
            config,
        }
    }

    pub fn from_settings(engine: E, settings: &UserSettings) -> Self {
        Self::new(
            engine,
            Preprocess::from(&settings.ocr),
            ColorNamer::from_settings(&settings.color),
            ReconstructConfig::default(),
        )
    }

    pub fn set_build_word_list(&mut self, enabled: bool) {
        self.config.build_word_list = enabled;
    }

    /// Run OCR over `images`, whose top-left corner sits at `offset` on screen.
    pub fn process(&self, images: &[DynamicImage], offset: (f64, f64)) -> Result<OcrOutput> {
        log_info!("OCR started for {} image(s)", images.len());

        let transformed: Vec<DynamicImage> =
            images.iter().map(|img| self.preprocess.apply(img)).collect();

        let mut glyph_sets: Vec<Vec<GlyphRecord>> = Vec::with_capacity(transformed.len());
        for (index, image) in transformed.iter().enumerate() {
            let glyphs = self
                .engine
                .recognize(image)
                .with_context(|| format!("OCR failed on image {}", index + 1))?;
            log_debug!("image {}: {} glyph rows", index + 1, glyphs.len());
            glyph_sets.push(glyphs);
        }

        // Colour sampling needs RGB; skip the conversion when it is off.
        let sample_colors = self.config.build_word_list && self.colors.is_enabled();
        let rasters: Vec<Option<RgbImage>> = transformed
            .iter()
            .map(|img| sample_colors.then(|| img.to_rgb8()))
            .collect();

        let per_image: Vec<ImageGlyphs<'_>> = glyph_sets
            .iter()
            .zip(rasters.iter())
            .map(|(glyphs, raster)| ImageGlyphs::new(glyphs, raster.as_ref()))
            .collect();

        let mapper = CoordinateMapper::new(f64::from(self.preprocess.scale_factor), offset.0, offset.1);
        let reconstructor = TextReconstructor::new(self.config.clone(), mapper, &self.colors);
        let reconstruction = reconstructor.reconstruct(&per_image);

        log_info!(
            "OCR complete: {} words, {} characters",
            reconstruction.words.len(),
            reconstruction.text.len()
        );

        Ok(OcrOutput {
            text: reconstruction.text,
            words: reconstruction.words,
            images: transformed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BoundingBox;
    use anyhow::bail;
    use std::sync::Mutex;

    /// Returns one canned glyph list per call and records the image sizes it saw.
    struct CannedEngine {
        responses: Mutex<Vec<Vec<GlyphRecord>>>,
        seen: Mutex<Vec<(u32, u32)>>,
    }

    impl CannedEngine {
        fn new(mut responses: Vec<Vec<GlyphRecord>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl OcrEngine for CannedEngine {
        fn recognize(&self, image: &DynamicImage) -> Result<Vec<GlyphRecord>> {
            self.seen.lock().unwrap().push((image.width(), image.height()));
            Ok(self.responses.lock().unwrap().pop().unwrap_or_default())
        }
    }

    struct FailingEngine;

    impl OcrEngine for FailingEngine {
        fn recognize(&self, _image: &DynamicImage) -> Result<Vec<GlyphRecord>> {
            bail!("engine unavailable")
        }
    }

    fn word(text: &str, line: u32, left: i32) -> GlyphRecord {
        GlyphRecord {
            text: text.into(),
            bbox: BoundingBox::new(left, 0, 30, 30),
            page: 1,
            block: 1,
            paragraph: 1,
            line,
            confidence: 90.0,
        }
    }

    #[test]
    fn scales_images_and_maps_words_back_to_screen() {
        let engine = CannedEngine::new(vec![
            vec![word("File", 1, 0), word("Edit", 1, 60)],
            vec![word("Help", 1, 30)],
        ]);
        let pipeline = OcrPipeline::new(
            engine,
            Preprocess::default(),
            ColorNamer::disabled(),
            ReconstructConfig::default(),
        );
        let images = vec![DynamicImage::new_rgb8(40, 20), DynamicImage::new_rgb8(10, 10)];

        let output = pipeline.process(&images, (200.0, 100.0)).unwrap();

        assert_eq!(output.text, "File Edit\nHelp");
        assert_eq!(output.images.len(), 2);
        assert_eq!(*pipeline.engine.seen.lock().unwrap(), vec![(120, 60), (30, 30)]);

        // Centre (75, 15) / 3 + offset.
        let edit = &output.words[1];
        assert_eq!((edit.x, edit.y), (225, 105));
    }

    #[test]
    fn colours_are_sampled_when_enabled() {
        let engine = CannedEngine::new(vec![vec![word("Dark", 1, 0)]]);
        let mut settings = UserSettings::default();
        settings.color.enabled = true;
        settings.ocr.scale_factor = 1;
        let pipeline = OcrPipeline::from_settings(engine, &settings);

        let output = pipeline
            .process(&[DynamicImage::new_rgb8(64, 64)], (0.0, 0.0))
            .unwrap();
        assert_eq!(output.words[0].color, "black: 100%");
    }

    #[test]
    fn headless_runs_skip_the_word_list() {
        let engine = CannedEngine::new(vec![vec![word("only", 1, 0)]]);
        let mut pipeline = OcrPipeline::from_settings(engine, &UserSettings::default());
        pipeline.set_build_word_list(false);

        let output = pipeline
            .process(&[DynamicImage::new_rgb8(8, 8)], (0.0, 0.0))
            .unwrap();
        assert_eq!(output.text, "only");
        assert!(output.words.is_empty());
    }

    #[test]
    fn engine_failures_propagate_with_context() {
        let pipeline = OcrPipeline::from_settings(FailingEngine, &UserSettings::default());
        let err = pipeline
            .process(&[DynamicImage::new_rgb8(8, 8)], (0.0, 0.0))
            .unwrap_err();
        assert!(format!("{err:#}").contains("engine unavailable"));
    }
}
