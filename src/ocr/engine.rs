use std::io::{Cursor, Write};
use std::process::{Child, Command, Stdio};

use anyhow::{anyhow, bail, Context, Result};
use image::{DynamicImage, ImageFormat};

use super::glyph::{BoundingBox, GlyphRecord};
use crate::settings::OcrSettings;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Black-box recogniser: one image in, a flat reading-order glyph list out.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<GlyphRecord>>;
}

/// Runs the `tesseract` CLI and parses its TSV output.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    language: String,
    page_segmentation_mode: u8,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<String>, language: impl Into<String>, psm: u8) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            page_segmentation_mode: psm,
        }
    }

    pub fn from_settings(settings: &OcrSettings) -> Self {
        Self::new(
            settings.engine_binary.clone(),
            settings.language.clone(),
            settings.page_segmentation_mode,
        )
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<GlyphRecord>> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("failed to encode image for tesseract")?;

        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.language, "--psm"])
            .arg(self.page_segmentation_mode.to_string())
            .arg("tsv")
            // Tesseract refuses to start under some non-C numeric locales.
            .env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.binary))?;

        let streamed = match child.stdin.take() {
            Some(mut stdin) => stdin
                .write_all(&png)
                .context("failed to stream image to tesseract"),
            None => Err(anyhow!("tesseract stdin unavailable")),
        };
        if let Err(err) = streamed {
            reap(&mut child);
            return Err(err);
        }

        let output = child
            .wait_with_output()
            .context("failed to wait for tesseract")?;
        if !output.status.success() {
            bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        log_debug!("tesseract returned {} bytes of TSV", tsv.len());
        parse_tsv(&tsv)
    }
}

/// Kill a child we gave up on and collect its exit status.
fn reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        log_debug!("failed to kill tesseract: {err}");
    }
    if let Err(err) = child.wait() {
        log_debug!("failed to reap tesseract: {err}");
    }
}

/// Parse tesseract's `tsv` output format.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num, left,
/// top, width, height, conf, text. The header row and blank lines are
/// ignored; structural rows (empty text, conf -1) are kept.
pub fn parse_tsv(tsv: &str) -> Result<Vec<GlyphRecord>> {
    let mut glyphs = Vec::new();

    for (index, line) in tsv.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with("level") {
            continue;
        }

        let fields: Vec<&str> = line.splitn(12, '\t').collect();
        if fields.len() < 11 {
            bail!("tsv row {} has {} columns", index + 1, fields.len());
        }

        let int = |col: usize| -> Result<i32> {
            fields[col]
                .trim()
                .parse::<i32>()
                .with_context(|| format!("tsv row {} column {} is not an integer", index + 1, col + 1))
        };
        let id = |col: usize| -> Result<u32> {
            let value = int(col)?;
            u32::try_from(value)
                .map_err(|_| anyhow!("tsv row {} column {} is negative", index + 1, col + 1))
        };

        let confidence: f32 = fields[10]
            .trim()
            .parse()
            .with_context(|| format!("tsv row {} has invalid confidence", index + 1))?;

        glyphs.push(GlyphRecord {
            text: fields.get(11).map(|t| t.to_string()).unwrap_or_default(),
            bbox: BoundingBox::new(int(6)?, int(7)?, int(8)?, int(9)?),
            page: id(1)?,
            block: id(2)?,
            paragraph: id(3)?,
            line: id(4)?,
            confidence,
        });
    }

    Ok(glyphs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t600\t300\t-1\t
4\t1\t1\t1\t1\t0\t30\t36\t210\t42\t-1\t
5\t1\t1\t1\t1\t1\t30\t36\t96\t42\t96.418\tHello
5\t1\t1\t1\t1\t2\t140\t36\t100\t42\t91.02\tWorld
5\t1\t1\t1\t2\t1\t30\t90\t50\t40\t88\t,
";

    #[test]
    fn parses_word_and_structural_rows() {
        let glyphs = parse_tsv(SAMPLE).unwrap();
        assert_eq!(glyphs.len(), 5);

        let hello = &glyphs[2];
        assert_eq!(hello.text, "Hello");
        assert_eq!(hello.bbox, BoundingBox::new(30, 36, 96, 42));
        assert_eq!((hello.page, hello.block, hello.paragraph, hello.line), (1, 1, 1, 1));
        assert!((hello.confidence - 96.418).abs() < 1e-3);

        assert!(glyphs[0].is_blank());
        assert_eq!(glyphs[0].confidence, -1.0);
        assert_eq!(glyphs[4].text, ",");
        assert_eq!(glyphs[4].line, 2);
    }

    #[cfg(unix)]
    #[test]
    fn abandoned_child_is_killed_and_reaped() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::piped())
            .spawn()
            .unwrap();
        reap(&mut child);
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn rejects_truncated_rows() {
        let err = parse_tsv("5\t1\t1\t1\t1\n").unwrap_err();
        assert!(err.to_string().contains("columns"));
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let row = "5\t1\t1\t1\t1\t1\tx\t0\t1\t1\t90\tword\n";
        assert!(parse_tsv(row).is_err());
    }

    #[test]
    fn missing_binary_is_an_error() {
        let engine = TesseractEngine::new("/nonexistent/tesseract-binary", "eng", 4);
        let image = DynamicImage::new_rgb8(4, 4);
        assert!(engine.recognize(&image).is_err());
    }
}
