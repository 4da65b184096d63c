pub mod engine;
pub mod glyph;
pub mod pipeline;
pub mod preprocess;

pub use engine::{parse_tsv, OcrEngine, TesseractEngine};
pub use glyph::{BoundingBox, GlyphRecord, LayoutKey};
pub use pipeline::{OcrOutput, OcrPipeline};
pub use preprocess::Preprocess;
