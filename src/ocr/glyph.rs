use serde::{Deserialize, Serialize};

/// Axis-aligned box in raster pixels of the image handed to the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Raster-space centre, truncated to whole pixels.
    pub fn center(&self) -> (i32, i32) {
        (self.left + self.width / 2, self.top + self.height / 2)
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }

    pub fn is_malformed(&self) -> bool {
        self.width < 0 || self.height < 0
    }
}

/// Position of a glyph in the engine's page/block/paragraph/line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayoutKey {
    pub page: u32,
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
}

/// One recognised token as reported by the OCR engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphRecord {
    pub text: String,
    pub bbox: BoundingBox,
    pub page: u32,
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
    /// 0-100; engines report -1 for structural rows without text.
    pub confidence: f32,
}

impl GlyphRecord {
    pub fn layout_key(&self) -> LayoutKey {
        LayoutKey {
            page: self.page,
            block: self.block,
            paragraph: self.paragraph,
            line: self.line,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
