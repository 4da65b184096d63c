/// Tunable constants for text reconstruction.
#[derive(Debug, Clone)]
pub struct ReconstructConfig {
    /// Font size estimate: `round(height / font_height_divisor * font_size_factor)`.
    /// Both values are empirical and assume the default 3x upscale.
    pub font_height_divisor: f64,
    pub font_size_factor: f64,

    /// Build the per-word list; headless runs only need the text.
    pub build_word_list: bool,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            font_height_divisor: 3.0,
            font_size_factor: 0.78,
            build_word_list: true,
        }
    }
}
