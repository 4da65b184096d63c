pub mod algorithm;
pub mod cleanup;
pub mod config;
pub mod coords;

pub use algorithm::{ImageGlyphs, ObjectKind, Reconstruction, TextReconstructor, WordEntry};
pub use cleanup::clean_text;
pub use config::ReconstructConfig;
pub use coords::CoordinateMapper;
