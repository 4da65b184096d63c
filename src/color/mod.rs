pub mod namer;
pub mod palette;

pub use namer::{ColorNamer, UNKNOWN_COLOR};
pub use palette::CSS3_PALETTE;
