//! Topic categories: label and term parsing and palette assignment

pub mod palette;
pub mod parser;

pub use palette::{Palette, PaletteEntry, build_palette};
pub use parser::{Category, CategorySet, parse_category_spec};
