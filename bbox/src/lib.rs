//! Safe bounding box types and functions.

mod common;

pub use area::*;
pub mod area;

pub use coder::*;
pub mod coder;

pub use rect::*;
pub mod rect;

pub use tlbr::*;
pub mod tlbr;

pub use hw::*;
pub mod hw;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat, RectNum};
}
