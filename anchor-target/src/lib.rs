//! Anchor generation and training target assignment for two-stage and
//! single-stage object detectors.

mod common;
pub mod anchor;
pub mod batch;
pub mod config;
pub mod geometry;
pub mod ratio;
pub mod target;

pub use anchor::*;
pub use batch::*;
pub use geometry::*;
pub use ratio::*;
pub use target::*;

pub use bbox::{AreaConvention, BoxCoder, BoxCoderInit, Rect, RectFloat, RectNum, HW, TLBR};
pub use label::{GroundTruth, Label, PaddedBoxes, PaddedLabels, Slot};
