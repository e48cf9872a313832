//! Ground truth records and fixed-capacity padded containers.

mod common;

pub use label::*;
mod label;

pub use padded::*;
mod padded;
