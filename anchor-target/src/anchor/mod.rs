//! Anchor grid generation.

mod base;
mod cache;
mod generator;
mod grid;
mod pyramid;

pub use base::*;
pub use cache::*;
pub use generator::*;
pub use grid::*;
pub use pyramid::*;

use crate::common::*;

/// Produces the anchor set of an image.
///
/// Anchor indexes are positional contracts with the detector head, so an
/// implementation must return identical sets for identical sizes.
pub trait AnchorProducer {
    /// Generate anchors for an image of the given `[height, width]`.
    fn produce(&self, image_size: &HW<usize>) -> Result<AnchorSet>;
}

/// Describes one pyramid level inside an [AnchorSet].
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorLevel {
    /// The pyramid level number. Level `p` is downsampled by `2^p`.
    pub level: usize,
    /// The feature map size on this level.
    pub grid: HW<usize>,
    pub stride: f64,
    pub base_size: f64,
    /// The number of anchors per grid cell.
    pub num_base_anchors: usize,
    /// The anchor indexes covered by this level.
    pub range: Range<usize>,
}

/// An immutable, ordered set of anchors in `(y1, x1, y2, x2)` format.
///
/// Anchors are ordered by level, then grid row, then grid column, then
/// (ratio, scale) pair.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct AnchorSet {
    #[get = "pub"]
    boxes: Vec<TLBR<f64>>,
    #[get = "pub"]
    levels: Vec<AnchorLevel>,
    /// The image size the anchors were generated for.
    #[get = "pub"]
    image_size: HW<usize>,
}

impl AnchorSet {
    pub(crate) fn new(image_size: HW<usize>) -> Self {
        Self {
            boxes: vec![],
            levels: vec![],
            image_size,
        }
    }

    /// Append the anchors of a level.
    pub(crate) fn push_level(
        &mut self,
        level: usize,
        grid: HW<usize>,
        stride: f64,
        base_size: f64,
        base_anchors: &[TLBR<f64>],
    ) -> Result<()> {
        let start = self.boxes.len();
        self.boxes.extend(tile_anchors(&grid, stride, base_anchors)?);
        let end = self.boxes.len();

        self.levels.push(AnchorLevel {
            level,
            grid,
            stride,
            base_size,
            num_base_anchors: base_anchors.len(),
            range: start..end,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Find the level that contains the anchor index.
    pub fn level_of(&self, index: usize) -> Option<&AnchorLevel> {
        self.levels.iter().find(|level| level.range.contains(&index))
    }

    /// Build the `[len, 4]` array of anchors.
    pub fn to_array(&self) -> Array2<f64> {
        let mut array = Array2::zeros((self.len(), 4));
        array
            .outer_iter_mut()
            .zip(&self.boxes)
            .for_each(|(mut row, rect)| {
                row.iter_mut()
                    .zip(rect.tlbr())
                    .for_each(|(dst, src)| *dst = src);
            });
        array
    }
}

impl AsRef<[TLBR<f64>]> for AnchorSet {
    fn as_ref(&self) -> &[TLBR<f64>] {
        &self.boxes
    }
}

/// Either anchor generator, selected by configuration.
#[derive(Debug, Clone)]
pub enum AnyAnchorGenerator {
    Single(AnchorGenerator),
    Pyramid(PyramidAnchorGenerator),
}

impl AnchorProducer for AnyAnchorGenerator {
    fn produce(&self, image_size: &HW<usize>) -> Result<AnchorSet> {
        match self {
            Self::Single(generator) => generator.produce(image_size),
            Self::Pyramid(generator) => generator.produce(image_size),
        }
    }
}

impl From<AnchorGenerator> for AnyAnchorGenerator {
    fn from(from: AnchorGenerator) -> Self {
        Self::Single(from)
    }
}

impl From<PyramidAnchorGenerator> for AnyAnchorGenerator {
    fn from(from: PyramidAnchorGenerator) -> Self {
        Self::Pyramid(from)
    }
}
