use super::{check_positive, generate_base_anchors, tile_anchors, AnchorProducer, AnchorSet, AnchorShape};
use crate::common::*;

/// Single-level anchor generator, the anchor layer of a Faster-RCNN
/// region proposal network.
#[derive(Debug, Clone)]
pub struct AnchorGeneratorInit {
    /// The anchor size at scale 1, e.g. 64.
    pub base_size: R64,
    /// Height over width ratios, e.g. `[0.5, 1, 2]`.
    pub ratios: Vec<R64>,
    /// Scaling factors, e.g. `[1, 2, 4]`.
    pub scales: Vec<R64>,
    /// The feature map stride, usually a quarter of the base size.
    pub stride: R64,
    pub shape: Option<AnchorShape>,
}

impl AnchorGeneratorInit {
    pub fn build(self) -> Result<AnchorGenerator> {
        let Self {
            base_size,
            ratios,
            scales,
            stride,
            shape,
        } = self;

        let shape = shape.unwrap_or(AnchorShape::SqrtRatio);
        let base_size = base_size.raw();
        let stride = stride.raw();
        let ratios: Vec<_> = ratios.into_iter().map(|val| val.raw()).collect();
        let scales: Vec<_> = scales.into_iter().map(|val| val.raw()).collect();
        check_positive("stride", &[stride])?;

        let base_anchors = generate_base_anchors(base_size, &ratios, &scales, shape)?;

        Ok(AnchorGenerator {
            base_size,
            stride,
            base_anchors,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AnchorGenerator {
    base_size: f64,
    stride: f64,
    base_anchors: Vec<TLBR<f64>>,
}

impl AnchorGenerator {
    pub fn base_anchors(&self) -> &[TLBR<f64>] {
        &self.base_anchors
    }

    pub fn stride(&self) -> f64 {
        self.stride
    }

    pub fn num_base_anchors(&self) -> usize {
        self.base_anchors.len()
    }

    /// The feature map size for the image size, rounding partial cells up.
    pub fn grid_size(&self, image_size: &HW<usize>) -> HW<usize> {
        let cells = |len: usize| (len as f64 / self.stride).ceil() as usize;
        HW::from_hw([cells(image_size.h()), cells(image_size.w())])
    }

    /// The number of anchors in shape `[grid.h() * grid.w() * num_base_anchors]`.
    pub fn num_anchors_for(&self, grid: &HW<usize>) -> usize {
        grid.area() * self.num_base_anchors()
    }

    /// Tile the base anchors over the feature map.
    pub fn generate(&self, grid: &HW<usize>) -> Result<Vec<TLBR<f64>>> {
        tile_anchors(grid, self.stride, &self.base_anchors)
    }
}

impl AnchorProducer for AnchorGenerator {
    fn produce(&self, image_size: &HW<usize>) -> Result<AnchorSet> {
        ensure!(
            image_size.h() > 0 && image_size.w() > 0,
            "image size must be positive, but get {:?}",
            image_size.hw()
        );

        let grid = self.grid_size(image_size);
        let mut set = AnchorSet::new(image_size.clone());
        set.push_level(0, grid, self.stride, self.base_size, &self.base_anchors)?;
        Ok(set)
    }
}
