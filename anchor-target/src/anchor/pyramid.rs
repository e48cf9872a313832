use super::{check_positive, generate_base_anchors, AnchorProducer, AnchorSet, AnchorShape};
use crate::common::*;

/// Multi-level anchor generator for feature pyramid detectors.
#[derive(Debug, Clone, Default)]
pub struct PyramidAnchorGeneratorInit {
    /// Ascending pyramid levels, `[3, 4, 5, 6, 7]` by default.
    pub pyramid_levels: Option<Vec<usize>>,
    /// Base anchor size per level, `2^(p + 2)` by default.
    pub sizes: Option<Vec<R64>>,
    /// Stride per level, `2^p` by default.
    pub strides: Option<Vec<R64>>,
    /// Height over width ratios shared by all levels, `[0.5, 1, 2]` by default.
    pub ratios: Option<Vec<R64>>,
    /// Scales shared by all levels, `[1, 2^(1/3), 2^(2/3)]` by default.
    pub scales: Option<Vec<R64>>,
    pub shape: Option<AnchorShape>,
}

impl PyramidAnchorGeneratorInit {
    pub fn build(self) -> Result<PyramidAnchorGenerator> {
        let Self {
            pyramid_levels,
            sizes,
            strides,
            ratios,
            scales,
            shape,
        } = self;

        let pyramid_levels = pyramid_levels.unwrap_or_else(|| vec![3, 4, 5, 6, 7]);
        ensure!(!pyramid_levels.is_empty(), "pyramid_levels must not be empty");
        ensure!(
            pyramid_levels.windows(2).all(|pair| pair[0] < pair[1]),
            "pyramid_levels must be strictly ascending, but get {:?}",
            pyramid_levels
        );
        ensure!(
            pyramid_levels.iter().all(|&level| level < 32),
            "pyramid level must be less than 32"
        );

        let into_f64 = |values: Vec<R64>| -> Vec<f64> { values.into_iter().map(|val| val.raw()).collect() };
        let strides = strides.map(into_f64).unwrap_or_else(|| {
            pyramid_levels
                .iter()
                .map(|&level| 2f64.powi(level as i32))
                .collect()
        });
        let sizes = sizes.map(into_f64).unwrap_or_else(|| {
            pyramid_levels
                .iter()
                .map(|&level| 2f64.powi(level as i32 + 2))
                .collect()
        });
        let ratios = ratios
            .map(into_f64)
            .unwrap_or_else(|| vec![0.5, 1.0, 2.0]);
        let scales = scales
            .map(into_f64)
            .unwrap_or_else(|| vec![1.0, 2f64.powf(1.0 / 3.0), 2f64.powf(2.0 / 3.0)]);
        let shape = shape.unwrap_or(AnchorShape::AreaPreserving);

        ensure!(
            strides.len() == pyramid_levels.len(),
            "expect {} strides, but get {}",
            pyramid_levels.len(),
            strides.len()
        );
        ensure!(
            sizes.len() == pyramid_levels.len(),
            "expect {} sizes, but get {}",
            pyramid_levels.len(),
            sizes.len()
        );
        check_positive("strides", &strides)?;

        let levels = izip!(&pyramid_levels, &strides, &sizes)
            .map(|(&level, &stride, &base_size)| {
                let base_anchors = generate_base_anchors(base_size, &ratios, &scales, shape)?;
                Ok(PyramidLevel {
                    level,
                    stride,
                    base_size,
                    base_anchors,
                })
            })
            .collect::<Result<_>>()?;

        Ok(PyramidAnchorGenerator { levels })
    }
}

#[derive(Debug, Clone)]
struct PyramidLevel {
    level: usize,
    stride: f64,
    base_size: f64,
    base_anchors: Vec<TLBR<f64>>,
}

#[derive(Debug, Clone)]
pub struct PyramidAnchorGenerator {
    levels: Vec<PyramidLevel>,
}

impl PyramidAnchorGenerator {
    /// The feature map size of a pyramid level, i.e. the image size halved
    /// `level` times with rounding up.
    pub fn level_grid_size(image_size: &HW<usize>, level: usize) -> HW<usize> {
        (0..level).fold(image_size.clone(), |size, _| size.ceil_half())
    }

    pub fn pyramid_levels(&self) -> Vec<usize> {
        self.levels.iter().map(|level| level.level).collect()
    }

    /// The total number of anchors for the image size.
    pub fn num_anchors_for(&self, image_size: &HW<usize>) -> usize {
        self.levels
            .iter()
            .map(|level| {
                Self::level_grid_size(image_size, level.level).area() * level.base_anchors.len()
            })
            .sum()
    }
}

impl AnchorProducer for PyramidAnchorGenerator {
    fn produce(&self, image_size: &HW<usize>) -> Result<AnchorSet> {
        ensure!(
            image_size.h() > 0 && image_size.w() > 0,
            "image size must be positive, but get {:?}",
            image_size.hw()
        );

        let mut set = AnchorSet::new(image_size.clone());
        for level in &self.levels {
            let grid = Self::level_grid_size(image_size, level.level);
            set.push_level(
                level.level,
                grid,
                level.stride,
                level.base_size,
                &level.base_anchors,
            )?;
        }
        debug!(
            "generated {} anchors over {} levels for image size {:?}",
            set.len(),
            self.levels.len(),
            image_size.hw()
        );
        Ok(set)
    }
}

/// Generate the multi-scale anchor set of an image, concatenating levels in
/// ascending order.
pub fn anchors_for_image(
    image_size: &HW<usize>,
    init: PyramidAnchorGeneratorInit,
) -> Result<AnchorSet> {
    init.build()?.produce(image_size)
}
