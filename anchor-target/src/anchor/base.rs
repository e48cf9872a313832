use crate::common::*;

/// The formula that turns a (ratio, scale) pair into an anchor shape.
///
/// `ratio` is always height over width. Both variants produce anchors with
/// area `(base_size * scale)^2`, but they are computed along different
/// paths and are not bitwise interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorShape {
    /// `h = sqrt(ratio) * scale * base_size`, `w = scale * base_size / sqrt(ratio)`.
    SqrtRatio,
    /// `w = sqrt((base_size * scale)^2 / ratio)`, `h = w * ratio`.
    AreaPreserving,
}

impl AnchorShape {
    /// Compute `(height, width)` of the anchor.
    pub fn height_width(&self, base_size: f64, ratio: f64, scale: f64) -> (f64, f64) {
        match self {
            Self::SqrtRatio => {
                let h = ratio.sqrt() * scale * base_size;
                let w = 1.0 / ratio.sqrt() * scale * base_size;
                (h, w)
            }
            Self::AreaPreserving => {
                let side = base_size * scale;
                let area = side * side;
                let w = (area / ratio).sqrt();
                let h = w * ratio;
                (h, w)
            }
        }
    }
}

pub(crate) fn check_positive(name: &str, values: &[f64]) -> Result<()> {
    ensure!(!values.is_empty(), "{} must not be empty", name);
    ensure!(
        values.iter().all(|val| val.is_finite() && *val > 0.0),
        "{} must be positive finite numbers, but get {:?}",
        name,
        values
    );
    Ok(())
}

/// Generate the anchors of one grid cell, centered at the origin.
///
/// It yields `ratios.len() * scales.len()` boxes, iterating ratios in the
/// outer loop and scales in the inner loop.
pub fn generate_base_anchors(
    base_size: f64,
    ratios: &[f64],
    scales: &[f64],
    shape: AnchorShape,
) -> Result<Vec<TLBR<f64>>> {
    ensure!(
        base_size.is_finite() && base_size > 0.0,
        "base_size must be positive, but get {}",
        base_size
    );
    check_positive("ratios", ratios)?;
    check_positive("scales", scales)?;

    iproduct!(ratios, scales)
        .map(|(&ratio, &scale)| {
            let (h, w) = shape.height_width(base_size, ratio, scale);
            TLBR::try_from_tlbr([-0.5 * h, -0.5 * w, 0.5 * h, 0.5 * w])
        })
        .collect()
}
