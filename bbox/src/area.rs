use crate::common::*;

/// The rule that turns a pair of box coordinates into an extent.
///
/// The two conventions are not interchangeable. A box `[0, 0, 9, 9]` is
/// 9 units tall under [AreaConvention::Continuous] but covers 10 pixels
/// under [AreaConvention::PixelInclusive]. The convention changes IoU values
/// at the boundaries as well as the regression targets, so a detector must
/// stick to one of them for both anchor matching and box encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaConvention {
    /// Coordinates are continuous, the extent is `upper - lower`.
    Continuous,
    /// Coordinates index pixels and both ends are inclusive, the extent is
    /// `upper - lower + 1`.
    PixelInclusive,
}

impl AreaConvention {
    /// Compute the extent between two coordinates.
    pub fn extent<T>(&self, lower: T, upper: T) -> T
    where
        T: Float,
    {
        match self {
            Self::Continuous => upper - lower,
            Self::PixelInclusive => upper - lower + T::one(),
        }
    }

    /// Compute the center between two coordinates.
    pub fn center<T>(&self, lower: T, upper: T) -> T
    where
        T: Float,
    {
        let two = T::one() + T::one();
        lower + self.extent(lower, upper) / two
    }

    /// Compute the upper coordinate from the lower coordinate and the extent.
    pub fn upper<T>(&self, lower: T, extent: T) -> T
    where
        T: Float,
    {
        match self {
            Self::Continuous => lower + extent,
            Self::PixelInclusive => lower + extent - T::one(),
        }
    }
}

impl Default for AreaConvention {
    fn default() -> Self {
        Self::Continuous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pixel_inclusive_extent() {
        assert_abs_diff_eq!(AreaConvention::Continuous.extent(0.0, 9.0), 9.0);
        assert_abs_diff_eq!(AreaConvention::PixelInclusive.extent(0.0, 9.0), 10.0);
        assert_abs_diff_eq!(AreaConvention::PixelInclusive.center(0.0, 9.0), 5.0);
        assert_abs_diff_eq!(AreaConvention::PixelInclusive.upper(0.0, 10.0), 9.0);
    }
}
