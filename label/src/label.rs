use crate::common::*;

/// A box with a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label<R, C>
where
    R: Rect,
{
    pub rect: R,
    pub class: C,
}

/// A ground truth record. Class `0` is reserved for the background.
pub type GroundTruth = Label<TLBR<f64>, usize>;

impl GroundTruth {
    /// Build a checked ground truth record from `(y1, x1, y2, x2)` and a
    /// foreground class.
    pub fn try_new(tlbr: [f64; 4], class: usize) -> Result<Self> {
        ensure!(
            tlbr.iter().all(|val| val.is_finite()),
            "box coordinates must be finite, but get {:?}",
            tlbr
        );
        ensure!(class != 0, "class 0 is reserved for the background");
        let rect = TLBR::try_from_tlbr(tlbr)?;
        Ok(Self { rect, class })
    }
}

/// The validity tag of an entry in a fixed-capacity container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot<T> {
    Valid(T),
    Padding,
}

impl<T> Slot<T> {
    /// The tag value on the array boundary, `1` for real entries and `0` for
    /// padding.
    pub fn tag(&self) -> i64 {
        match self {
            Self::Valid(_) => 1,
            Self::Padding => 0,
        }
    }

    pub fn valid(&self) -> Option<&T> {
        match self {
            Self::Valid(value) => Some(value),
            Self::Padding => None,
        }
    }

    pub fn is_padding(&self) -> bool {
        matches!(self, Self::Padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_truth_validation() {
        assert!(GroundTruth::try_new([10.0, 10.0, 20.0, 20.0], 1).is_ok());
        assert!(GroundTruth::try_new([10.0, 10.0, 20.0, 20.0], 0).is_err());
        assert!(GroundTruth::try_new([20.0, 10.0, 10.0, 20.0], 1).is_err());
        assert!(GroundTruth::try_new([0.0, 0.0, f64::INFINITY, 20.0], 1).is_err());
    }
}
