//! Training target assignment.

mod dense;
mod detect;
mod rpn;
mod sampling;

pub use dense::*;
pub use detect::*;
pub use rpn::*;

use crate::common::*;

/// The tag that marks an output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleTag {
    Positive,
    Negative,
    Padding,
}

impl SampleTag {
    /// The value stored in the tag channel.
    pub fn value(&self) -> i64 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
            Self::Padding => 0,
        }
    }

    pub fn from_value(value: i64) -> Result<Self> {
        let tag = match value {
            1 => Self::Positive,
            -1 => Self::Negative,
            0 => Self::Padding,
            _ => bail!("invalid sample tag {}", value),
        };
        Ok(tag)
    }
}

/// Computes the training targets of one image.
///
/// Implementations are pure functions of the ground truth, the candidates
/// and the random source, so images can be assigned concurrently.
pub trait TargetAssigner: Sync {
    /// The candidate boxes that ground truth is matched against.
    type Candidates: ?Sized + Sync;
    /// The per-image targets.
    type Output: Send;

    fn assign<R>(
        &self,
        gt: &PaddedLabels,
        candidates: &Self::Candidates,
        rng: &mut R,
    ) -> Result<Self::Output>
    where
        R: Rng + ?Sized;
}

/// Match quality statistics of one image. They are meant for monitoring and
/// carry no gradient.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Diagnostics {
    pub gt_count: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    /// The number of ground truth boxes without any positive candidate in
    /// the final output.
    pub unmatched_gt_count: usize,
    /// The minimum over ground truth boxes of their best IoU. It is zero
    /// without ground truth or candidates.
    pub min_best_iou: f64,
}
