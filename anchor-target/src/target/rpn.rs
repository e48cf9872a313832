use super::{
    sampling::{sample_candidates, SamplePolicy, ThresholdBound},
    Diagnostics, TargetAssigner,
};
use crate::{anchor::AnchorSet, common::*, ratio::Ratio};

/// Anchor targets of a region proposal network.
///
/// Anchors overlapping ground truth by more than the positive threshold are
/// positive, together with the best anchor of each ground truth box.
/// Anchors below the negative threshold are negative and the rest are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct AnchorTargetAssignerInit {
    /// Defaults to 0.7.
    pub positive_overlap_threshold: Option<Ratio>,
    /// Defaults to 0.3.
    pub negative_overlap_threshold: Option<Ratio>,
    /// The number of sampled anchors per image, 256 by default.
    pub train_samples_per_image: Option<usize>,
    /// Defaults to 0.5.
    pub positive_ratio: Option<Ratio>,
    /// Defaults to the continuous convention with std `[0.1, 0.1, 0.2, 0.2]`.
    pub coder: Option<BoxCoder>,
}

impl AnchorTargetAssignerInit {
    pub fn build(self) -> Result<AnchorTargetAssigner> {
        let Self {
            positive_overlap_threshold,
            negative_overlap_threshold,
            train_samples_per_image,
            positive_ratio,
            coder,
        } = self;

        let policy = SamplePolicy::new(
            positive_overlap_threshold.unwrap_or(Ratio::try_from(0.7)?),
            ThresholdBound::Exclusive,
            negative_overlap_threshold.unwrap_or(Ratio::try_from(0.3)?),
            train_samples_per_image.unwrap_or(256),
            positive_ratio.unwrap_or(Ratio::try_from(0.5)?),
        )?;
        let coder = match coder {
            Some(coder) => coder,
            None => BoxCoderInit::default().build()?,
        };

        Ok(AnchorTargetAssigner { policy, coder })
    }
}

#[derive(Debug, Clone)]
pub struct AnchorTargetAssigner {
    policy: SamplePolicy,
    coder: BoxCoder,
}

impl AnchorTargetAssigner {
    pub fn train_samples_per_image(&self) -> usize {
        self.policy.budget
    }

    pub fn coder(&self) -> &BoxCoder {
        &self.coder
    }
}

/// The sampled anchor targets of one image.
///
/// Every array has exactly `train_samples_per_image` rows, positives first,
/// then negatives, then padding. The last column is the [SampleTag](super::SampleTag)
/// value of the row.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorTargets {
    /// `[budget, (dy, dx, dh, dw, tag)]`
    pub deltas: Array2<f64>,
    /// `[budget, (class, tag)]`
    pub class_ids: Array2<i64>,
    /// `[budget, (anchor_index, tag)]`
    pub indices: Array2<i64>,
    pub diagnostics: Diagnostics,
}

impl TargetAssigner for AnchorTargetAssigner {
    type Candidates = AnchorSet;
    type Output = AnchorTargets;

    fn assign<R>(
        &self,
        gt: &PaddedLabels,
        anchors: &AnchorSet,
        rng: &mut R,
    ) -> Result<AnchorTargets>
    where
        R: Rng + ?Sized,
    {
        let labels = gt.strip_padding();
        let gt_boxes: Vec<_> = labels.iter().map(|label| label.rect.clone()).collect();
        let sampled = sample_candidates(
            &self.policy,
            &gt_boxes,
            anchors.boxes(),
            self.coder.area(),
            rng,
        );

        let budget = self.policy.budget;
        let (deltas, class_ids) = sampled.encode(budget, &self.coder, &labels, anchors.boxes());
        let mut indices = Array2::zeros((budget, 2));
        sampled.rows().for_each(|(row, sample)| {
            indices[[row, 0]] = sample.candidate() as i64;
            indices[[row, 1]] = sample.tag().value();
        });

        Ok(AnchorTargets {
            deltas,
            class_ids,
            indices,
            diagnostics: sampled.diagnostics,
        })
    }
}
