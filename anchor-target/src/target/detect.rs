use super::{
    sampling::{sample_candidates, SamplePolicy, ThresholdBound},
    Diagnostics, TargetAssigner,
};
use crate::{common::*, ratio::Ratio};

/// Proposal targets of a second-stage detection head.
///
/// It follows the same matching rules as the anchor targets but samples
/// among padded region proposals and returns the sampled boxes. A proposal
/// reaching the positive threshold is positive.
#[derive(Debug, Clone, Default)]
pub struct ProposalTargetAssignerInit {
    /// Defaults to 0.5.
    pub positive_overlap_threshold: Option<Ratio>,
    /// Defaults to 0.5.
    pub negative_overlap_threshold: Option<Ratio>,
    /// The number of sampled proposals per image, 200 by default.
    pub train_samples_per_image: Option<usize>,
    /// Defaults to 0.33.
    pub positive_ratio: Option<Ratio>,
    pub coder: Option<BoxCoder>,
}

impl ProposalTargetAssignerInit {
    pub fn build(self) -> Result<ProposalTargetAssigner> {
        let Self {
            positive_overlap_threshold,
            negative_overlap_threshold,
            train_samples_per_image,
            positive_ratio,
            coder,
        } = self;

        let policy = SamplePolicy::new(
            positive_overlap_threshold.unwrap_or(Ratio::try_from(0.5)?),
            ThresholdBound::Inclusive,
            negative_overlap_threshold.unwrap_or(Ratio::try_from(0.5)?),
            train_samples_per_image.unwrap_or(200),
            positive_ratio.unwrap_or(Ratio::try_from(0.33)?),
        )?;
        let coder = match coder {
            Some(coder) => coder,
            None => BoxCoderInit::default().build()?,
        };

        Ok(ProposalTargetAssigner { policy, coder })
    }
}

#[derive(Debug, Clone)]
pub struct ProposalTargetAssigner {
    policy: SamplePolicy,
    coder: BoxCoder,
}

impl ProposalTargetAssigner {
    pub fn train_samples_per_image(&self) -> usize {
        self.policy.budget
    }

    pub fn coder(&self) -> &BoxCoder {
        &self.coder
    }
}

/// The sampled proposal targets of one image, with `train_samples_per_image`
/// rows each.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalTargets {
    /// `[budget, (dy, dx, dh, dw, tag)]`
    pub deltas: Array2<f64>,
    /// `[budget, (class, tag)]`
    pub class_ids: Array2<i64>,
    /// `[budget, (y1, x1, y2, x2, tag)]`
    pub rois: Array2<f64>,
    pub diagnostics: Diagnostics,
}

impl TargetAssigner for ProposalTargetAssigner {
    type Candidates = PaddedBoxes;
    type Output = ProposalTargets;

    fn assign<R>(
        &self,
        gt: &PaddedLabels,
        proposals: &PaddedBoxes,
        rng: &mut R,
    ) -> Result<ProposalTargets>
    where
        R: Rng + ?Sized,
    {
        let labels = gt.strip_padding();
        let gt_boxes: Vec<_> = labels.iter().map(|label| label.rect.clone()).collect();
        let proposals = proposals.strip_padding();
        let sampled = sample_candidates(
            &self.policy,
            &gt_boxes,
            &proposals,
            self.coder.area(),
            rng,
        );

        let budget = self.policy.budget;
        let (deltas, class_ids) = sampled.encode(budget, &self.coder, &labels, &proposals);
        let mut rois = Array2::zeros((budget, 5));
        sampled.rows().for_each(|(row, sample)| {
            let [t, l, b, r] = proposals[sample.candidate()].tlbr();
            let tag = sample.tag().value() as f64;
            rois.slice_mut(s![row, ..])
                .iter_mut()
                .zip([t, l, b, r, tag])
                .for_each(|(dst, src)| *dst = src);
        });

        Ok(ProposalTargets {
            deltas,
            class_ids,
            rois,
            diagnostics: sampled.diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposals_are_sampled_as_rois() {
        let assigner = ProposalTargetAssignerInit {
            train_samples_per_image: Some(6),
            ..Default::default()
        }
        .build()
        .unwrap();

        let gt = PaddedLabels::new(
            vec![GroundTruth::try_new([10.0, 10.0, 50.0, 50.0], 4).unwrap()],
            3,
        )
        .unwrap();
        let proposals = PaddedBoxes::new(
            vec![
                TLBR::from_tlbr([12.0, 10.0, 50.0, 52.0]),
                TLBR::from_tlbr([100.0, 100.0, 120.0, 120.0]),
                TLBR::from_tlbr([30.0, 30.0, 70.0, 70.0]),
            ],
            8,
        )
        .unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let targets = assigner.assign(&gt, &proposals, &mut rng).unwrap();
        assert_eq!(targets.rois.shape(), &[6, 5]);
        assert_eq!(targets.deltas.shape(), &[6, 5]);

        // positive cap is floor(6 * 0.33) = 1
        assert_eq!(targets.diagnostics.positive_count, 1);
        assert_eq!(targets.class_ids[[0, 0]], 4);
        assert_eq!(targets.class_ids[[0, 1]], 1);
        assert_eq!(
            targets.rois.row(0).to_vec(),
            vec![12.0, 10.0, 50.0, 52.0, 1.0]
        );

        // the far proposal and the one at IoU ~0.14 are negatives
        assert_eq!(targets.diagnostics.negative_count, 2);
        assert!(targets.rois.column(4).iter().skip(3).all(|&tag| tag == 0.0));
        assert!(targets.deltas.slice(s![1..3, 0..4]).iter().all(|&val| val == 0.0));
        assert!(targets.class_ids.slice(s![1..3, 0]).iter().all(|&val| val == 0));
    }

    #[test]
    fn proposal_at_positive_threshold_is_positive() {
        let assigner = ProposalTargetAssignerInit {
            train_samples_per_image: Some(8),
            positive_ratio: Some(Ratio::try_from(0.5).unwrap()),
            ..Default::default()
        }
        .build()
        .unwrap();

        let gt = PaddedLabels::new(
            vec![GroundTruth::try_new([0.0, 0.0, 10.0, 10.0], 2).unwrap()],
            1,
        )
        .unwrap();
        let proposals = PaddedBoxes::new(
            vec![
                TLBR::from_tlbr([0.0, 0.0, 10.0, 10.0]),
                // IoU exactly 0.5
                TLBR::from_tlbr([0.0, 0.0, 10.0, 5.0]),
                TLBR::from_tlbr([40.0, 40.0, 50.0, 50.0]),
            ],
            4,
        )
        .unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let targets = assigner.assign(&gt, &proposals, &mut rng).unwrap();
        assert_eq!(targets.diagnostics.positive_count, 2);
        assert_eq!(targets.diagnostics.negative_count, 1);
        assert_eq!(targets.class_ids.slice(s![0..2, 0]).to_vec(), vec![2, 2]);
        assert_eq!(targets.rois.row(2).to_vec(), vec![40.0, 40.0, 50.0, 50.0, -1.0]);
    }

    #[test]
    fn padding_only_proposals() {
        let assigner = ProposalTargetAssignerInit::default().build().unwrap();
        let gt = PaddedLabels::new(
            vec![GroundTruth::try_new([10.0, 10.0, 50.0, 50.0], 1).unwrap()],
            2,
        )
        .unwrap();
        let proposals = PaddedBoxes::new(vec![], 16).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let targets = assigner.assign(&gt, &proposals, &mut rng).unwrap();

        assert_eq!(targets.rois.shape(), &[200, 5]);
        assert!(targets.rois.iter().all(|&val| val == 0.0));
        assert_eq!(targets.diagnostics.unmatched_gt_count, 1);
    }
}
