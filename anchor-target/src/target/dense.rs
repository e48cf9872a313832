use super::{Diagnostics, TargetAssigner};
use crate::{
    anchor::AnchorSet,
    common::*,
    geometry::{compute_iou, encode_regression_targets},
    ratio::Ratio,
};

/// The label state of an anchor in dense targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorState {
    Positive,
    Negative,
    Ignore,
}

impl AnchorState {
    /// The value filled into the label row of the anchor.
    pub fn value(&self) -> i64 {
        match self {
            Self::Positive => 1,
            Self::Negative => 0,
            Self::Ignore => -1,
        }
    }
}

/// Per-anchor targets of single-stage detectors with dense classification
/// heads. Every anchor gets a label row and a regression row, and no
/// sampling takes place.
#[derive(Debug, Clone)]
pub struct DenseAnchorAssignerInit {
    pub num_classes: usize,
    /// Defaults to 0.5.
    pub positive_overlap_threshold: Option<Ratio>,
    /// Defaults to 0.4.
    pub negative_overlap_threshold: Option<Ratio>,
    /// Defaults to the pixel inclusive convention with std `[0.1, 0.1, 0.2, 0.2]`.
    pub coder: Option<BoxCoder>,
}

impl DenseAnchorAssignerInit {
    pub fn build(self) -> Result<DenseAnchorAssigner> {
        let Self {
            num_classes,
            positive_overlap_threshold,
            negative_overlap_threshold,
            coder,
        } = self;

        ensure!(num_classes > 0, "num_classes must be positive");
        let positive_threshold = positive_overlap_threshold.unwrap_or(Ratio::try_from(0.5)?);
        let negative_threshold = negative_overlap_threshold.unwrap_or(Ratio::try_from(0.4)?);
        ensure!(
            negative_threshold <= positive_threshold,
            "negative_overlap_threshold ({}) must not exceed positive_overlap_threshold ({})",
            negative_threshold.to_f64(),
            positive_threshold.to_f64()
        );
        let coder = match coder {
            Some(coder) => coder,
            None => BoxCoderInit {
                area: AreaConvention::PixelInclusive,
                ..Default::default()
            }
            .build()?,
        };

        Ok(DenseAnchorAssigner {
            num_classes,
            positive_threshold: positive_threshold.to_f64(),
            negative_threshold: negative_threshold.to_f64(),
            coder,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DenseAnchorAssigner {
    num_classes: usize,
    positive_threshold: f64,
    negative_threshold: f64,
    coder: BoxCoder,
}

impl DenseAnchorAssigner {
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn coder(&self) -> &BoxCoder {
        &self.coder
    }
}

/// Dense targets of one image, one row per anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTargets {
    /// `[num_anchors, num_classes]`, filled with `1` at column `class - 1`
    /// of positive anchors, `0` for background and `-1` for ignored anchors.
    pub labels: Array2<i64>,
    /// `[num_anchors, (dy, dx, dh, dw)]` against the best ground truth of
    /// each anchor. Zeros without ground truth.
    pub regression: Array2<f64>,
    pub states: Vec<AnchorState>,
    pub diagnostics: Diagnostics,
}

impl TargetAssigner for DenseAnchorAssigner {
    type Candidates = AnchorSet;
    type Output = DenseTargets;

    fn assign<R>(&self, gt: &PaddedLabels, anchors: &AnchorSet, _rng: &mut R) -> Result<DenseTargets>
    where
        R: Rng + ?Sized,
    {
        let labels = gt.strip_padding();
        if let Some(label) = labels
            .iter()
            .find(|label| label.class == 0 || label.class > self.num_classes)
        {
            bail!(
                "class id {} is not within range [1, {}]",
                label.class,
                self.num_classes
            );
        }

        let boxes = anchors.boxes();
        let num_anchors = boxes.len();
        let gt_boxes: Vec<_> = labels.iter().map(|label| label.rect.clone()).collect();

        // [gt, anchor]
        let ious = compute_iou(&gt_boxes, boxes, self.coder.area());
        let best_gts: Vec<Option<(usize, f64)>> = ious
            .axis_iter(Axis(1))
            .map(|col| {
                col.iter()
                    .cloned()
                    .enumerate()
                    .fold(None, |best, (index, iou)| match best {
                        Some((_, best_iou)) if best_iou >= iou => best,
                        _ => Some((index, iou)),
                    })
            })
            .collect();

        let image_size = anchors.image_size();
        let [image_h, image_w] = [image_size.h() as f64, image_size.w() as f64];
        let states: Vec<_> = izip!(boxes, &best_gts)
            .map(|(anchor, best)| {
                if anchor.cy() >= image_h || anchor.cx() >= image_w {
                    return AnchorState::Ignore;
                }
                match *best {
                    None => AnchorState::Negative,
                    Some((_, iou)) if iou >= self.positive_threshold => AnchorState::Positive,
                    Some((_, iou)) if iou < self.negative_threshold => AnchorState::Negative,
                    Some(_) => AnchorState::Ignore,
                }
            })
            .collect();

        let mut label_array = Array2::from_elem((num_anchors, self.num_classes), AnchorState::Ignore.value());
        izip!(label_array.outer_iter_mut(), &states, &best_gts).for_each(
            |(mut row, state, best)| match (state, best) {
                (AnchorState::Positive, Some((gt_index, _))) => {
                    row.fill(0);
                    row[labels[*gt_index].class - 1] = AnchorState::Positive.value();
                }
                (AnchorState::Negative, _) => row.fill(AnchorState::Negative.value()),
                _ => {}
            },
        );

        let regression = if gt_boxes.is_empty() {
            debug!("no ground truth, every anchor inside the image is background");
            Array2::zeros((num_anchors, 4))
        } else {
            let matched: Vec<_> = best_gts
                .iter()
                .map(|best| {
                    let (gt_index, _) = best.ok_or_else(|| format_err!("missing best ground truth"))?;
                    Ok(gt_boxes[gt_index].clone())
                })
                .collect::<Result<_>>()?;
            encode_regression_targets(&self.coder, boxes, &matched)?
        };

        let count = |target: AnchorState| states.iter().filter(|&&state| state == target).count();
        let matched_gts: HashSet<_> = izip!(&states, &best_gts)
            .filter(|(state, _)| **state == AnchorState::Positive)
            .filter_map(|(_, best)| best.map(|(gt_index, _)| gt_index))
            .collect();
        let min_best_iou = ious
            .outer_iter()
            .map(|row| row.iter().cloned().fold(0.0, f64::max))
            .reduce(f64::min)
            .unwrap_or(0.0);

        let diagnostics = Diagnostics {
            gt_count: labels.len(),
            positive_count: count(AnchorState::Positive),
            negative_count: count(AnchorState::Negative),
            unmatched_gt_count: labels.len() - matched_gts.len(),
            min_best_iou,
        };

        Ok(DenseTargets {
            labels: label_array,
            regression,
            states,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnchorProducer, PyramidAnchorGeneratorInit};
    use approx::assert_abs_diff_eq;

    fn anchors() -> AnchorSet {
        // one level, 4x4 grid of 8x8 anchors with stride 8
        PyramidAnchorGeneratorInit {
            pyramid_levels: Some(vec![3]),
            sizes: Some(vec![r64(8.0)]),
            ratios: Some(vec![r64(1.0)]),
            scales: Some(vec![r64(1.0)]),
            ..Default::default()
        }
        .build()
        .unwrap()
        .produce(&HW::from_hw([28, 32]))
        .unwrap()
    }

    fn assigner() -> DenseAnchorAssigner {
        DenseAnchorAssignerInit {
            num_classes: 3,
            positive_overlap_threshold: None,
            negative_overlap_threshold: None,
            coder: None,
        }
        .build()
        .unwrap()
    }

    #[test]
    fn one_hot_labels_and_ignore_mask() {
        let anchors = anchors();
        assert_eq!(anchors.len(), 16);

        // identical to the anchor at row 1, column 2
        let gt = PaddedLabels::new(
            vec![GroundTruth::try_new([8.0, 16.0, 16.0, 24.0], 2).unwrap()],
            2,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let targets = assigner().assign(&gt, &anchors, &mut rng).unwrap();

        assert_eq!(targets.labels.shape(), &[16, 3]);
        assert_eq!(targets.regression.shape(), &[16, 4]);

        let positive = 4 + 2;
        assert_eq!(targets.states[positive], AnchorState::Positive);
        assert_eq!(targets.labels.row(positive).to_vec(), vec![0, 1, 0]);
        targets
            .regression
            .row(positive)
            .iter()
            .for_each(|&val| assert_abs_diff_eq!(val, 0.0, epsilon = 1e-9));

        // the last grid row is centered at y = 28, outside the image
        (12..16).for_each(|index| {
            assert_eq!(targets.states[index], AnchorState::Ignore);
            assert_eq!(targets.labels.row(index).to_vec(), vec![-1, -1, -1]);
        });

        assert_eq!(targets.states[0], AnchorState::Negative);
        assert_eq!(targets.labels.row(0).to_vec(), vec![0, 0, 0]);
        assert_eq!(targets.diagnostics.positive_count, 1);
        assert_eq!(targets.diagnostics.unmatched_gt_count, 0);
        assert_abs_diff_eq!(targets.diagnostics.min_best_iou, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn no_ground_truth_is_background() {
        let anchors = anchors();
        let gt = PaddedLabels::new(vec![], 4).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let targets = assigner().assign(&gt, &anchors, &mut rng).unwrap();

        assert!(targets.regression.iter().all(|&val| val == 0.0));
        assert!(targets.labels.slice(s![0..12, ..]).iter().all(|&val| val == 0));
        assert_eq!(targets.diagnostics.negative_count, 12);
        assert_eq!(targets.diagnostics.min_best_iou, 0.0);
    }

    #[test]
    fn reject_out_of_range_class() {
        let anchors = anchors();
        let gt = PaddedLabels::new(
            vec![GroundTruth::try_new([0.0, 0.0, 8.0, 8.0], 4).unwrap()],
            1,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(assigner().assign(&gt, &anchors, &mut rng).is_err());
    }
}
