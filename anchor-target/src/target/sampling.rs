use super::{Diagnostics, SampleTag};
use crate::{
    common::*,
    geometry::{compute_iou, encode_regression_target},
    ratio::Ratio,
};

/// How the best IoU of a candidate compares to the positive threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThresholdBound {
    /// The IoU must exceed the threshold.
    Exclusive,
    /// The IoU must reach the threshold.
    Inclusive,
}

impl ThresholdBound {
    pub fn admits(&self, iou: f64, threshold: f64) -> bool {
        match self {
            Self::Exclusive => iou > threshold,
            Self::Inclusive => iou >= threshold,
        }
    }
}

/// Thresholds and budget of a sampling assigner.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SamplePolicy {
    pub positive_threshold: f64,
    pub positive_bound: ThresholdBound,
    pub negative_threshold: f64,
    pub budget: usize,
    pub positive_ratio: f64,
}

impl SamplePolicy {
    pub fn new(
        positive_threshold: Ratio,
        positive_bound: ThresholdBound,
        negative_threshold: Ratio,
        budget: usize,
        positive_ratio: Ratio,
    ) -> Result<Self> {
        ensure!(
            negative_threshold <= positive_threshold,
            "negative_overlap_threshold ({}) must not exceed positive_overlap_threshold ({})",
            negative_threshold.to_f64(),
            positive_threshold.to_f64()
        );
        ensure!(budget > 0, "train_samples_per_image must be positive");

        Ok(Self {
            positive_threshold: positive_threshold.to_f64(),
            positive_bound,
            negative_threshold: negative_threshold.to_f64(),
            budget,
            positive_ratio: positive_ratio.to_f64(),
        })
    }

    /// The maximum number of positives, `floor(budget * positive_ratio)`.
    pub fn positive_cap(&self) -> usize {
        (self.budget as f64 * self.positive_ratio).floor() as usize
    }
}

/// A positive candidate and the ground truth it regresses to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Match {
    pub candidate: usize,
    pub gt: usize,
    pub iou: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sampled {
    pub positives: Vec<Match>,
    pub negatives: Vec<usize>,
    pub diagnostics: Diagnostics,
}

impl Sampled {
    /// Iterate over the output rows, positives first.
    pub fn rows(&self) -> impl Iterator<Item = (usize, SampledRow)> + '_ {
        let positives = self.positives.iter().map(|&m| SampledRow::Positive(m));
        let negatives = self.negatives.iter().map(|&c| SampledRow::Negative(c));
        positives.chain(negatives).enumerate()
    }

    /// Encode `[budget, 4 + 1]` deltas and `[budget, 1 + 1]` class ids.
    ///
    /// Negative rows have zero deltas and the background class. Rows after
    /// the samples are zero padding.
    pub fn encode(
        &self,
        budget: usize,
        coder: &BoxCoder,
        labels: &[GroundTruth],
        candidates: &[TLBR<f64>],
    ) -> (Array2<f64>, Array2<i64>) {
        let mut deltas = Array2::zeros((budget, 5));
        let mut class_ids = Array2::zeros((budget, 2));

        self.rows().for_each(|(row, sample)| {
            let tag = sample.tag().value();
            if let SampledRow::Positive(m) = sample {
                let label = &labels[m.gt];
                let encoded =
                    encode_regression_target(coder, &candidates[m.candidate], &label.rect);
                deltas
                    .slice_mut(s![row, 0..4])
                    .iter_mut()
                    .zip(encoded)
                    .for_each(|(dst, src)| *dst = src);
                class_ids[[row, 0]] = label.class as i64;
            }
            deltas[[row, 4]] = tag as f64;
            class_ids[[row, 1]] = tag;
        });

        (deltas, class_ids)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SampledRow {
    Positive(Match),
    Negative(usize),
}

impl SampledRow {
    pub fn candidate(&self) -> usize {
        match *self {
            Self::Positive(m) => m.candidate,
            Self::Negative(candidate) => candidate,
        }
    }

    pub fn tag(&self) -> SampleTag {
        match self {
            Self::Positive(_) => SampleTag::Positive,
            Self::Negative(_) => SampleTag::Negative,
        }
    }
}

/// Match candidates against ground truth and sample positives and
/// negatives within the policy budget.
pub(crate) fn sample_candidates<R>(
    policy: &SamplePolicy,
    gt_boxes: &[TLBR<f64>],
    candidates: &[TLBR<f64>],
    area: AreaConvention,
    rng: &mut R,
) -> Sampled
where
    R: Rng + ?Sized,
{
    if gt_boxes.is_empty() {
        debug!("no ground truth, every sampled candidate is negative");
    }
    if candidates.is_empty() {
        warn!("no candidate boxes, the targets are all padding");
    }

    // [gt, candidate]
    let ious = compute_iou(gt_boxes, candidates, area);
    let gt_best: Vec<_> = ious
        .outer_iter()
        .map(|row| argmax(row.iter().cloned().enumerate()))
        .collect();
    let candidate_best: Vec<_> = ious
        .axis_iter(Axis(1))
        .map(|col| argmax(col.iter().cloned().enumerate()))
        .collect();

    // candidate -> (gt, iou)
    let mut matches: BTreeMap<usize, (usize, f64)> = BTreeMap::new();

    // Ground truth boxes claim candidates greedily in descending order of
    // their best IoU, ties in index order. A box whose best candidate is
    // already claimed takes its best unclaimed one.
    let mut claim_order: Vec<_> = gt_best
        .iter()
        .enumerate()
        .filter_map(|(gt, best)| Some((gt, best.as_ref()?.1)))
        .collect();
    claim_order.sort_by_key(|&(_, iou)| Reverse(r64(iou)));

    for (gt, _) in claim_order {
        let row = ious.row(gt);
        let unclaimed = row
            .iter()
            .cloned()
            .enumerate()
            .filter(|(candidate, _)| !matches.contains_key(candidate));
        match argmax(unclaimed) {
            Some((candidate, iou)) => {
                matches.insert(candidate, (gt, iou));
            }
            None => debug!("every candidate is claimed, ground truth {} is left unmatched", gt),
        }
    }

    // candidates passing the threshold join with their best ground truth
    candidate_best
        .iter()
        .enumerate()
        .filter_map(|(candidate, best)| {
            let (gt, iou) = (*best)?;
            policy
                .positive_bound
                .admits(iou, policy.positive_threshold)
                .then(|| (candidate, gt, iou))
        })
        .for_each(|(candidate, gt, iou)| {
            matches.entry(candidate).or_insert((gt, iou));
        });

    let mut positives: Vec<_> = matches
        .iter()
        .map(|(&candidate, &(gt, iou))| Match { candidate, gt, iou })
        .collect();
    let positive_cap = policy.positive_cap();
    if positives.len() > positive_cap {
        positives.shuffle(rng);
        positives.truncate(positive_cap);
    }

    let mut negatives: Vec<_> = candidate_best
        .iter()
        .enumerate()
        .filter(|(candidate, _)| !matches.contains_key(candidate))
        .filter(|(_, best)| match best {
            Some((_, iou)) => *iou < policy.negative_threshold,
            None => true,
        })
        .map(|(candidate, _)| candidate)
        .collect();
    let negative_cap = policy.budget - positives.len();
    if negatives.len() > negative_cap {
        negatives.shuffle(rng);
        negatives.truncate(negative_cap);
    }

    let matched_gts: HashSet<_> = positives.iter().map(|m| m.gt).collect();
    let min_best_iou = gt_best
        .iter()
        .map(|best| best.map(|(_, iou)| iou).unwrap_or(0.0))
        .reduce(f64::min)
        .unwrap_or(0.0);

    let diagnostics = Diagnostics {
        gt_count: gt_boxes.len(),
        positive_count: positives.len(),
        negative_count: negatives.len(),
        unmatched_gt_count: gt_boxes.len() - matched_gts.len(),
        min_best_iou,
    };

    Sampled {
        positives,
        negatives,
        diagnostics,
    }
}

/// Find the first maximum of `(index, value)` pairs.
fn argmax(values: impl Iterator<Item = (usize, f64)>) -> Option<(usize, f64)> {
    values.fold(None, |best, (index, value)| match best {
            Some((_, best_value)) if best_value >= value => best,
            _ => Some((index, value)),
        })
}
