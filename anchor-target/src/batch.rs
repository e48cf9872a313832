//! Batched target assignment.

use crate::{
    common::*,
    target::{AnchorState, AnchorTargets, DenseTargets, Diagnostics, ProposalTargets, TargetAssigner},
};

/// Stacks per-image targets along a leading batch axis.
pub trait StackBatch: Sized {
    type Batch: AsRef<BatchDiagnostics>;

    fn stack_batch(items: Vec<Self>) -> Result<Self::Batch>;
}

/// Diagnostics of a batch, each in shape `[batch]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDiagnostics {
    pub gt_count: Array1<f64>,
    pub positive_count: Array1<f64>,
    pub negative_count: Array1<f64>,
    pub unmatched_gt_count: Array1<f64>,
    pub min_best_iou: Array1<f64>,
}

impl BatchDiagnostics {
    pub fn from_diagnostics<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a Diagnostics>,
    {
        let items: Vec<_> = items.into_iter().collect();
        let collect = |f: fn(&Diagnostics) -> f64| -> Array1<f64> {
            items.iter().map(|&item| f(item)).collect()
        };

        Self {
            gt_count: collect(|item| item.gt_count as f64),
            positive_count: collect(|item| item.positive_count as f64),
            negative_count: collect(|item| item.negative_count as f64),
            unmatched_gt_count: collect(|item| item.unmatched_gt_count as f64),
            min_best_iou: collect(|item| item.min_best_iou),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.gt_count.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchAnchorTargets {
    /// `[batch, budget, 5]`
    pub deltas: Array3<f64>,
    /// `[batch, budget, 2]`
    pub class_ids: Array3<i64>,
    /// `[batch, budget, 2]`
    pub indices: Array3<i64>,
    pub diagnostics: BatchDiagnostics,
}

impl AsRef<BatchDiagnostics> for BatchAnchorTargets {
    fn as_ref(&self) -> &BatchDiagnostics {
        &self.diagnostics
    }
}

impl StackBatch for AnchorTargets {
    type Batch = BatchAnchorTargets;

    fn stack_batch(items: Vec<Self>) -> Result<Self::Batch> {
        let deltas = stack_views(items.iter().map(|item| item.deltas.view()))?;
        let class_ids = stack_views(items.iter().map(|item| item.class_ids.view()))?;
        let indices = stack_views(items.iter().map(|item| item.indices.view()))?;
        let diagnostics = BatchDiagnostics::from_diagnostics(items.iter().map(|item| &item.diagnostics));

        Ok(BatchAnchorTargets {
            deltas,
            class_ids,
            indices,
            diagnostics,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchProposalTargets {
    /// `[batch, budget, 5]`
    pub deltas: Array3<f64>,
    /// `[batch, budget, 2]`
    pub class_ids: Array3<i64>,
    /// `[batch, budget, 5]`
    pub rois: Array3<f64>,
    pub diagnostics: BatchDiagnostics,
}

impl AsRef<BatchDiagnostics> for BatchProposalTargets {
    fn as_ref(&self) -> &BatchDiagnostics {
        &self.diagnostics
    }
}

impl StackBatch for ProposalTargets {
    type Batch = BatchProposalTargets;

    fn stack_batch(items: Vec<Self>) -> Result<Self::Batch> {
        let deltas = stack_views(items.iter().map(|item| item.deltas.view()))?;
        let class_ids = stack_views(items.iter().map(|item| item.class_ids.view()))?;
        let rois = stack_views(items.iter().map(|item| item.rois.view()))?;
        let diagnostics = BatchDiagnostics::from_diagnostics(items.iter().map(|item| &item.diagnostics));

        Ok(BatchProposalTargets {
            deltas,
            class_ids,
            rois,
            diagnostics,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchDenseTargets {
    /// `[batch, num_anchors, num_classes]`
    pub labels: Array3<i64>,
    /// `[batch, num_anchors, 4]`
    pub regression: Array3<f64>,
    pub states: Vec<Vec<AnchorState>>,
    pub diagnostics: BatchDiagnostics,
}

impl AsRef<BatchDiagnostics> for BatchDenseTargets {
    fn as_ref(&self) -> &BatchDiagnostics {
        &self.diagnostics
    }
}

impl StackBatch for DenseTargets {
    type Batch = BatchDenseTargets;

    fn stack_batch(items: Vec<Self>) -> Result<Self::Batch> {
        let labels = stack_views(items.iter().map(|item| item.labels.view()))
            .context("images in a batch must share the same anchor count")?;
        let regression = stack_views(items.iter().map(|item| item.regression.view()))?;
        let diagnostics = BatchDiagnostics::from_diagnostics(items.iter().map(|item| &item.diagnostics));
        let states = items.into_iter().map(|item| item.states).collect();

        Ok(BatchDenseTargets {
            labels,
            regression,
            states,
            diagnostics,
        })
    }
}

fn stack_views<'a, T, I>(views: I) -> Result<Array3<T>>
where
    T: 'a + Clone,
    I: IntoIterator<Item = ArrayView2<'a, T>>,
{
    let views: Vec<_> = views.into_iter().collect();
    ensure!(!views.is_empty(), "cannot stack an empty batch");
    let stacked = ndarray::stack(Axis(0), &views)?;
    Ok(stacked)
}

/// Runs a [TargetAssigner] on every image of a batch and stacks the outputs.
#[derive(Debug, Clone)]
pub struct BatchTargetBuilder<A> {
    assigner: A,
    batch_size: NonZeroUsize,
}

impl<A> BatchTargetBuilder<A>
where
    A: TargetAssigner,
    A::Output: StackBatch,
{
    pub fn new(assigner: A, batch_size: NonZeroUsize) -> Self {
        Self {
            assigner,
            batch_size,
        }
    }

    pub fn assigner(&self) -> &A {
        &self.assigner
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Assign targets for the batch, pairing each image's ground truth with
    /// its own candidates.
    ///
    /// The ground truth containers must share one capacity. One seed per
    /// image is drawn from `rng` before images are processed in parallel, so
    /// the result only depends on the state of `rng`.
    pub fn build<C, R>(
        &self,
        gt: &[PaddedLabels],
        candidates: &[C],
        rng: &mut R,
    ) -> Result<<A::Output as StackBatch>::Batch>
    where
        C: Borrow<A::Candidates> + Sync,
        R: Rng + ?Sized,
    {
        let batch_size = self.batch_size.get();
        ensure!(
            gt.len() == batch_size,
            "expect {} ground truth containers, but get {}",
            batch_size,
            gt.len()
        );
        ensure!(
            candidates.len() == batch_size,
            "expect {} candidate sets, but get {}",
            batch_size,
            candidates.len()
        );
        let capacity = gt[0].capacity();
        ensure!(
            gt.iter().all(|labels| labels.capacity() == capacity),
            "ground truth containers in a batch must share the same capacity"
        );

        let seeds: Vec<u64> = (0..batch_size).map(|_| rng.next_u64()).collect();
        let outputs: Vec<_> = gt
            .par_iter()
            .zip(candidates.par_iter())
            .zip(seeds.par_iter())
            .enumerate()
            .map(|(index, ((gt, candidates), &seed))| {
                let mut rng = StdRng::seed_from_u64(seed);
                self.assigner
                    .assign(gt, Borrow::<A::Candidates>::borrow(candidates), &mut rng)
                    .with_context(|| format!("target assignment failed for image {}", index))
            })
            .collect::<Result<_>>()?;
        debug!("assigned targets for {} images", outputs.len());

        <A::Output as StackBatch>::stack_batch(outputs)
    }

    /// Assign targets for the batch against one candidate set shared by all
    /// images, e.g. anchors of a common image size.
    pub fn build_shared<R>(
        &self,
        gt: &[PaddedLabels],
        candidates: &A::Candidates,
        rng: &mut R,
    ) -> Result<<A::Output as StackBatch>::Batch>
    where
        R: Rng + ?Sized,
    {
        let candidates: Vec<&A::Candidates> = vec![candidates; gt.len()];
        self.build(gt, &candidates, rng)
    }
}
