use anchor_target::{
    config::Config, AnchorCache, AnchorProducer, AnchorSet, BatchDiagnostics, BatchTargetBuilder,
    GroundTruth, PaddedBoxes, PaddedLabels, StackBatch, TargetAssigner, HW, TLBR,
};
use anyhow::{ensure, format_err, Context, Result};
use clap::{ArgEnum, Parser};
use prettytable::{cell, row, Table};
use rand::{prelude::*, rngs::StdRng};
use serde::Deserialize;
use std::{
    borrow::Borrow,
    env,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
enum Opts {
    /// Print the anchor layout of an image size.
    Anchors {
        /// configuration file
        config_file: PathBuf,
        #[clap(long, default_value = "512")]
        height: usize,
        #[clap(long, default_value = "512")]
        width: usize,
    },
    /// Assign training targets to annotated images and print diagnostics.
    Assign {
        /// configuration file
        config_file: PathBuf,
        /// annotation file
        annotation_file: PathBuf,
        #[clap(long, default_value = "0")]
        seed: u64,
        #[clap(long, arg_enum, default_value = "rpn")]
        stage: Stage,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ArgEnum)]
enum Stage {
    Rpn,
    Detect,
    Dense,
}

/// An annotated image in the annotation file.
#[derive(Debug, Clone, Deserialize)]
struct ImageAnnotation {
    /// `[height, width]`
    image_size: [usize; 2],
    /// `(y1, x1, y2, x2)` boxes
    boxes: Vec<[f64; 4]>,
    classes: Vec<usize>,
    proposals: Option<Vec<[f64; 4]>>,
}

fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        }
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    match Opts::parse() {
        Opts::Anchors {
            config_file,
            height,
            width,
        } => {
            anchors(config_file, HW::from_hw([height, width]))?;
        }
        Opts::Assign {
            config_file,
            annotation_file,
            seed,
            stage,
        } => {
            assign(config_file, annotation_file, seed, stage)?;
        }
    }

    Ok(())
}

fn load_config(config_file: &Path) -> Result<Config> {
    Config::open(config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))
}

fn anchors(config_file: impl AsRef<Path>, image_size: HW<usize>) -> Result<()> {
    let config = load_config(config_file.as_ref())?;
    let anchors = config.anchor_generator()?.produce(&image_size)?;

    let mut table = Table::new();
    table.add_row(row!["level", "grid", "stride", "size", "anchors", "index range"]);
    anchors.levels().iter().for_each(|level| {
        table.add_row(row![
            level.level,
            format!("{}x{}", level.grid.h(), level.grid.w()),
            level.stride,
            level.base_size,
            level.range.len(),
            format!("{:?}", level.range),
        ]);
    });
    table.add_row(row!["total", "", "", "", anchors.len(), ""]);
    table.printstd();

    Ok(())
}

fn assign(
    config_file: impl AsRef<Path>,
    annotation_file: impl AsRef<Path>,
    seed: u64,
    stage: Stage,
) -> Result<()> {
    let config = load_config(config_file.as_ref())?;
    let annotation_file = annotation_file.as_ref();
    let annotations: Vec<ImageAnnotation> = {
        let text = std::fs::read_to_string(annotation_file).with_context(|| {
            format!("failed to read annotation file '{}'", annotation_file.display())
        })?;
        json5::from_str(&text).with_context(|| {
            format!("failed to parse annotation file '{}'", annotation_file.display())
        })?
    };
    ensure!(!annotations.is_empty(), "the annotation file has no images");
    info!("loaded {} images", annotations.len());

    let gt = pad_ground_truth(&annotations)?;
    let cache = AnchorCache::new(config.anchor_generator()?);
    let mut rng = StdRng::seed_from_u64(seed);

    let diagnostics = match stage {
        Stage::Rpn => {
            let anchors = image_anchors(&cache, &annotations)?;
            run_batches(&config.rpn_assigner()?, config.batch_size, &gt, &anchors, &mut rng)?
        }
        Stage::Detect => {
            let proposals = pad_proposals(&annotations)?;
            run_batches(&config.detect_assigner()?, config.batch_size, &gt, &proposals, &mut rng)?
        }
        Stage::Dense => {
            let anchors = image_anchors(&cache, &annotations)?;
            run_batches(&config.dense_assigner()?, config.batch_size, &gt, &anchors, &mut rng)?
        }
    };

    let mut table = Table::new();
    table.add_row(row!["image", "gt", "positive", "negative", "unmatched gt", "min best IoU"]);
    diagnostics
        .iter()
        .flat_map(|batch| {
            (0..batch.batch_size()).map(move |index| {
                [
                    batch.gt_count[index],
                    batch.positive_count[index],
                    batch.negative_count[index],
                    batch.unmatched_gt_count[index],
                    batch.min_best_iou[index],
                ]
            })
        })
        .enumerate()
        .for_each(|(image, [gt, positive, negative, unmatched, min_iou])| {
            table.add_row(row![
                image,
                gt,
                positive,
                negative,
                unmatched,
                format!("{:.4}", min_iou)
            ]);
        });
    table.printstd();

    Ok(())
}

/// Assign targets chunk by chunk, the last chunk may be smaller than the
/// batch size.
fn run_batches<A, C, R>(
    assigner: &A,
    batch_size: NonZeroUsize,
    gt: &[PaddedLabels],
    candidates: &[C],
    rng: &mut R,
) -> Result<Vec<BatchDiagnostics>>
where
    A: TargetAssigner + Clone,
    A::Output: StackBatch,
    C: Borrow<A::Candidates> + Sync,
    R: Rng + ?Sized,
{
    gt.chunks(batch_size.get())
        .zip(candidates.chunks(batch_size.get()))
        .map(|(gt, candidates)| {
            let size = NonZeroUsize::new(gt.len())
                .ok_or_else(|| format_err!("empty batch"))?;
            let builder = BatchTargetBuilder::new(assigner.clone(), size);
            let batch = builder.build(gt, candidates, rng)?;
            Ok(batch.as_ref().clone())
        })
        .collect()
}

fn pad_ground_truth(annotations: &[ImageAnnotation]) -> Result<Vec<PaddedLabels>> {
    let capacity = annotations
        .iter()
        .map(|annotation| annotation.boxes.len())
        .max()
        .unwrap_or(0);

    annotations
        .iter()
        .enumerate()
        .map(|(index, annotation)| {
            ensure!(
                annotation.boxes.len() == annotation.classes.len(),
                "image {} has {} boxes but {} classes",
                index,
                annotation.boxes.len(),
                annotation.classes.len()
            );
            let labels: Vec<_> = annotation
                .boxes
                .iter()
                .zip(&annotation.classes)
                .map(|(&tlbr, &class)| GroundTruth::try_new(tlbr, class))
                .collect::<Result<_>>()
                .with_context(|| format!("invalid annotation in image {}", index))?;
            if labels.is_empty() {
                warn!("image {} has no ground truth", index);
            }
            PaddedLabels::new(labels, capacity)
        })
        .collect()
}

fn pad_proposals(annotations: &[ImageAnnotation]) -> Result<Vec<PaddedBoxes>> {
    let capacity = annotations
        .iter()
        .filter_map(|annotation| annotation.proposals.as_ref())
        .map(|proposals| proposals.len())
        .max()
        .unwrap_or(0);

    annotations
        .iter()
        .enumerate()
        .map(|(index, annotation)| {
            let proposals = annotation
                .proposals
                .as_ref()
                .ok_or_else(|| format_err!("image {} has no proposals", index))?;
            let boxes: Vec<_> = proposals
                .iter()
                .map(|&tlbr| TLBR::try_from(tlbr))
                .collect::<Result<_>>()
                .with_context(|| format!("invalid proposal in image {}", index))?;
            PaddedBoxes::new(boxes, capacity)
        })
        .collect()
}

fn image_anchors<P>(cache: &AnchorCache<P>, annotations: &[ImageAnnotation]) -> Result<Vec<Arc<AnchorSet>>>
where
    P: AnchorProducer,
{
    annotations
        .iter()
        .map(|annotation| cache.get(&HW::from_hw(annotation.image_size)))
        .collect()
}
