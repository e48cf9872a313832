//! Configuration format of anchors and target assigners.

use crate::{
    anchor::{
        AnchorGeneratorInit, AnchorShape, AnyAnchorGenerator, PyramidAnchorGeneratorInit,
    },
    common::*,
    ratio::Ratio,
    target::{
        AnchorTargetAssigner, AnchorTargetAssignerInit, DenseAnchorAssigner,
        DenseAnchorAssignerInit, ProposalTargetAssigner, ProposalTargetAssignerInit,
    },
};

pub use anchors::*;
pub use targets::*;

/// The main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub anchors: AnchorConfig,
    #[serde(default)]
    pub coder: CoderConfig,
    /// Anchor targets of the region proposal network.
    #[serde(default)]
    pub rpn: SamplerConfig,
    /// Proposal targets of the detection head.
    #[serde(default)]
    pub detect: SamplerConfig,
    /// Dense anchor targets. Dense assignment is unavailable if unset.
    pub dense: Option<DenseConfig>,
    pub batch_size: NonZeroUsize,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = json5::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn anchor_generator(&self) -> Result<AnyAnchorGenerator> {
        self.anchors.build()
    }

    pub fn rpn_assigner(&self) -> Result<AnchorTargetAssigner> {
        let SamplerConfig {
            positive_overlap_threshold,
            negative_overlap_threshold,
            train_samples_per_image,
            positive_ratio,
        } = self.rpn.clone();

        AnchorTargetAssignerInit {
            positive_overlap_threshold,
            negative_overlap_threshold,
            train_samples_per_image,
            positive_ratio,
            coder: Some(self.coder.build(AreaConvention::Continuous)?),
        }
        .build()
    }

    pub fn detect_assigner(&self) -> Result<ProposalTargetAssigner> {
        let SamplerConfig {
            positive_overlap_threshold,
            negative_overlap_threshold,
            train_samples_per_image,
            positive_ratio,
        } = self.detect.clone();

        ProposalTargetAssignerInit {
            positive_overlap_threshold,
            negative_overlap_threshold,
            train_samples_per_image,
            positive_ratio,
            coder: Some(self.coder.build(AreaConvention::Continuous)?),
        }
        .build()
    }

    pub fn dense_assigner(&self) -> Result<DenseAnchorAssigner> {
        let DenseConfig {
            num_classes,
            positive_overlap_threshold,
            negative_overlap_threshold,
        } = self
            .dense
            .clone()
            .ok_or_else(|| format_err!("the dense section is not configured"))?;

        DenseAnchorAssignerInit {
            num_classes,
            positive_overlap_threshold,
            negative_overlap_threshold,
            coder: Some(self.coder.build(AreaConvention::PixelInclusive)?),
        }
        .build()
    }
}

mod anchors {
    use super::*;

    /// Anchor generator options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "kind")]
    pub enum AnchorConfig {
        Single(SingleAnchorConfig),
        Pyramid(PyramidAnchorConfig),
    }

    impl AnchorConfig {
        pub fn build(&self) -> Result<AnyAnchorGenerator> {
            let generator: AnyAnchorGenerator = match self.clone() {
                Self::Single(SingleAnchorConfig {
                    base_size,
                    ratios,
                    scales,
                    stride,
                    shape,
                }) => AnchorGeneratorInit {
                    base_size,
                    ratios,
                    scales,
                    stride,
                    shape,
                }
                .build()?
                .into(),
                Self::Pyramid(PyramidAnchorConfig {
                    pyramid_levels,
                    sizes,
                    strides,
                    ratios,
                    scales,
                    shape,
                }) => PyramidAnchorGeneratorInit {
                    pyramid_levels,
                    sizes,
                    strides,
                    ratios,
                    scales,
                    shape,
                }
                .build()?
                .into(),
            };
            Ok(generator)
        }
    }

    /// Single feature map anchors.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SingleAnchorConfig {
        pub base_size: R64,
        pub ratios: Vec<R64>,
        pub scales: Vec<R64>,
        pub stride: R64,
        pub shape: Option<AnchorShape>,
    }

    /// Feature pyramid anchors. Unset fields take the pyramid defaults.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct PyramidAnchorConfig {
        pub pyramid_levels: Option<Vec<usize>>,
        pub sizes: Option<Vec<R64>>,
        pub strides: Option<Vec<R64>>,
        pub ratios: Option<Vec<R64>>,
        pub scales: Option<Vec<R64>>,
        pub shape: Option<AnchorShape>,
    }
}

mod targets {
    use super::*;

    /// Box delta normalization.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct CoderConfig {
        pub mean: Option<[f64; 4]>,
        pub std: Option<[f64; 4]>,
        /// Overrides the area convention of every stage.
        pub area: Option<AreaConvention>,
    }

    impl CoderConfig {
        pub fn build(&self, default_area: AreaConvention) -> Result<BoxCoder> {
            BoxCoderInit {
                mean: self.mean,
                std: self.std,
                area: self.area.unwrap_or(default_area),
            }
            .build()
        }
    }

    /// Sampling assigner options.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct SamplerConfig {
        pub positive_overlap_threshold: Option<Ratio>,
        pub negative_overlap_threshold: Option<Ratio>,
        pub train_samples_per_image: Option<usize>,
        pub positive_ratio: Option<Ratio>,
    }

    /// Dense assigner options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DenseConfig {
        pub num_classes: usize,
        pub positive_overlap_threshold: Option<Ratio>,
        pub negative_overlap_threshold: Option<Ratio>,
    }
}
