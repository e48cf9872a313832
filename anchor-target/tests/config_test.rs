use anchor_target::{config::Config, AnchorProducer, AreaConvention, HW};
use anyhow::Result;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAMES: &[&str] = &["faster_rcnn.json5", "retinanet.json5"];

lazy_static::lazy_static! {
    static ref CONFIG_DIR: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cfg");
    static ref CONFIG_FILES: Vec<PathBuf> = {
        CONFIG_FILE_NAMES.iter().map(|file_name| CONFIG_DIR.join(file_name)).collect()
    };
}

#[test]
fn load_config_test() -> Result<()> {
    CONFIG_FILES.iter().try_for_each(|path| -> Result<_> {
        let config = Config::open(path)?;
        let generator = config.anchor_generator()?;
        let anchors = generator.produce(&HW::from_hw([512, 512]))?;
        assert!(!anchors.is_empty());
        Ok(())
    })?;
    Ok(())
}

#[test]
fn faster_rcnn_config_test() -> Result<()> {
    let config = Config::open(CONFIG_DIR.join("faster_rcnn.json5"))?;
    assert_eq!(config.batch_size.get(), 4);

    let anchors = config.anchor_generator()?.produce(&HW::from_hw([600, 800]))?;
    // ceil(600 / 16) x ceil(800 / 16) cells with 9 anchors each
    assert_eq!(anchors.len(), 38 * 50 * 9);

    let rpn = config.rpn_assigner()?;
    assert_eq!(rpn.train_samples_per_image(), 256);
    assert_eq!(rpn.coder().area(), AreaConvention::Continuous);

    let detect = config.detect_assigner()?;
    assert_eq!(detect.train_samples_per_image(), 200);

    assert!(config.dense_assigner().is_err());
    Ok(())
}

#[test]
fn retinanet_config_test() -> Result<()> {
    let config = Config::open(CONFIG_DIR.join("retinanet.json5"))?;
    let dense = config.dense_assigner()?;
    assert_eq!(dense.num_classes(), 80);
    assert_eq!(dense.coder().area(), AreaConvention::PixelInclusive);
    Ok(())
}

#[test]
fn missing_config_file_test() {
    assert!(Config::open(CONFIG_DIR.join("missing.json5")).is_err());
}
