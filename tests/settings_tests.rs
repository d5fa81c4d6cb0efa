//! Settings files and end-to-end preparation.

use rtprep::prelude::*;
use rtprep::settings::CameraSettings;

use tempfile::TempDir;

#[test]
fn test_settings_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.json");

    let settings = RenderSettings {
        width: 320,
        height: 240,
        algorithm: SamplingAlgorithm::QuasiMonteCarlo,
        qmc_seed: 7,
        camera: CameraSettings {
            position: [0.0, 1.0, 3.0],
            ..Default::default()
        },
        ..Default::default()
    };
    settings.save(&path).unwrap();

    let loaded = RenderSettings::load(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_load_rejects_invalid_and_missing() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("missing.json");
    assert!(matches!(RenderSettings::load(&missing), Err(Error::FileNotFound(_))));

    let bad_json = dir.path().join("bad.json");
    std::fs::write(&bad_json, "{ not json").unwrap();
    assert!(matches!(RenderSettings::load(&bad_json), Err(Error::Json(_))));

    let invalid = dir.path().join("invalid.json");
    std::fs::write(&invalid, r#"{"max_depth": 100}"#).unwrap();
    assert!(matches!(RenderSettings::load(&invalid), Err(Error::InvalidSettings(_))));

    let unknown_algorithm = dir.path().join("algo.json");
    std::fs::write(&unknown_algorithm, r#"{"algorithm": "mlt"}"#).unwrap();
    assert!(matches!(RenderSettings::load(&unknown_algorithm), Err(Error::Json(_))));
}

#[test]
fn test_prepare_from_settings_with_env_file() {
    let dir = TempDir::new().unwrap();
    let env_path = dir.path().join("env.exr");
    image::Rgba32FImage::from_pixel(8, 4, image::Rgba([2.0, 2.0, 2.0, 1.0]))
        .save(&env_path)
        .unwrap();

    let settings = RenderSettings {
        algorithm: SamplingAlgorithm::QuasiMonteCarlo,
        samples_per_pixel: 8,
        qmc_replications: 4,
        max_depth: 3,
        env_map: Some(env_path),
        ..Default::default()
    };
    let mut inputs = RenderInputs::from_settings(settings).unwrap();

    let env = inputs.scene().env_sampling().unwrap();
    assert_eq!((env.width(), env.height()), (8, 4));
    assert_eq!(inputs.uniform().env_map_texture_idx, 0);
    assert_eq!(inputs.qmc().unwrap().dimensions(), 11);
    assert_eq!(inputs.qmc().unwrap().as_slice().len(), 4 * 8 * 11);

    assert!(inputs.set_samples_per_pixel(32).unwrap());
    assert_eq!(inputs.qmc().unwrap().as_slice().len(), 4 * 32 * 11);
}

#[test]
fn test_prepare_missing_env_file() {
    let settings = RenderSettings {
        env_map: Some("/nonexistent/env.exr".into()),
        ..Default::default()
    };
    assert!(matches!(RenderInputs::from_settings(settings), Err(Error::FileNotFound(_))));
}
