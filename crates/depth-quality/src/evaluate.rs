use crate::core::io::{load_ply, save_point_cloud_with_suffix, IoError};
use crate::core::{CameraIntrinsics, GrayImageView, PointCloud};
use crate::fixture::{FixtureRegistry, ReferenceMesh, ReferenceMeshError, RegistryError};
use crate::metrics::{
    align, clip_with_params, score_with_params, AlignError, AlignmentResult, ClipParams,
    MarkerDetector, PrecomputedMarkers, QualityScore, ScoreError, ScoreParams,
};
use crate::report::{AlignmentSummary, ConfigError, EvaluateConfig, QualityReport};
use log::info;
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the end-to-end helpers.
#[derive(thiserror::Error, Debug)]
pub enum EvaluateError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Mesh(#[from] ReferenceMeshError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Align(#[from] AlignError),
    #[error(transparent)]
    Score(#[from] ScoreError),
}

/// Convert an `image::GrayImage` into the lightweight core view type.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Read any supported image format and convert it to 8-bit grayscale.
pub fn load_gray_image(path: impl AsRef<Path>) -> Result<::image::GrayImage, EvaluateError> {
    let img = ::image::ImageReader::open(path)
        .map_err(IoError::from)?
        .decode()?;
    Ok(img.to_luma8())
}

/// Everything produced for one capture.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub alignment: AlignmentResult,
    pub cropped: PointCloud,
    pub score: QualityScore,
}

/// Align, clip and score one capture against `reference`.
#[allow(clippy::too_many_arguments)]
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(reference, detector, image, intrinsics, cloud, clip_params, score_params),
        fields(width = image.width, height = image.height, points = cloud.len())
    )
)]
pub fn evaluate_capture<D: MarkerDetector + ?Sized>(
    reference: &ReferenceMesh,
    detector: &D,
    image: &GrayImageView<'_>,
    intrinsics: &CameraIntrinsics,
    cloud: PointCloud,
    depth_scale: f64,
    clip_params: &ClipParams,
    score_params: &ScoreParams,
) -> Result<Evaluation, EvaluateError> {
    let alignment = align(reference, detector, image, intrinsics, cloud, depth_scale)?;
    let cropped = clip_with_params(reference, &alignment.cloud, depth_scale, clip_params);
    let score = score_with_params(
        reference,
        &cropped,
        depth_scale,
        &alignment.camera_angle,
        score_params,
    )?;
    Ok(Evaluation {
        alignment,
        cropped,
        score,
    })
}

/// Load the reference mesh named by `cfg`.
///
/// An explicit `mesh_path` is loaded directly; otherwise the fixture kind is
/// loaded from `fixture_dir` through a [`FixtureRegistry`].
pub fn load_reference(cfg: &EvaluateConfig) -> Result<ReferenceMesh, EvaluateError> {
    let spec = cfg.fixture_spec();
    if let Some(path) = &cfg.mesh_path {
        return Ok(ReferenceMesh::load(path, spec)?);
    }
    match (&cfg.fixture_dir, cfg.fixture) {
        (Some(dir), Some(kind)) => {
            let mut registry = FixtureRegistry::load_kinds(dir, &spec, &[kind])?;
            Ok(registry.take(kind)?)
        }
        _ => Err(ConfigError::MissingMesh.into()),
    }
}

/// Run the file-based pipeline described by `cfg` against a loaded mesh.
///
/// Debug clouds are written next to the input cloud when requested.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn evaluate_with_reference(
    cfg: &EvaluateConfig,
    reference: &ReferenceMesh,
) -> Result<QualityReport, EvaluateError> {
    let mut report = QualityReport::new(cfg);

    let image = load_gray_image(&cfg.image_path)?;
    let intrinsics = CameraIntrinsics::load_json(&cfg.intrinsics_path)?;
    let cloud = load_ply(&cfg.point_cloud_path)?;
    let detector = PrecomputedMarkers::load_json(&cfg.markers_path)?;
    report.num_points = Some(cloud.len());
    info!(
        "evaluating {} ({} points, {}x{} image)",
        cfg.point_cloud_path,
        cloud.len(),
        image.width(),
        image.height()
    );

    let eval = evaluate_capture(
        reference,
        &detector,
        &gray_view(&image),
        &intrinsics,
        cloud,
        cfg.depth_scale,
        &cfg.clip_params(),
        &cfg.score_params(),
    )?;

    if cfg.save_debug_clouds {
        let original = Path::new(&cfg.point_cloud_path);
        for (suffix, cloud) in [("aligned", &eval.alignment.cloud), ("cropped", &eval.cropped)] {
            let path = save_point_cloud_with_suffix(original, suffix, cloud)?;
            report.debug_clouds.push(path.to_string_lossy().into_owned());
        }
    }

    report.num_cropped = Some(eval.cropped.len());
    report.alignment = Some(AlignmentSummary::from(&eval.alignment));
    report.score = Some(eval.score);
    Ok(report)
}

/// Load the mesh named by `cfg` and evaluate.
pub fn evaluate(cfg: &EvaluateConfig) -> Result<QualityReport, EvaluateError> {
    let reference = load_reference(cfg)?;
    evaluate_with_reference(cfg, &reference)
}
