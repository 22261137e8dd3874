//! In-process YOLOv8 detection on ONNX Runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};

use argus_models::Detection;
use async_trait::async_trait;
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::detection::{non_max_suppression, yolo, Detector, DetectorConfig, COCO_CLASSES};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// In-process YOLOv8 detector.
///
/// Inference runs on the blocking pool; the session is serialized behind a
/// mutex, so concurrent `detect` calls queue on it.
pub struct ObjectDetector {
    session: Arc<Mutex<Session>>,
    config: DetectorConfig,
}

impl ObjectDetector {
    /// Load the model named by the config.
    pub fn new(config: DetectorConfig) -> MediaResult<Self> {
        let path = Path::new(&config.model_path);
        if !path.is_file() {
            return Err(MediaError::model_not_found(&config.model_path));
        }

        let session = create_session(path)?;
        info!(
            input_size = config.input_size,
            confidence = config.confidence_threshold,
            "YOLOv8 detector loaded"
        );
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

fn run_blocking(
    session: &Mutex<Session>,
    config: &DetectorConfig,
    image: &RgbImage,
) -> MediaResult<Vec<Detection>> {
    let size = config.input_size as usize;
    let chw = yolo::preprocess(image, config.input_size);
    let input: Value = Tensor::from_array((vec![1usize, 3, size, size], chw.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::detection_failed(format!("Failed to create tensor: {}", e)))?;

    let output: Vec<f32> = {
        let mut session = session
            .lock()
            .map_err(|_| MediaError::internal("ONNX session mutex poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection_failed("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        tensor.1.iter().copied().collect()
    };

    let scale = yolo::input_scale(image.width(), image.height(), config.input_size);
    let candidates = yolo::decode(
        &output,
        COCO_CLASSES.len(),
        scale,
        image.width(),
        image.height(),
        config.confidence_threshold,
    );
    Ok(non_max_suppression(candidates, config.iou_threshold))
}

#[async_trait]
impl Detector for ObjectDetector {
    async fn detect(&self, frame: &Frame) -> MediaResult<Vec<Detection>> {
        let session = Arc::clone(&self.session);
        let config = self.config.clone();
        let image = frame.shared_image();

        let detections = tokio::task::spawn_blocking(move || run_blocking(&session, &config, &image))
            .await
            .map_err(|e| MediaError::internal(format!("Detection task panicked: {}", e)))??;

        debug!(count = detections.len(), "Frame inference done");
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "yolov8-onnx"
    }
}

fn ort_error<E: std::fmt::Display>(stage: &'static str) -> impl Fn(E) -> MediaError {
    move |e| MediaError::internal(format!("ONNX Runtime {}: {}", stage, e))
}

/// Build a session for `model_path`. With the `cuda` feature the CUDA
/// provider is registered first; ONNX Runtime falls back to CPU when it is
/// unavailable.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    #[allow(unused_mut)]
    let mut builder = Session::builder()
        .map_err(ort_error("builder"))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(ort_error("optimization level"))?;

    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        builder = builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(ort_error("execution providers"))?;
        debug!("CUDA execution provider registered");
    }

    let session = builder
        .commit_from_file(model_path)
        .map_err(ort_error("model load"))?;
    info!(path = %model_path.display(), "ONNX session ready");
    Ok(session)
}
