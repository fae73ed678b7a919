#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::config::DetectorSettings;
use crate::detect::backend::DetectorBackend;
use crate::detect::postprocess::{decode_yolo, non_max_suppression, Letterbox};
use crate::detect::result::Detection;
use crate::error::{DetectionError, RelabelError};

const LETTERBOX_FILL: u8 = 114;

/// Tract-based backend for YOLO ONNX exports.
///
/// Loads a local model file once and runs it on one image per call. Boxes
/// are reported in normalized source image coordinates.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    min_score: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new(settings: &DetectorSettings) -> Result<Self, RelabelError> {
        let model_path = settings.model_path.as_path();
        if !model_path.is_file() {
            return Err(RelabelError::model_load(model_path, "model file not found"));
        }
        let model = load_plan(model_path, settings.input_size)
            .map_err(|e| RelabelError::model_load(model_path, format!("{:#}", e)))?;
        log::info!(
            "loaded detector {} ({}x{} input)",
            model_path.display(),
            settings.input_size,
            settings.input_size
        );
        Ok(Self {
            model,
            input_size: settings.input_size,
            min_score: settings.min_score,
            iou_threshold: settings.iou_threshold,
        })
    }

    fn build_input(&self, image_path: &Path) -> Result<(Tensor, Letterbox), DetectionError> {
        let decoded = image::open(image_path).map_err(|e| DetectionError::Unreadable {
            path: image_path.to_path_buf(),
            message: e.to_string(),
        })?;
        let rgb = decoded.to_rgb8();
        let size = self.input_size;
        let letterbox = Letterbox::fit(rgb.width(), rgb.height(), size);

        let resized = image::imageops::resize(
            &rgb,
            letterbox.resized_width,
            letterbox.resized_height,
            FilterType::Triangle,
        );
        let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
        image::imageops::overlay(
            &mut canvas,
            &resized,
            letterbox.pad_x as i64,
            letterbox.pad_y as i64,
        );

        let side = size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok((input.into_tensor(), letterbox))
    }

    fn decode(&self, outputs: TVec<TValue>, letterbox: &Letterbox) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("expected a rank-3 detection head")?;
        let (batch, rows, cols) = view.dim();
        if batch != 1 {
            return Err(anyhow!("expected batch size 1, got {}", batch));
        }

        // Stock exports are [1, 4 + classes, anchors]; some are transposed.
        let candidates = if rows <= cols {
            decode_yolo(rows, cols, self.min_score, letterbox, |c, i| view[[0, c, i]])
        } else {
            decode_yolo(cols, rows, self.min_score, letterbox, |c, i| view[[0, i, c]])
        };
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

fn load_plan(model_path: &Path, size: u32) -> Result<TypedRunnableModel<TypedModel>> {
    let side = size as usize;
    let plan = tract_onnx::onnx()
        .model_for_path(model_path)
        .context("failed to parse ONNX model")?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
        )
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")?;
    Ok(plan)
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, image_path: &Path) -> Result<Vec<Detection>, DetectionError> {
        let (input, letterbox) = self.build_input(image_path)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DetectionError::Inference(format!("{:#}", e)))?;
        self.decode(outputs, &letterbox)
            .map_err(|e| DetectionError::Inference(format!("{:#}", e)))
    }

    fn warm_up(&mut self) -> Result<(), DetectionError> {
        let side = self.input_size as usize;
        let blank = tract_ndarray::Array4::<f32>::zeros((1, 3, side, side)).into_tensor();
        self.model
            .run(tvec!(blank.into()))
            .map(|_| ())
            .map_err(|e| DetectionError::Inference(format!("{:#}", e)))
    }
}
