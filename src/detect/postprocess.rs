//! Detector output decoding shared by model-backed backends.
//!
//! Kept free of any inference runtime so it can be unit tested directly.

use crate::detect::result::{BoundingBox, Detection};

/// Geometry of a letterboxed (aspect-preserving, padded) model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    pub fn fit(source_width: u32, source_height: u32, size: u32) -> Self {
        let scale = (size as f32 / source_width.max(1) as f32)
            .min(size as f32 / source_height.max(1) as f32);
        let resized_width = ((source_width as f32 * scale).round() as u32).clamp(1, size);
        let resized_height = ((source_height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            scale,
            pad_x: (size - resized_width) / 2,
            pad_y: (size - resized_height) / 2,
            resized_width,
            resized_height,
            source_width,
            source_height,
        }
    }

    /// Map a center-format box in model input pixels back to normalized
    /// source image coordinates.
    pub fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
        let sw = self.source_width.max(1) as f32;
        let sh = self.source_height.max(1) as f32;
        let x1 = ((cx - w / 2.0 - self.pad_x as f32) / self.scale / sw).clamp(0.0, 1.0);
        let y1 = ((cy - h / 2.0 - self.pad_y as f32) / self.scale / sh).clamp(0.0, 1.0);
        let x2 = ((cx + w / 2.0 - self.pad_x as f32) / self.scale / sw).clamp(0.0, 1.0);
        let y2 = ((cy + h / 2.0 - self.pad_y as f32) / self.scale / sh).clamp(0.0, 1.0);
        BoundingBox {
            x: x1,
            y: y1,
            w: x2 - x1,
            h: y2 - y1,
        }
    }
}

/// Decode a YOLO (v8/v11 layout) head: `channels` rows of 4 box values
/// followed by one score per class, across `anchors` columns.
///
/// `value(channel, anchor)` reads the raw output. Each anchor contributes at
/// most one candidate: its best class, if that score exceeds `min_score`.
pub fn decode_yolo<F>(
    channels: usize,
    anchors: usize,
    min_score: f32,
    letterbox: &Letterbox,
    value: F,
) -> Vec<Detection>
where
    F: Fn(usize, usize) -> f32,
{
    if channels <= 4 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for anchor in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for class in 0..channels - 4 {
            let score = value(4 + class, anchor);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        if !(best_score > min_score) {
            continue;
        }
        let bbox = letterbox.unmap(
            value(0, anchor),
            value(1, anchor),
            value(2, anchor),
            value(3, anchor),
        );
        out.push(Detection::new(best_class as u32, best_score.min(1.0)).with_bbox(bbox));
    }
    out
}

/// Greedy per-class non-maximum suppression. Output is sorted by confidence,
/// highest first.
pub fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_pads_the_short_side() {
        let lb = Letterbox::fit(1280, 640, 640);
        assert_eq!(lb.scale, 0.5);
        assert_eq!((lb.resized_width, lb.resized_height), (640, 320));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 160));
    }

    #[test]
    fn unmap_removes_padding_and_scale() {
        let lb = Letterbox::fit(1280, 640, 640);
        // Full-width box covering the resized region exactly.
        let b = lb.unmap(320.0, 320.0, 640.0, 320.0);
        assert!((b.x - 0.0).abs() < 1e-5);
        assert!((b.y - 0.0).abs() < 1e-5);
        assert!((b.w - 1.0).abs() < 1e-5);
        assert!((b.h - 1.0).abs() < 1e-5);
    }

    #[test]
    fn decode_keeps_best_class_above_floor() {
        let lb = Letterbox::fit(640, 640, 640);
        // 4 box rows + 3 classes, 2 anchors.
        let data = [
            [100.0, 300.0], // cx
            [100.0, 300.0], // cy
            [50.0, 50.0],   // w
            [50.0, 50.0],   // h
            [0.9, 0.1],     // class 0
            [0.2, 0.15],    // class 1
            [0.1, 0.05],    // class 2
        ];
        let out = decode_yolo(7, 2, 0.25, &lb, |c, i| data[c][i]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 0);
        assert!((out[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn nms_drops_overlapping_same_class_boxes() {
        let b = BoundingBox {
            x: 0.1,
            y: 0.1,
            w: 0.3,
            h: 0.3,
        };
        let shifted = BoundingBox { x: 0.12, ..b };
        let far = BoundingBox { x: 0.6, ..b };
        let out = non_max_suppression(
            vec![
                Detection::new(0, 0.6).with_bbox(shifted),
                Detection::new(0, 0.8).with_bbox(b),
                Detection::new(0, 0.5).with_bbox(far),
                Detection::new(2, 0.7).with_bbox(b),
            ],
            0.7,
        );
        let scores: Vec<f32> = out.iter().map(|d| d.confidence).collect();
        assert_eq!(scores, vec![0.8, 0.7, 0.5]);
    }
}
