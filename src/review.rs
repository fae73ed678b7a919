//! Manual review of likely mislabels.
//!
//! Review never moves files and never writes a move log. It collects a capped
//! list of matches and can render them as a contact sheet.

use std::path::PathBuf;

use crate::config::RelabelConfig;
use crate::dataset::DatasetLayout;
use crate::detect::open_backend;
use crate::error::RelabelError;
use crate::scan::{DecisionRule, Scan, ScanOutcome};

#[derive(Clone, Debug, PartialEq)]
pub struct ReviewItem {
    pub path: PathBuf,
    pub filename: String,
    pub confidence: f32,
}

/// Keep the first `max_images` matches, then stop pulling from `outcomes`.
///
/// The per-file short-circuit already happened in the scan; the cap here is
/// what ends the whole scan early.
pub fn collect_review_candidates<I>(outcomes: I, max_images: usize) -> Vec<ReviewItem>
where
    I: IntoIterator<Item = ScanOutcome>,
{
    let mut items = Vec::new();
    if max_images == 0 {
        return items;
    }
    for outcome in outcomes {
        match outcome {
            ScanOutcome::Matched(m) => {
                items.push(ReviewItem {
                    path: m.path,
                    filename: m.filename,
                    confidence: m.confidence,
                });
                if items.len() >= max_images {
                    break;
                }
            }
            ScanOutcome::Failed {
                filename, error, ..
            } => log::warn!("error processing {}: {}", filename, error),
            ScanOutcome::Clean { .. } => {}
        }
    }
    items
}

/// Load the configured detector and collect review candidates from the
/// non-person directory.
pub fn review_mislabeled(config: &RelabelConfig) -> Result<Vec<ReviewItem>, RelabelError> {
    config.validate()?;
    let mut backend = open_backend(&config.detector)?;
    let layout = DatasetLayout::open_non_person(&config.dataset_root)?;
    let rule = DecisionRule::new(config.threshold, config.person_class_id);
    let scan = Scan::new(backend.as_mut(), &layout, rule)?;
    let items = collect_review_candidates(scan, config.review.max_images);
    log::info!("found {} likely mislabeled images", items.len());
    Ok(items)
}

#[cfg(feature = "review")]
pub use sheet::render_contact_sheet;

#[cfg(feature = "review")]
mod sheet {
    use super::*;
    use std::path::Path;

    use anyhow::{Context, Result};
    use image::{imageops, Rgb, RgbImage};

    use crate::config::ReviewSettings;

    const BAR_HEIGHT: u32 = 6;
    const GAP: u32 = 4;
    const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
    const EMPTY_CELL: Rgb<u8> = Rgb([200, 200, 200]);
    const BAR_TRACK: Rgb<u8> = Rgb([225, 225, 225]);
    const BAR_FILL: Rgb<u8> = Rgb([46, 160, 67]);

    /// Draw `items` as a grid of thumbnails, row-major, `settings.columns`
    /// wide. Under each thumbnail a bar shows the match confidence.
    ///
    /// Images that cannot be opened are logged and left as grey cells.
    /// Returns the number of thumbnails drawn. Nothing is written when
    /// `items` is empty.
    pub fn render_contact_sheet(
        items: &[ReviewItem],
        settings: &ReviewSettings,
        out_path: &Path,
    ) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let thumb = settings.thumb_size;
        let columns = settings.columns.min(items.len() as u32).max(1);
        let rows = (items.len() as u32).div_ceil(columns);
        let cell_w = thumb + GAP;
        let cell_h = thumb + BAR_HEIGHT + GAP * 2;
        let mut canvas =
            RgbImage::from_pixel(columns * cell_w + GAP, rows * cell_h + GAP, BACKGROUND);

        let mut drawn = 0;
        for (index, item) in items.iter().enumerate() {
            let col = index as u32 % columns;
            let row = index as u32 / columns;
            let x0 = GAP + col * cell_w;
            let y0 = GAP + row * cell_h;

            match image::open(&item.path) {
                Ok(img) => {
                    let small = img.thumbnail(thumb, thumb).to_rgb8();
                    let dx = (thumb - small.width()) / 2;
                    let dy = (thumb - small.height()) / 2;
                    imageops::overlay(&mut canvas, &small, (x0 + dx) as i64, (y0 + dy) as i64);
                    drawn += 1;
                }
                Err(e) => {
                    log::warn!("error displaying {}: {}", item.filename, e);
                    fill_rect(&mut canvas, x0, y0, thumb, thumb, EMPTY_CELL);
                }
            }

            let bar_y = y0 + thumb + GAP;
            let filled = ((thumb as f32) * item.confidence.clamp(0.0, 1.0)).round() as u32;
            fill_rect(&mut canvas, x0, bar_y, thumb, BAR_HEIGHT, BAR_TRACK);
            fill_rect(&mut canvas, x0, bar_y, filled, BAR_HEIGHT, BAR_FILL);
        }

        canvas
            .save(out_path)
            .with_context(|| format!("failed to write contact sheet {}", out_path.display()))?;
        Ok(drawn)
    }

    fn fill_rect(canvas: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
        for y in y0..(y0 + h).min(canvas.height()) {
            for x in x0..(x0 + w).min(canvas.width()) {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::Match;

    fn matched(name: &str, confidence: f32) -> ScanOutcome {
        ScanOutcome::Matched(Match {
            path: PathBuf::from(name),
            file_name: name.into(),
            filename: name.to_string(),
            confidence,
        })
    }

    #[test]
    fn cap_stops_pulling_outcomes() {
        let mut pulled = 0;
        let outcomes = (0..10).map(|i| {
            pulled += 1;
            matched(&format!("{i}.jpg"), 0.5)
        });
        let items = collect_review_candidates(outcomes, 3);
        assert_eq!(items.len(), 3);
        assert_eq!(pulled, 3);
    }

    #[test]
    fn failures_and_clean_files_are_skipped() {
        let outcomes = vec![
            ScanOutcome::Clean {
                path: PathBuf::from("a.jpg"),
                filename: "a.jpg".to_string(),
            },
            ScanOutcome::Failed {
                path: PathBuf::from("b.jpg"),
                filename: "b.jpg".to_string(),
                error: crate::error::DetectionError::Inference("boom".to_string()),
            },
            matched("c.jpg", 0.7),
        ];
        let items = collect_review_candidates(outcomes, 20);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].filename, "c.jpg");
    }

    #[cfg(feature = "review")]
    #[test]
    fn contact_sheet_draws_readable_images_and_blanks_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        image::RgbImage::from_pixel(40, 20, image::Rgb([10, 20, 30]))
            .save(&good)
            .unwrap();
        let items = vec![
            ReviewItem {
                path: good,
                filename: "good.png".to_string(),
                confidence: 0.8,
            },
            ReviewItem {
                path: dir.path().join("missing.png"),
                filename: "missing.png".to_string(),
                confidence: 0.5,
            },
        ];
        let settings = crate::config::ReviewSettings {
            thumb_size: 32,
            ..Default::default()
        };
        let out = dir.path().join("sheet.png");
        let drawn = render_contact_sheet(&items, &settings, &out).unwrap();
        assert_eq!(drawn, 1);
        let sheet = image::open(&out).unwrap();
        // Two columns of (32 + 4) plus the leading gap.
        assert_eq!(sheet.width(), 2 * 36 + 4);
    }
}
