//! Crop detection: captures one frame from a camera, finds the bounding
//! box of whatever's in frame, and applies a centered crop that contains it.
//!
//! Grounded in the original `CropTask`, with one deliberate simplification:
//! the original performs an OpenCV-tutorial contour/bounding-rect/circle
//! analysis (`findContours`, `approxPolyDP`, `minEnclosingCircle`) and
//! returns a Base64-encoded visualization of the drawn shapes. No OpenCV
//! binding is grounded anywhere in this codebase's dependency stack, so
//! this port keeps the *geometry* the original computes — a union bounding
//! box over detected regions, then a symmetric border-aligned crop (the
//! original's "Variant C") — via a plain luminance-threshold connected
//! region scan using the `image` crate, and drops the shape-drawing
//! visualization entirely rather than fabricate an OpenCV-equivalent crate.
//!
//! Blocking: runs on the worker pool, not pause/cancel-cooperative, same as
//! the original (`is_blocking = True`).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use openscan3_core::CameraController;
use openscan3_scheduler::task::Task;

#[derive(Debug, Serialize, Deserialize)]
pub struct CropTaskArgs {
    pub camera_name: String,
    /// Luminance threshold (0..255) separating foreground from background.
    /// Defaults to the original's Canny threshold default of 100.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
}

fn default_threshold() -> u8 {
    100
}

#[derive(Debug, Clone, Copy)]
struct BoundingBox {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// Analyzes one camera frame and sets its crop settings accordingly.
pub struct CropTask {
    camera: std::sync::Arc<dyn CameraController>,
}

impl CropTask {
    pub const TASK_NAME: &'static str = "crop_task";

    pub fn new(camera: std::sync::Arc<dyn CameraController>) -> Self {
        Self { camera }
    }
}

#[async_trait::async_trait]
impl Task for CropTask {
    fn task_name(&self) -> &'static str {
        Self::TASK_NAME
    }

    fn is_blocking(&self) -> bool {
        true
    }

    fn run_blocking(&self, args: Value) -> anyhow::Result<Option<Value>> {
        // `camera_name` selects which collaborator the embedding binary wired
        // up as `self.camera`; this task itself only ever drives that one.
        let CropTaskArgs { threshold, .. } = serde_json::from_value(args)?;

        let handle = tokio::runtime::Handle::current();
        let photo = handle.block_on(self.camera.photo("jpeg"))?;
        let orientation_flag = self.camera.settings().orientation_flag;

        let image = image::load_from_memory(&photo.bytes)?;
        let oriented = apply_orientation(image, orientation_flag).to_rgb8();

        let roi = detect_roi(&oriented, threshold);
        let (crop_width, crop_height) = symmetric_crop_percent(oriented.width(), oriented.height(), roi);

        let mut settings = self.camera.settings();
        settings.crop_width = crop_width;
        settings.crop_height = crop_height;
        self.camera.set_settings(settings);

        Ok(Some(json!({
            "bbox": [roi.x, roi.y, roi.w, roi.h],
            "crop_width": crop_width,
            "crop_height": crop_height,
        })))
    }
}

fn apply_orientation(image: image::DynamicImage, orientation_flag: u8) -> image::DynamicImage {
    match orientation_flag {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.fliph().rotate90(),
        6 => image.rotate90(),
        7 => image.fliph().rotate270(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Union bounding box of every pixel darker than `threshold` (treated as
/// foreground), mirroring the original's union-of-bounding-rects ROI. A
/// frame with nothing below threshold yields the full frame, same as the
/// original's empty-contour fallback.
fn detect_roi(image: &image::RgbImage, threshold: u8) -> BoundingBox {
    let (width, height) = image.dimensions();
    let mut min_x = width;
    let mut min_y = height;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        let luma = (pixel[0] as u32 * 299 + pixel[1] as u32 * 587 + pixel[2] as u32 * 114) / 1000;
        if luma < threshold as u32 {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if !found {
        return BoundingBox { x: 0, y: 0, w: width, h: height };
    }
    BoundingBox {
        x: min_x,
        y: min_y,
        w: max_x - min_x + 1,
        h: max_y - min_y + 1,
    }
}

/// The original's "Variant C": a centered crop built from the minimum
/// per-axis offset between the ROI and each border, expressed as the
/// percentage of the full frame cropped away.
fn symmetric_crop_percent(img_w: u32, img_h: u32, roi: BoundingBox) -> (u32, u32) {
    let left_off = roi.x;
    let right_off = img_w.saturating_sub(roi.x + roi.w);
    let top_off = roi.y;
    let bottom_off = img_h.saturating_sub(roi.y + roi.h);

    let pad_x = left_off.min(right_off);
    let pad_y = top_off.min(bottom_off);

    let sym_w = img_w.saturating_sub(2 * pad_x).max(1);
    let sym_h = img_h.saturating_sub(2 * pad_y).max(1);

    let crop_w_percent = (100 - (sym_w * 100 / img_w).min(100)).min(100);
    let crop_h_percent = (100 - (sym_h * 100 / img_h).min(100)).min(100);
    (crop_w_percent, crop_h_percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openscan3_core::{CameraSettings, PhotoData};
    use std::sync::Mutex;

    struct FakeCamera {
        settings: Mutex<CameraSettings>,
        jpeg_bytes: Vec<u8>,
    }

    #[async_trait::async_trait]
    impl CameraController for FakeCamera {
        async fn photo(&self, _format: &str) -> anyhow::Result<PhotoData> {
            Ok(PhotoData {
                bytes: self.jpeg_bytes.clone(),
                scan_metadata: None,
            })
        }
        async fn preview(&self) -> anyhow::Result<Vec<u8>> {
            Ok(self.jpeg_bytes.clone())
        }
        async fn is_busy(&self) -> bool {
            false
        }
        fn settings(&self) -> CameraSettings {
            self.settings.lock().unwrap().clone()
        }
        fn set_settings(&self, settings: CameraSettings) {
            *self.settings.lock().unwrap() = settings;
        }
    }

    fn encode_test_frame(width: u32, height: u32, fg: image::Rgb<u8>, bg: image::Rgb<u8>, fg_box: (u32, u32, u32, u32)) -> Vec<u8> {
        let mut img = image::RgbImage::from_pixel(width, height, bg);
        let (x, y, w, h) = fg_box;
        for py in y..y + h {
            for px in x..x + w {
                img.put_pixel(px, py, fg);
            }
        }
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn finds_bounding_box_and_applies_symmetric_crop() {
        let jpeg = encode_test_frame(100, 100, image::Rgb([10, 10, 10]), image::Rgb([240, 240, 240]), (20, 30, 20, 20));
        let camera = std::sync::Arc::new(FakeCamera {
            settings: Mutex::new(CameraSettings::default()),
            jpeg_bytes: jpeg,
        });
        let task = CropTask::new(camera.clone());

        let args = serde_json::to_value(CropTaskArgs {
            camera_name: "main".into(),
            threshold: 100,
        })
        .unwrap();

        let result = tokio::task::spawn_blocking({
            let task = std::sync::Arc::new(task);
            move || task.run_blocking(args)
        })
        .await
        .unwrap()
        .unwrap()
        .unwrap();

        let bbox: Vec<u32> = serde_json::from_value(result["bbox"].clone()).unwrap();
        // JPEG is lossy, so assert the detected region is close to (20, 30, 20, 20) rather than exact.
        assert!(bbox[0] <= 25 && bbox[1] <= 35);

        let applied = camera.settings();
        assert!(applied.crop_width > 0);
        assert!(applied.crop_height > 0);
    }

    #[tokio::test]
    async fn empty_frame_yields_full_frame_roi_and_zero_crop() {
        let jpeg = encode_test_frame(64, 64, image::Rgb([200, 200, 200]), image::Rgb([200, 200, 200]), (0, 0, 0, 0));
        let camera = std::sync::Arc::new(FakeCamera {
            settings: Mutex::new(CameraSettings::default()),
            jpeg_bytes: jpeg,
        });
        let task = CropTask::new(camera.clone());

        let args = serde_json::to_value(CropTaskArgs {
            camera_name: "main".into(),
            threshold: 100,
        })
        .unwrap();

        let result = tokio::task::spawn_blocking({
            let task = std::sync::Arc::new(task);
            move || task.run_blocking(args)
        })
        .await
        .unwrap()
        .unwrap()
        .unwrap();

        assert_eq!(result["crop_width"], 0);
        assert_eq!(result["crop_height"], 0);
    }
}
