use std::fmt::Debug;

use image::GrayImage;

/// Axis-aligned region of a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Rect {
    pub(crate) x: u32,
    pub(crate) y: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Rect {
    /// Smallest rectangle containing every point, clamped to a frame of the
    /// given size.
    pub(crate) fn bounding(points: &[(i32, i32)], frame_width: u32, frame_height: u32) -> Self {
        let clamp_x = |x: i32| x.clamp(0, frame_width as i32) as u32;
        let clamp_y = |y: i32| y.clamp(0, frame_height as i32) as u32;

        let min_x = points.iter().map(|p| p.0).min().map(clamp_x).unwrap_or(0);
        let max_x = points.iter().map(|p| p.0).max().map(clamp_x).unwrap_or(0);
        let min_y = points.iter().map(|p| p.1).min().map(clamp_y).unwrap_or(0);
        let max_y = points.iter().map(|p| p.1).max().map(clamp_y).unwrap_or(0);

        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }
}

/// A barcode located and decoded in a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Detection {
    pub(crate) rect: Rect,
    pub(crate) text: String,
}

pub(crate) trait FrameDecoder: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Find every barcode in the frame. An empty result means nothing was
    /// detected, which isn't an error.
    fn decode(&self, frame: &GrayImage) -> Vec<Detection>;
}

#[derive(Debug, Default)]
pub(crate) struct QrDecoder;

impl FrameDecoder for QrDecoder {
    fn name(&self) -> &'static str {
        "QR Code"
    }

    #[tracing::instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    fn decode(&self, frame: &GrayImage) -> Vec<Detection> {
        let (width, height) = frame.dimensions();

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| frame.get_pixel(x as u32, y as u32).0[0],
        );

        let grids = prepared.detect_grids();
        tracing::trace!(count = grids.len(), "located grids");

        grids
            .into_iter()
            .filter_map(|grid| {
                let corners = grid.bounds.map(|point| (point.x, point.y));

                match grid.decode() {
                    Ok((_meta, text)) => Some(Detection {
                        rect: Rect::bounding(&corners, width, height),
                        text,
                    }),
                    Err(err) => {
                        tracing::trace!(name = self.name(), "could not decode grid: {err}");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Text shown for a set of detections.
///
/// Later detections overwrite earlier ones, so the last one wins.
pub(crate) fn result_text(detections: &[Detection]) -> Option<&str> {
    detections.last().map(|detection| detection.text.as_str())
}
