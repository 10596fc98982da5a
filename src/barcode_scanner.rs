use std::sync::Arc;

use image::RgbImage;
use ring_channel::RingSender;
use tokio_util::sync::CancellationToken;

use crate::{
    annotate::annotate,
    barcode_decoders::{Detection, FrameDecoder},
    camera::{CaptureHandle, CaptureOpener},
};

pub(crate) const CAMERA_ERROR: &str = "Error accessing the camera.";

/// A frame ready to be shown, with any detections already drawn onto it.
#[derive(Clone)]
pub(crate) struct Preview {
    pub(crate) frame: Arc<RgbImage>,
    pub(crate) detections: Vec<Detection>,
}

impl std::fmt::Debug for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preview")
            .field("dimensions", &self.frame.dimensions())
            .field("detections", &self.detections)
            .finish()
    }
}

/// Lifecycle events of a scan session. `Opened` is only sent once the device
/// is held. Every session ends with exactly one of `Found`, `Failed`, or
/// `Stopped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScanEvent {
    Opened,
    Found(Vec<Detection>),
    Failed(String),
    Stopped,
}

/// Open the capture device for a session. Failing to open is reported as the
/// session's terminal event.
pub(crate) fn open_capture(
    opener: &dyn CaptureOpener,
    device_index: u32,
) -> Result<CaptureHandle, ScanEvent> {
    match opener.open(device_index) {
        Ok(source) => Ok(CaptureHandle::new(source)),
        Err(err) => {
            tracing::error!(device_index, "could not open capture device: {err}");
            Err(ScanEvent::Failed(CAMERA_ERROR.to_string()))
        }
    }
}

/// Open the device and scan it. See [`scan`].
pub(crate) fn run_session<F>(
    opener: &dyn CaptureOpener,
    decoder: &dyn FrameDecoder,
    device_index: u32,
    token: &CancellationToken,
    show: F,
) -> ScanEvent
where
    F: FnMut(Preview),
{
    match open_capture(opener, device_index) {
        Ok(capture) => scan(capture, decoder, token, show),
        Err(event) => event,
    }
}

/// Scan an opened device until a barcode is found, the stream fails or ends,
/// or the token is cancelled.
///
/// The capture device is released before this returns on every path.
#[tracing::instrument(skip_all)]
pub(crate) fn scan<F>(
    mut capture: CaptureHandle,
    decoder: &dyn FrameDecoder,
    token: &CancellationToken,
    mut show: F,
) -> ScanEvent
where
    F: FnMut(Preview),
{
    let mut frames = 0u64;

    let event = loop {
        if token.is_cancelled() {
            tracing::info!(frames, "session cancelled");
            break ScanEvent::Stopped;
        }

        let mut frame = match capture.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(frames, "capture stream ended");
                break ScanEvent::Stopped;
            }
            Err(err) => {
                tracing::error!(frames, "could not read frame: {err}");
                break ScanEvent::Failed(CAMERA_ERROR.to_string());
            }
        };
        frames += 1;

        let gray = image::imageops::grayscale(&frame);
        let detections = decoder.decode(&gray);

        if detections.is_empty() {
            tracing::trace!(frames, "no detections");
            show(Preview {
                frame: Arc::new(frame),
                detections,
            });
            continue;
        }

        tracing::info!(frames, count = detections.len(), "found barcodes");

        annotate(&mut frame, &detections);
        show(Preview {
            frame: Arc::new(frame),
            detections: detections.clone(),
        });

        break ScanEvent::Found(detections);
    };

    capture.release();

    event
}

/// Start a session on a blocking thread, streaming its lifecycle events.
///
/// Preview frames go through the ring channel so the newest frame always
/// replaces any the UI hasn't picked up yet.
pub(crate) fn start_session(
    token: CancellationToken,
    opener: Arc<dyn CaptureOpener>,
    decoder: Arc<dyn FrameDecoder>,
    device_index: u32,
    mut preview: RingSender<Preview>,
) -> tokio::sync::mpsc::Receiver<ScanEvent> {
    let (tx, rx) = tokio::sync::mpsc::channel(2);

    tracing::info!(device_index, "starting scan session");

    tokio::task::spawn_blocking(move || {
        let event = match open_capture(opener.as_ref(), device_index) {
            Ok(capture) => {
                if let Err(err) = tx.blocking_send(ScanEvent::Opened) {
                    tracing::error!("could not send scan event: {err}");
                    return;
                }

                scan(capture, decoder.as_ref(), &token, |frame| {
                    if preview.send(frame).is_err() {
                        tracing::trace!("preview receiver closed");
                    }
                })
            }
            Err(event) => event,
        };

        if let Err(err) = tx.blocking_send(event) {
            tracing::error!("could not send scan event: {err}");
        }
    });

    rx
}
