use image::RgbImage;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};

/// Something that can open a capture device by index.
pub(crate) trait CaptureOpener: Send + Sync {
    fn open(&self, device_index: u32) -> eyre::Result<BoxedCaptureSource>;
}

/// An opened stream of frames.
///
/// Sources are only ever used on the thread that opened them, so they don't
/// need to be `Send`.
pub(crate) trait CaptureSource {
    /// Read the next frame. `Ok(None)` means the stream is exhausted.
    fn read(&mut self) -> eyre::Result<Option<RgbImage>>;

    /// Stop the stream and give the device back to the OS.
    fn release(&mut self);
}

pub(crate) type BoxedCaptureSource = Box<dyn CaptureSource>;

/// Exclusive ownership of an opened source for one session.
///
/// The source is released exactly once, either explicitly or when the handle
/// is dropped.
pub(crate) struct CaptureHandle {
    source: Option<BoxedCaptureSource>,
}

impl CaptureHandle {
    pub(crate) fn new(source: BoxedCaptureSource) -> Self {
        Self {
            source: Some(source),
        }
    }

    pub(crate) fn read(&mut self) -> eyre::Result<Option<RgbImage>> {
        match self.source.as_mut() {
            Some(source) => source.read(),
            None => Ok(None),
        }
    }

    pub(crate) fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            tracing::debug!("releasing capture device");
            source.release();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Opens local cameras through nokhwa.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NokhwaOpener;

impl CaptureOpener for NokhwaOpener {
    #[tracing::instrument(skip(self))]
    fn open(&self, device_index: u32) -> eyre::Result<BoxedCaptureSource> {
        let format =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

        let mut camera = Camera::new(CameraIndex::Index(device_index), format)?;
        camera.open_stream()?;

        tracing::info!(
            name = %camera.info().human_name(),
            resolution = %camera.resolution(),
            "opened camera"
        );

        Ok(Box::new(NokhwaSource { camera }))
    }
}

struct NokhwaSource {
    camera: Camera,
}

impl CaptureSource for NokhwaSource {
    fn read(&mut self) -> eyre::Result<Option<RgbImage>> {
        let buffer = self.camera.frame()?;
        let decoded = buffer.decode_image::<RgbFormat>()?;

        let (width, height) = decoded.dimensions();
        let frame = RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| eyre::eyre!("camera frame had unexpected size"))?;

        Ok(Some(frame))
    }

    fn release(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            tracing::warn!("could not stop camera stream: {err}");
        }
    }
}
