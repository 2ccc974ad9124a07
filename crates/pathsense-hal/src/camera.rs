//! Camera device trait and the lease that owns it for a screen's lifetime.

use pathsense_types::NavError;
use tracing::{info, warn};

/// Message shown to the user when the camera stream cannot be opened.
pub const CAMERA_DENIED_MESSAGE: &str = "Camera access denied.";

/// Which physical camera a stream is requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    /// Rear camera, pointing at the surroundings.
    Environment,
    /// Front camera, pointing at the user.
    User,
}

/// Pixel encoding of a [`CameraFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Jpeg,
    Rgb24,
}

impl FrameFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "image/jpeg",
            FrameFormat::Rgb24 => "application/octet-stream",
        }
    }
}

/// A still frame grabbed from the video stream.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    pub format: FrameFormat,
    /// Encoded bytes (a complete JPEG file for [`FrameFormat::Jpeg`]).
    pub data: Vec<u8>,
}

/// A video-capable camera.
///
/// Drivers are handed to a [`CameraLease`], which is the only caller of
/// [`acquire`][Self::acquire] and [`release`][Self::release].
pub trait CameraDevice: Send {
    /// Stable identifier for this camera, e.g. `"rear"`.
    fn id(&self) -> &str;

    /// Open a stream facing `facing`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Camera`] when permission is denied or the device
    /// is unavailable.
    fn acquire(&mut self, facing: CameraFacing) -> Result<(), NavError>;

    /// Grab the current frame from an open stream.
    fn capture(&mut self) -> Result<CameraFrame, NavError>;

    /// Stop every track of the stream.  Must tolerate being called after a
    /// failed [`acquire`][Self::acquire].
    fn release(&mut self);
}

/// Exclusive ownership of one camera for the lifetime of a screen.
///
/// A lease exists even when acquisition failed, so that teardown always has
/// exactly one release path: [`release`][Self::release] or `Drop`, whichever
/// comes first, calls [`CameraDevice::release`] once.
pub struct CameraLease {
    device: Option<Box<dyn CameraDevice>>,
    error: Option<NavError>,
}

impl CameraLease {
    /// Try to open `device` facing `facing` and wrap it in a lease.
    pub fn acquire(mut device: Box<dyn CameraDevice>, facing: CameraFacing) -> Self {
        let error = device.acquire(facing).err();
        match &error {
            None => info!(camera = device.id(), ?facing, "camera stream acquired"),
            Some(e) => warn!(camera = device.id(), error = %e, "camera acquisition failed"),
        }
        Self {
            device: Some(device),
            error,
        }
    }

    /// `true` while the stream is open and not yet released.
    pub fn is_live(&self) -> bool {
        self.device.is_some() && self.error.is_none()
    }

    /// User-facing error line, `None` when the stream opened.
    pub fn error_message(&self) -> Option<&'static str> {
        self.error.as_ref().map(|_| CAMERA_DENIED_MESSAGE)
    }

    /// Grab a frame from the leased camera.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Camera`] when the stream never opened, was already
    /// released, or the driver fails.
    pub fn capture(&mut self) -> Result<CameraFrame, NavError> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        match self.device.as_mut() {
            Some(device) => device.capture(),
            None => Err(NavError::Camera {
                device: "camera".to_string(),
                details: "stream already released".to_string(),
            }),
        }
    }

    /// Run the release path.  Idempotent.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            info!(camera = device.id(), "camera stream released");
        }
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}
