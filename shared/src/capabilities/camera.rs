use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image_processing::FrameData;

/// Live video feed owned by the shell.
///
/// The stream is exclusive: while it runs no other part of the app may hold
/// the device, and `stop_stream` must be sent on every exit path.
#[derive(Clone)]
pub struct Camera<E> {
    context: CapabilityContext<CameraOperation, E>,
}

impl<Ev> Capability<Ev> for Camera<Ev> {
    type Operation = CameraOperation;
    type MappedSelf<MappedEv> = Camera<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Camera::new(self.context.map_event(f))
    }
}

impl<E> Camera<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<CameraOperation, E>) -> Self {
        Self { context }
    }

    pub fn start_stream<F>(&self, facing: CameraFacing, callback: F)
    where
        F: FnOnce(CameraResult) -> E + Send + 'static,
    {
        self.request(CameraOperation::StartStream { facing }, callback);
    }

    /// Grabs the current frame of the running stream.
    pub fn capture_frame<F>(&self, callback: F)
    where
        F: FnOnce(CameraResult) -> E + Send + 'static,
    {
        self.request(CameraOperation::CaptureFrame, callback);
    }

    /// Stops every active track. Fire-and-forget; stopping an idle device is a no-op.
    pub fn stop_stream(&self) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(CameraOperation::StopStream).await;
        });
    }

    fn request<F>(&self, operation: CameraOperation, callback: F)
    where
        F: FnOnce(CameraResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context.request_from_shell(operation).await;
            context.update_app(callback(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraOperation {
    StartStream { facing: CameraFacing },
    CaptureFrame,
    StopStream,
}

impl Operation for CameraOperation {
    type Output = CameraResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CameraFacing {
    Front,
    #[default]
    Back,
}

pub type CameraResult = Result<CameraOutput, CameraError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraOutput {
    StreamStarted,
    Frame(FrameData),
    Stopped,
}

impl CameraOutput {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StreamStarted => "stream_started",
            Self::Frame(_) => "frame",
            Self::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device available")]
    NoDevice,

    #[error("camera is in use by another application")]
    DeviceBusy,

    #[error("camera stream is not running")]
    NotStreaming,

    #[error("unexpected camera output: {output}")]
    UnexpectedOutput { output: String },

    #[error("unusable frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("camera failure: {reason}")]
    Platform { reason: String },
}

#[cfg(test)]
mod camera_tests {
    use super::*;

    #[test]
    fn default_facing_is_back_camera() {
        assert_eq!(CameraFacing::default(), CameraFacing::Back);
    }

    #[test]
    fn output_kind_names_are_stable() {
        assert_eq!(CameraOutput::StreamStarted.kind(), "stream_started");
        assert_eq!(CameraOutput::Stopped.kind(), "stopped");
    }

    #[test]
    fn errors_round_trip_through_serde() {
        let err = CameraError::Platform {
            reason: "NotReadableError".into(),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: CameraError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
