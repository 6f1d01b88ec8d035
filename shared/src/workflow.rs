//! The capture-and-submit workflow.
//!
//! One instance lives for as long as the lodge screen is open. It tracks the
//! camera and the location independently; capture needs both, submission
//! needs only the location. Every async result coming back from the shell is
//! tagged with the instance id so results for a discarded instance can be
//! recognised and dropped.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::api::CreateComplaintRequest;
use crate::capabilities::{CameraError, GeolocationError};
use crate::image_processing::{
    render_capture, CapturedPhoto, FrameData, Watermark, WatermarkConfig,
};
use crate::model::Category;
use crate::{format_location_label, AppError, ErrorKind, ValidatedCoordinate};

pub const FETCHING_LOCATION_LABEL: &str = "Fetching location...";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraState {
    Idle,
    Starting,
    Live,
    Capturing,
    Captured(CapturedPhoto),
}

impl CameraState {
    /// True while the shell may be holding the device open.
    #[must_use]
    pub const fn holds_device(&self) -> bool {
        matches!(self, Self::Starting | Self::Live | Self::Capturing)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LocationState {
    Unset,
    Pending,
    Resolved(ValidatedCoordinate),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Editing,
    InFlight,
    Submitted,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComplaintDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Precondition {
    #[error("Please ensure camera is on and location is fetched")]
    CaptureNotReady,
    #[error("Location is required")]
    LocationRequired,
    #[error("Title is required")]
    TitleRequired,
    #[error("Description is required")]
    DescriptionRequired,
    #[error("Camera is already on")]
    CameraBusy,
    #[error("A photo is already captured; retake to capture again")]
    PhotoAlreadyCaptured,
    #[error("There is no photo to retake")]
    NothingToRetake,
    #[error("Location is already being fetched")]
    LocationInProgress,
    #[error("Location is already set")]
    LocationAlreadyResolved,
    #[error("Complaint is being submitted")]
    SubmissionInProgress,
    #[error("Complaint was already submitted")]
    AlreadySubmitted,
    #[error("Photo capture is in progress")]
    CaptureInProgress,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(CameraError),
    #[error("location unavailable: {0}")]
    LocationUnavailable(GeolocationError),
    #[error("{0}")]
    PreconditionNotMet(Precondition),
    #[error("submission rejected: {reason}")]
    SubmissionRejected { reason: String },
}

impl From<Precondition> for WorkflowError {
    fn from(p: Precondition) -> Self {
        Self::PreconditionNotMet(p)
    }
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::DeviceUnavailable(cause) => {
                AppError::new(ErrorKind::DeviceUnavailable, "Could not access camera")
                    .with_internal(cause.to_string())
            }
            WorkflowError::LocationUnavailable(GeolocationError::Unsupported) => AppError::new(
                ErrorKind::LocationUnavailable,
                GeolocationError::Unsupported.to_string(),
            ),
            WorkflowError::LocationUnavailable(cause) => AppError::new(
                ErrorKind::LocationUnavailable,
                format!("Error getting location: {cause}"),
            ),
            WorkflowError::PreconditionNotMet(p) => {
                AppError::new(ErrorKind::PreconditionNotMet, p.to_string())
            }
            WorkflowError::SubmissionRejected { reason } => {
                AppError::new(ErrorKind::SubmissionRejected, "Failed to lodge complaint")
                    .with_internal(reason)
            }
        }
    }
}

/// State of one lodge-complaint session.
///
/// Methods named `begin_*` check preconditions and move into the matching
/// in-flight state; the caller then issues the effect. Failures leave the
/// workflow where it was, apart from clearing the in-flight marker.
#[derive(Debug)]
pub struct CaptureWorkflow {
    id: WorkflowId,
    draft: ComplaintDraft,
    camera: CameraState,
    location: LocationState,
    submission: SubmissionState,
}

impl Default for CaptureWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: WorkflowId::new(),
            draft: ComplaintDraft::default(),
            camera: CameraState::Idle,
            location: LocationState::Unset,
            submission: SubmissionState::Editing,
        }
    }

    #[must_use]
    pub const fn id(&self) -> WorkflowId {
        self.id
    }

    #[must_use]
    pub const fn draft(&self) -> &ComplaintDraft {
        &self.draft
    }

    #[must_use]
    pub const fn camera(&self) -> &CameraState {
        &self.camera
    }

    #[must_use]
    pub const fn location(&self) -> LocationState {
        self.location
    }

    #[must_use]
    pub const fn submission(&self) -> SubmissionState {
        self.submission
    }

    #[must_use]
    pub fn coordinate(&self) -> Option<ValidatedCoordinate> {
        match self.location {
            LocationState::Resolved(coord) => Some(coord),
            LocationState::Unset | LocationState::Pending => None,
        }
    }

    #[must_use]
    pub fn photo(&self) -> Option<&CapturedPhoto> {
        match &self.camera {
            CameraState::Captured(photo) => Some(photo),
            _ => None,
        }
    }

    #[must_use]
    pub fn location_label(&self) -> Option<String> {
        match self.location {
            LocationState::Resolved(coord) => Some(format_location_label(coord)),
            LocationState::Pending => Some(FETCHING_LOCATION_LABEL.to_string()),
            LocationState::Unset => None,
        }
    }

    #[must_use]
    pub fn can_capture(&self) -> bool {
        self.is_editable()
            && matches!(self.camera, CameraState::Live)
            && self.coordinate().is_some()
    }

    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.is_editable()
            && !matches!(self.camera, CameraState::Capturing)
            && self.coordinate().is_some()
    }

    fn is_editable(&self) -> bool {
        self.submission == SubmissionState::Editing
    }

    fn ensure_editable(&self) -> Result<(), WorkflowError> {
        match self.submission {
            SubmissionState::Editing => Ok(()),
            SubmissionState::InFlight => Err(Precondition::SubmissionInProgress.into()),
            SubmissionState::Submitted => Err(Precondition::AlreadySubmitted.into()),
        }
    }

    pub fn set_title(&mut self, title: String) {
        if self.is_editable() {
            self.draft.title = title;
        }
    }

    pub fn set_description(&mut self, description: String) {
        if self.is_editable() {
            self.draft.description = description;
        }
    }

    pub fn set_category(&mut self, category: Category) {
        if self.is_editable() {
            self.draft.category = category;
        }
    }

    // location

    pub fn begin_locate(&mut self) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        match self.location {
            LocationState::Unset => {
                self.location = LocationState::Pending;
                Ok(())
            }
            LocationState::Pending => Err(Precondition::LocationInProgress.into()),
            LocationState::Resolved(_) => Err(Precondition::LocationAlreadyResolved.into()),
        }
    }

    /// Applies a device fix. Returns `false` when the fix was not waited for,
    /// e.g. because a pin was dropped in the meantime.
    pub fn location_resolved(&mut self, coord: ValidatedCoordinate) -> bool {
        if self.location == LocationState::Pending && self.is_editable() {
            self.location = LocationState::Resolved(coord);
            true
        } else {
            false
        }
    }

    pub fn location_failed(&mut self, cause: GeolocationError) -> WorkflowError {
        if self.location == LocationState::Pending {
            self.location = LocationState::Unset;
        }
        WorkflowError::LocationUnavailable(cause)
    }

    /// Manual pin placement. Last one wins, whatever the device reported.
    pub fn adjust_location(&mut self, coord: ValidatedCoordinate) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        debug!(workflow = %self.id, "location pinned manually");
        self.location = LocationState::Resolved(coord);
        Ok(())
    }

    // camera

    pub fn begin_camera_start(&mut self) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        match self.camera {
            CameraState::Idle => {
                self.camera = CameraState::Starting;
                Ok(())
            }
            CameraState::Starting | CameraState::Live | CameraState::Capturing => {
                Err(Precondition::CameraBusy.into())
            }
            CameraState::Captured(_) => Err(Precondition::PhotoAlreadyCaptured.into()),
        }
    }

    /// Returns `false` when the stream was not asked for; the caller must
    /// release it.
    pub fn camera_started(&mut self) -> bool {
        if self.camera == CameraState::Starting {
            self.camera = CameraState::Live;
            true
        } else {
            false
        }
    }

    pub fn camera_failed(&mut self, cause: CameraError) -> WorkflowError {
        if self.camera == CameraState::Starting {
            self.camera = CameraState::Idle;
        }
        WorkflowError::DeviceUnavailable(cause)
    }

    pub fn begin_capture(&mut self) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        match self.camera {
            CameraState::Capturing => return Err(Precondition::CaptureInProgress.into()),
            CameraState::Captured(_) => return Err(Precondition::PhotoAlreadyCaptured.into()),
            CameraState::Idle | CameraState::Starting => {
                return Err(Precondition::CaptureNotReady.into())
            }
            CameraState::Live => {}
        }
        if self.coordinate().is_none() {
            return Err(Precondition::CaptureNotReady.into());
        }
        self.camera = CameraState::Capturing;
        Ok(())
    }

    /// Stamps the frame with `taken_at` and the current coordinate.
    ///
    /// On success the workflow holds only the stamped photo and the caller
    /// must release the device. On failure the camera stays live.
    #[instrument(skip(self, frame, config), fields(workflow = %self.id))]
    pub fn complete_capture(
        &mut self,
        frame: FrameData,
        taken_at: NaiveDateTime,
        config: &WatermarkConfig,
    ) -> Result<(), WorkflowError> {
        if self.camera != CameraState::Capturing {
            return Err(Precondition::CaptureNotReady.into());
        }
        let Some(coord) = self.coordinate() else {
            self.camera = CameraState::Live;
            return Err(Precondition::CaptureNotReady.into());
        };

        let photo = Watermark::new(taken_at, coord, &config.timestamp_format)
            .and_then(|mark| render_capture(config, frame, &mark));

        match photo {
            Ok(photo) => {
                self.camera = CameraState::Captured(photo);
                Ok(())
            }
            Err(e) => {
                self.camera = CameraState::Live;
                Err(WorkflowError::DeviceUnavailable(CameraError::InvalidFrame {
                    reason: e.to_string(),
                }))
            }
        }
    }

    pub fn capture_failed(&mut self, cause: CameraError) -> WorkflowError {
        if self.camera == CameraState::Capturing {
            self.camera = CameraState::Live;
        }
        WorkflowError::DeviceUnavailable(cause)
    }

    /// Drops the photo. The device stays off until started again.
    pub fn retake(&mut self) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        match self.camera {
            CameraState::Captured(_) => {
                self.camera = CameraState::Idle;
                Ok(())
            }
            _ => Err(Precondition::NothingToRetake.into()),
        }
    }

    // submission

    pub fn begin_submission(&mut self) -> Result<CreateComplaintRequest, WorkflowError> {
        self.ensure_editable()?;
        if self.camera == CameraState::Capturing {
            return Err(Precondition::CaptureInProgress.into());
        }
        let coord = self.coordinate().ok_or(Precondition::LocationRequired)?;
        let title = self.draft.title.trim();
        if title.is_empty() {
            return Err(Precondition::TitleRequired.into());
        }
        let description = self.draft.description.trim();
        if description.is_empty() {
            return Err(Precondition::DescriptionRequired.into());
        }

        let request = CreateComplaintRequest {
            title: title.to_string(),
            description: description.to_string(),
            category: self.draft.category,
            latitude: coord.lat(),
            longitude: coord.lng(),
            image_url: self.photo().map(|p| p.data_url().to_string()),
        };
        self.submission = SubmissionState::InFlight;
        Ok(request)
    }

    pub fn submission_succeeded(&mut self) {
        self.submission = SubmissionState::Submitted;
    }

    pub fn submission_failed(&mut self, reason: String) -> WorkflowError {
        if self.submission == SubmissionState::InFlight {
            self.submission = SubmissionState::Editing;
        }
        WorkflowError::SubmissionRejected { reason }
    }

    /// Called on every exit path. Returns whether the device may still be
    /// held and needs a stop.
    pub fn release(&mut self) -> bool {
        let held = self.camera.holds_device();
        if held {
            self.camera = CameraState::Idle;
        }
        held
    }
}
