// lib.rs - complaint-lodging core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod image_processing;
pub mod model;
pub mod session;
pub mod view;
pub mod workflow;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::AppConfig;
pub use event::Event;
pub use model::Model;
pub use view::ViewModel;

pub const SESSION_STORAGE_KEY: &str = "session:current";
pub const SESSION_RECORD_VERSION: u32 = 1;
pub const COORDINATE_DECIMALS: usize = 6;
pub const MAX_FRAME_BYTES: usize = 32 * 1024 * 1024;
pub const MAX_FRAME_DIMENSION: u32 = 4096;
pub const MAX_FRAME_ALLOC: u64 = 256 * 1024 * 1024;
pub const LODGE_MAP_ZOOM: u8 = 13;
pub const ADMIN_MAP_ZOOM: u8 = 5;
pub const ADMIN_MAP_CENTER: (f64, f64) = (20.5937, 78.9629);
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DeviceUnavailable,
    LocationUnavailable,
    PreconditionNotMet,
    SubmissionRejected,
    AuthenticationFailed,
    RegistrationFailed,
    LoadFailed,
    StatusUpdateFailed,
    InvalidInput,
    Storage,
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DeviceUnavailable => "DEVICE_UNAVAILABLE",
            Self::LocationUnavailable => "LOCATION_UNAVAILABLE",
            Self::PreconditionNotMet => "PRECONDITION_NOT_MET",
            Self::SubmissionRejected => "SUBMISSION_REJECTED",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::RegistrationFailed => "REGISTRATION_FAILED",
            Self::LoadFailed => "LOAD_FAILED",
            Self::StatusUpdateFailed => "STATUS_UPDATE_FAILED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Storage => "STORAGE_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
        }
    }
}

/// A failure surfaced to the user as a transient notification.
///
/// Nothing is retried automatically; the user repeats the step that failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::DeviceUnavailable => "Could not access camera".into(),
            ErrorKind::SubmissionRejected => "Failed to lodge complaint".into(),
            ErrorKind::LoadFailed => "Error fetching complaints".into(),
            ErrorKind::StatusUpdateFailed => "Failed to update status".into(),
            ErrorKind::Storage => "Unable to save your session on this device.".into(),
            ErrorKind::Configuration => {
                "The app is misconfigured. Please contact support.".into()
            }
            ErrorKind::LocationUnavailable
            | ErrorKind::PreconditionNotMet
            | ErrorKind::AuthenticationFailed
            | ErrorKind::RegistrationFailed
            | ErrorKind::InvalidInput => self.message.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

impl From<CoordinateError> for AppError {
    fn from(e: CoordinateError) -> Self {
        AppError::new(ErrorKind::InvalidInput, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatedCoordinate {
    lat: f64,
    lng: f64,
}

impl ValidatedCoordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(CoordinateError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lng(self) -> f64 {
        self.lng
    }
}

/// `"12.970000, 77.590000"`
#[must_use]
pub fn format_coordinate(coord: ValidatedCoordinate) -> String {
    format!(
        "{:.prec$}, {:.prec$}",
        coord.lat,
        coord.lng,
        prec = COORDINATE_DECIMALS
    )
}

#[must_use]
pub fn format_location_label(coord: ValidatedCoordinate) -> String {
    format!("✓ {}", format_coordinate(coord))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        Self(u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default())
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedView {
    #[default]
    List,
    Map,
}

impl FeedView {
    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            Self::Map => Self::List,
            Self::List => Self::Map,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            created_at_ms: UnixTimeMs::now().as_millis(),
            duration_ms: kind.default_duration_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

pub mod app {
    use crux_http::RequestBuilder;
    use tracing::{debug, info, warn};

    use super::{AppError, ErrorKind, ToastKind, ValidatedCoordinate, SESSION_STORAGE_KEY};
    use crate::api::{
        CreateComplaintRequest, LoginRequest, LoginResponse, RegisterRequest,
        StatusUpdateRequest,
    };
    use crate::capabilities::http::{self, Endpoint, Method};
    use crate::capabilities::{
        CameraError, CameraFacing, CameraOutput, Capabilities, GeolocationError,
        GeolocationOptions, KvError, Position,
    };
    use crate::event::{Event, LoginPortal, RegistrationForm, Secret};
    use crate::model::{Complaint, ComplaintId, ComplaintStatus, Model, Screen};
    use crate::session::{self, Session};
    use crate::view::{self, ViewModel};
    use crate::workflow::{CaptureWorkflow, Precondition, WorkflowError, WorkflowId};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn navigate(model: &mut Model, caps: &Capabilities, requested: Screen) {
            let target = requested.resolve(model.session.as_ref());
            if target != requested {
                debug!(requested = ?requested, target = ?target, "route guarded");
            }

            if target == model.screen && model.session_restored {
                Self::refresh_screen(model, caps);
                return;
            }

            Self::leave_screen(model, caps);
            model.screen = target;
            Self::enter_screen(model, caps);
        }

        fn leave_screen(model: &mut Model, caps: &Capabilities) {
            match model.screen {
                Screen::LodgeComplaint => Self::discard_workflow(model, caps),
                Screen::AdminDashboard => {
                    model.admin.selected = None;
                    model.admin.remarks.clear();
                }
                Screen::Login | Screen::AdminLogin | Screen::Register | Screen::Dashboard => {}
            }
        }

        fn enter_screen(model: &mut Model, caps: &Capabilities) {
            match model.screen {
                Screen::Dashboard => Self::fetch_my_complaints(model, caps),
                Screen::AdminDashboard => Self::fetch_admin_complaints(model, caps),
                Screen::LodgeComplaint => {
                    Self::discard_workflow(model, caps);
                    let mut workflow = CaptureWorkflow::new();
                    info!(workflow = %workflow.id(), "capture workflow started");
                    if workflow.begin_locate().is_ok() {
                        Self::request_position(workflow.id(), model, caps);
                    }
                    model.workflow = Some(workflow);
                }
                Screen::Login | Screen::AdminLogin | Screen::Register => {}
            }
        }

        /// Leaves whatever screen is showing, tearing down its state, and parks on Login.
        fn return_to_login(model: &mut Model, caps: &Capabilities) {
            Self::leave_screen(model, caps);
            model.screen = Screen::Login;
        }

        fn refresh_screen(model: &mut Model, caps: &Capabilities) {
            match model.screen {
                Screen::Dashboard => Self::fetch_my_complaints(model, caps),
                Screen::AdminDashboard => Self::fetch_admin_complaints(model, caps),
                Screen::Login
                | Screen::AdminLogin
                | Screen::Register
                | Screen::LodgeComplaint => {}
            }
        }

        /// Drops the workflow instance, releasing the camera whatever state it was in.
        fn discard_workflow(model: &mut Model, caps: &Capabilities) {
            if let Some(mut workflow) = model.workflow.take() {
                if workflow.release() {
                    caps.camera.stop_stream();
                    info!(workflow = %workflow.id(), "camera released on workflow exit");
                }
            }
        }

        fn active_workflow(model: &mut Model, id: WorkflowId) -> Option<&mut CaptureWorkflow> {
            model.workflow.as_mut().filter(|workflow| workflow.id() == id)
        }

        fn request_position(id: WorkflowId, model: &Model, caps: &Capabilities) {
            let options = GeolocationOptions {
                high_accuracy: model.config.location.high_accuracy,
                timeout_ms: model.config.location.timeout_ms,
            };
            caps.geolocation
                .current_position(options, move |result| Event::LocationReceived {
                    workflow: id,
                    result,
                });
        }

        fn endpoint_url(model: &mut Model, endpoint: &Endpoint) -> Option<url::Url> {
            match model.config.api.url_for(endpoint) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(error = %e, path = %endpoint.path(), "cannot build endpoint url");
                    model.set_error(e.into());
                    None
                }
            }
        }

        /// Starts a request to `endpoint`, attaching the bearer token when the
        /// route requires one. `None` means the failure has already been reported.
        fn endpoint_request(
            model: &mut Model,
            caps: &Capabilities,
            endpoint: &Endpoint,
        ) -> Option<RequestBuilder<Event>> {
            let bearer = if endpoint.requires_auth() {
                let Some(bearer) = model.session.as_ref().map(Session::bearer_header) else {
                    warn!(path = %endpoint.path(), "authenticated request without a session");
                    return None;
                };
                Some(bearer)
            } else {
                None
            };
            let url = Self::endpoint_url(model, endpoint)?;

            let builder = match endpoint.method() {
                Method::Get => caps.http.get(url.as_str()),
                Method::Post => caps.http.post(url.as_str()),
                Method::Put => caps.http.put(url.as_str()),
            };
            Some(match bearer {
                Some(bearer) => builder.header("Authorization", bearer.as_str()),
                None => builder,
            })
        }

        fn persist_session(session: &Session, caps: &Capabilities) {
            match session::encode(session) {
                Ok(bytes) => {
                    caps.kv
                        .set(SESSION_STORAGE_KEY.to_string(), bytes, Event::SessionPersisted);
                }
                Err(e) => warn!(error = %e, "session not persisted"),
            }
        }

        fn submit_login(
            model: &mut Model,
            caps: &Capabilities,
            portal: LoginPortal,
            username: String,
            password: &Secret,
        ) {
            if username.trim().is_empty() || password.expose().is_empty() {
                model.set_error(AppError::new(
                    ErrorKind::AuthenticationFailed,
                    "Username and password are required",
                ));
                return;
            }

            let endpoint = match portal {
                LoginPortal::Citizen => Endpoint::Login,
                LoginPortal::Admin => Endpoint::AdminLogin,
            };
            let Some(builder) = Self::endpoint_request(model, caps, &endpoint) else {
                return;
            };

            let body = LoginRequest {
                username: username.trim(),
                password: password.expose(),
            };
            match builder.body_json(&body) {
                Ok(request) => {
                    let username = username.trim().to_string();
                    request.send(move |result| Event::LoginResponse {
                        portal,
                        username,
                        result: Box::new(result),
                    });
                    model.auth_pending = true;
                }
                Err(e) => model.set_error(
                    AppError::new(ErrorKind::AuthenticationFailed, "Login failed")
                        .with_internal(e.to_string()),
                ),
            }
        }

        fn handle_login_response(
            model: &mut Model,
            caps: &Capabilities,
            portal: LoginPortal,
            username: String,
            response: Result<LoginResponse, http::HttpFailure>,
        ) {
            model.auth_pending = false;

            let login = match response {
                Ok(login) => login,
                Err(failure) => {
                    warn!(error = %failure, portal = ?portal, "login rejected");
                    let message = failure.server_message().unwrap_or("Login failed").to_string();
                    model.set_error(
                        AppError::new(ErrorKind::AuthenticationFailed, message)
                            .with_internal(failure.to_string()),
                    );
                    return;
                }
            };

            if !portal.accepts(login.role) {
                warn!(role = ?login.role, portal = ?portal, "role not allowed on this portal");
                model.set_error(AppError::new(
                    ErrorKind::AuthenticationFailed,
                    "This account cannot sign in here",
                ));
                return;
            }

            let session = match Session::new(username, login.role, login.token) {
                Ok(session) => session,
                Err(e) => {
                    model.set_error(e.into());
                    return;
                }
            };

            info!(role = ?session.role(), "login succeeded");
            Self::persist_session(&session, caps);
            let home = session.role().home_screen();
            model.session = Some(session);
            model.show_toast(portal.success_message(), ToastKind::Success);
            Self::navigate(model, caps, home);
        }

        fn submit_registration(model: &mut Model, caps: &Capabilities, form: &RegistrationForm) {
            let request = match RegisterRequest::from_form(form) {
                Ok(request) => request,
                Err(message) => {
                    model.set_error(AppError::new(ErrorKind::RegistrationFailed, message));
                    return;
                }
            };
            let Some(builder) = Self::endpoint_request(model, caps, &Endpoint::Register) else {
                return;
            };

            match builder.body_json(&request) {
                Ok(builder) => {
                    builder.send(|result| Event::RegisterResponse(Box::new(result)));
                    model.auth_pending = true;
                }
                Err(e) => model.set_error(
                    AppError::new(ErrorKind::RegistrationFailed, "Registration failed")
                        .with_internal(e.to_string()),
                ),
            }
        }

        fn fetch_my_complaints(model: &mut Model, caps: &Capabilities) {
            let Some(builder) = Self::endpoint_request(model, caps, &Endpoint::MyComplaints)
            else {
                return;
            };
            model.citizen.is_loading = true;
            builder.send(|result| Event::MyComplaintsLoaded(Box::new(result)));
        }

        fn fetch_admin_complaints(model: &mut Model, caps: &Capabilities) {
            let Some(builder) = Self::endpoint_request(model, caps, &Endpoint::AdminComplaints)
            else {
                return;
            };
            model.admin.is_loading = true;
            builder.send(|result| Event::AdminComplaintsLoaded(Box::new(result)));
        }

        fn submit_complaint(model: &mut Model, caps: &Capabilities) {
            if model.session.is_none() {
                Self::navigate(model, caps, Screen::Login);
                return;
            }
            let Some(builder) = Self::endpoint_request(model, caps, &Endpoint::CreateComplaint)
            else {
                return;
            };
            let Some(workflow) = model.workflow.as_mut() else {
                debug!("submit without an active workflow");
                return;
            };

            let request: CreateComplaintRequest = match workflow.begin_submission() {
                Ok(request) => request,
                Err(e) => {
                    model.set_error(e.into());
                    return;
                }
            };

            let id = workflow.id();
            match builder.body_json(&request) {
                Ok(builder) => {
                    info!(
                        workflow = %id,
                        category = request.category.as_str(),
                        has_image = request.image_url.is_some(),
                        "submitting complaint"
                    );
                    builder.send(move |result| Event::ComplaintSubmitted {
                        workflow: id,
                        result: Box::new(result),
                    });
                }
                Err(e) => {
                    let error = workflow.submission_failed(e.to_string());
                    model.set_error(error.into());
                }
            }
        }

        fn submit_status_update(
            model: &mut Model,
            caps: &Capabilities,
            id: ComplaintId,
            status: ComplaintStatus,
        ) {
            if model.admin.updating.is_some() {
                model.set_error(AppError::new(
                    ErrorKind::PreconditionNotMet,
                    "A status update is already in progress",
                ));
                return;
            }
            let Some(builder) = Self::endpoint_request(model, caps, &Endpoint::UpdateStatus(id))
            else {
                return;
            };

            let request = StatusUpdateRequest {
                status,
                remarks: model.admin.remarks.trim().to_string(),
            };
            match builder.body_json(&request) {
                Ok(builder) => {
                    info!(complaint = %id, status = status.as_str(), "updating complaint status");
                    builder.send(move |result| Event::StatusUpdated {
                        id,
                        result: Box::new(result),
                    });
                    model.admin.updating = Some(id);
                }
                Err(e) => model.set_error(
                    AppError::new(ErrorKind::StatusUpdateFailed, "Failed to update status")
                        .with_internal(e.to_string()),
                ),
            }
        }

        fn handle_frame(
            model: &mut Model,
            caps: &Capabilities,
            id: WorkflowId,
            result: Result<CameraOutput, CameraError>,
        ) {
            let Some(workflow) = model.workflow.as_mut().filter(|w| w.id() == id) else {
                debug!(workflow = %id, "frame for a discarded workflow");
                return;
            };

            let outcome = match result {
                Ok(CameraOutput::Frame(frame)) => {
                    let taken_at = chrono::Local::now().naive_local();
                    workflow.complete_capture(frame, taken_at, &model.config.watermark)
                }
                Ok(other) => Err(workflow.capture_failed(CameraError::UnexpectedOutput {
                    output: other.kind().to_string(),
                })),
                Err(e) => Err(workflow.capture_failed(e)),
            };

            match outcome {
                Ok(()) => {
                    caps.camera.stop_stream();
                    info!(workflow = %id, "photo captured, camera released");
                }
                Err(e) => {
                    warn!(workflow = %id, error = %e, "capture failed");
                    model.set_error(e.into());
                }
            }
        }

        fn handle_position(
            model: &mut Model,
            id: WorkflowId,
            result: Result<Position, GeolocationError>,
        ) {
            let Some(workflow) = Self::active_workflow(model, id) else {
                debug!(workflow = %id, "location for a discarded workflow");
                return;
            };

            let outcome = match result.and_then(|position| {
                ValidatedCoordinate::new(position.lat, position.lng).map_err(GeolocationError::from)
            }) {
                Ok(coord) => {
                    if workflow.location_resolved(coord) {
                        info!(workflow = %id, "location resolved");
                    } else {
                        debug!(workflow = %id, "location fix superseded by manual pin");
                    }
                    Ok(())
                }
                Err(e) => Err(workflow.location_failed(e)),
            };
            Self::apply_workflow_result(model, outcome);
        }

        fn handle_camera_started(
            model: &mut Model,
            caps: &Capabilities,
            id: WorkflowId,
            result: Result<CameraOutput, CameraError>,
        ) {
            let Some(workflow) = Self::active_workflow(model, id) else {
                if result.is_ok() {
                    caps.camera.stop_stream();
                    info!(workflow = %id, "late camera stream released");
                }
                return;
            };

            match result {
                Ok(_) => {
                    if !workflow.camera_started() {
                        caps.camera.stop_stream();
                    }
                }
                Err(e) => {
                    let error = workflow.camera_failed(e);
                    warn!(workflow = %id, error = %error, "camera unavailable");
                    model.set_error(error.into());
                }
            }
        }

        fn handle_submission(
            model: &mut Model,
            caps: &Capabilities,
            id: WorkflowId,
            result: crux_http::Result<crux_http::Response<Vec<u8>>>,
        ) {
            let Some(workflow) = Self::active_workflow(model, id) else {
                warn!(workflow = %id, "submission finished after workflow exit");
                return;
            };

            match http::read_success(result) {
                Ok(_) => {
                    workflow.submission_succeeded();
                    info!(workflow = %id, "complaint lodged");
                    model.show_toast("Complaint lodged successfully!", ToastKind::Success);
                    Self::navigate(model, caps, Screen::Dashboard);
                }
                Err(failure) => {
                    let error = workflow.submission_failed(failure.to_string());
                    warn!(workflow = %id, error = %error, "complaint rejected");
                    model.set_error(error.into());
                }
            }
        }

        fn apply_workflow_result(model: &mut Model, result: Result<(), WorkflowError>) {
            if let Err(e) = result {
                debug!(error = %e, "workflow step rejected");
                model.set_error(e.into());
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            let event_name = event.name();
            if event.is_user_initiated() {
                debug!(event = event_name, "user action");
            }

            match event {
                Event::AppStarted => {
                    model.session_restored = false;
                    caps.kv
                        .get(SESSION_STORAGE_KEY.to_string(), Event::SessionLoaded);
                }

                Event::Configure(config) => match config.validate() {
                    Ok(()) => {
                        info!(base_url = %config.api.base_url, "configuration applied");
                        model.config = *config;
                    }
                    Err(e) => {
                        warn!(error = %e, "configuration rejected");
                        model.set_error(e.into());
                    }
                },

                Event::SessionLoaded(result) => {
                    model.session_restored = true;
                    Self::return_to_login(model, caps);
                    model.session = None;
                    match result {
                        Ok(Some(bytes)) => match session::decode(&bytes) {
                            Ok(restored) => {
                                info!(role = ?restored.role(), "session restored");
                                let home = restored.role().home_screen();
                                model.session = Some(restored);
                                Self::navigate(model, caps, home);
                            }
                            Err(e) => {
                                warn!(error = %e, "discarding unreadable session record");
                                caps.kv
                                    .delete(SESSION_STORAGE_KEY.to_string(), Event::SessionCleared);
                            }
                        },
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "session store unavailable"),
                    }
                }

                Event::SessionPersisted(result) => {
                    if let Err(e) = result {
                        warn!(error = %e, "session not persisted");
                        model.set_error(KvError::from(e).into());
                    }
                }

                Event::SessionCleared(result) => {
                    if let Err(e) = result {
                        warn!(error = %e, "persisted session not removed");
                    }
                }

                Event::Navigate(screen) => Self::navigate(model, caps, screen),

                Event::LoginSubmitted {
                    portal,
                    username,
                    password,
                } => Self::submit_login(model, caps, portal, username, &password),

                Event::LoginResponse {
                    portal,
                    username,
                    result,
                } => {
                    let response = http::read_json::<LoginResponse>(*result);
                    Self::handle_login_response(model, caps, portal, username, response);
                }

                Event::RegisterSubmitted(form) => Self::submit_registration(model, caps, &form),

                Event::RegisterResponse(result) => {
                    model.auth_pending = false;
                    match http::read_success(*result) {
                        Ok(_) => {
                            info!("registration succeeded");
                            model.show_toast(
                                "Registration successful! Please login.",
                                ToastKind::Success,
                            );
                            Self::navigate(model, caps, Screen::Login);
                        }
                        Err(failure) => {
                            warn!(error = %failure, "registration rejected");
                            let message = failure
                                .server_message()
                                .unwrap_or("Registration failed")
                                .to_string();
                            model.set_error(
                                AppError::new(ErrorKind::RegistrationFailed, message)
                                    .with_internal(failure.to_string()),
                            );
                        }
                    }
                }

                Event::LogoutRequested => {
                    Self::return_to_login(model, caps);
                    model.session = None;
                    model.citizen = crate::model::CitizenDesk::default();
                    model.admin = crate::model::AdminDesk::default();
                    model.last_error = None;
                    caps.kv
                        .delete(SESSION_STORAGE_KEY.to_string(), Event::SessionCleared);
                    info!("logged out");
                }

                Event::MyComplaintsRequested => Self::fetch_my_complaints(model, caps),

                Event::MyComplaintsLoaded(result) => {
                    model.citizen.is_loading = false;
                    match http::read_json::<Vec<Complaint>>(*result) {
                        Ok(complaints) => {
                            debug!(count = complaints.len(), "my complaints loaded");
                            model.citizen.complaints = complaints;
                        }
                        Err(failure) => {
                            warn!(error = %failure, "my complaints not loaded");
                            model.set_error(
                                AppError::new(ErrorKind::LoadFailed, "Error fetching complaints")
                                    .with_internal(failure.to_string()),
                            );
                        }
                    }
                }

                Event::TitleChanged(title) => {
                    if let Some(workflow) = model.workflow.as_mut() {
                        workflow.set_title(title);
                    }
                }

                Event::DescriptionChanged(description) => {
                    if let Some(workflow) = model.workflow.as_mut() {
                        workflow.set_description(description);
                    }
                }

                Event::CategoryChanged(category) => {
                    if let Some(workflow) = model.workflow.as_mut() {
                        workflow.set_category(category);
                    }
                }

                Event::LocateRequested => {
                    if let Some(workflow) = model.workflow.as_mut() {
                        match workflow.begin_locate() {
                            Ok(()) => {
                                let id = workflow.id();
                                Self::request_position(id, model, caps);
                            }
                            Err(WorkflowError::PreconditionNotMet(
                                Precondition::LocationAlreadyResolved
                                | Precondition::LocationInProgress,
                            )) => debug!("location request ignored"),
                            Err(e) => model.set_error(e.into()),
                        }
                    }
                }

                Event::LocationReceived { workflow, result } => {
                    Self::handle_position(model, workflow, result);
                }

                Event::LocationPinDropped { lat, lng } => {
                    match ValidatedCoordinate::new(lat, lng) {
                        Ok(coord) => {
                            if let Some(workflow) = model.workflow.as_mut() {
                                let outcome = workflow.adjust_location(coord);
                                Self::apply_workflow_result(model, outcome);
                            }
                        }
                        Err(e) => model.set_error(e.into()),
                    }
                }

                Event::StartCameraRequested => {
                    if let Some(workflow) = model.workflow.as_mut() {
                        match workflow.begin_camera_start() {
                            Ok(()) => {
                                let id = workflow.id();
                                caps.camera
                                    .start_stream(CameraFacing::default(), move |result| {
                                        Event::CameraStarted {
                                            workflow: id,
                                            result,
                                        }
                                    });
                            }
                            Err(e) => model.set_error(e.into()),
                        }
                    }
                }

                Event::CameraStarted { workflow, result } => {
                    Self::handle_camera_started(model, caps, workflow, result);
                }

                Event::CaptureRequested => {
                    if let Some(workflow) = model.workflow.as_mut() {
                        match workflow.begin_capture() {
                            Ok(()) => {
                                let id = workflow.id();
                                caps.camera.capture_frame(move |result| Event::FrameCaptured {
                                    workflow: id,
                                    result,
                                });
                            }
                            Err(e) => model.set_error(e.into()),
                        }
                    }
                }

                Event::FrameCaptured { workflow, result } => {
                    Self::handle_frame(model, caps, workflow, result);
                }

                Event::RetakeRequested => {
                    if let Some(workflow) = model.workflow.as_mut() {
                        let outcome = workflow.retake();
                        Self::apply_workflow_result(model, outcome);
                    }
                }

                Event::SubmitRequested => Self::submit_complaint(model, caps),

                Event::ComplaintSubmitted { workflow, result } => {
                    Self::handle_submission(model, caps, workflow, *result);
                }

                Event::AdminComplaintsRequested => Self::fetch_admin_complaints(model, caps),

                Event::AdminComplaintsLoaded(result) => {
                    model.admin.is_loading = false;
                    match http::read_json::<Vec<Complaint>>(*result) {
                        Ok(complaints) => {
                            debug!(count = complaints.len(), "admin complaints loaded");
                            if let Some(selected) = model.admin.selected {
                                if !complaints.iter().any(|c| c.id == selected) {
                                    model.admin.selected = None;
                                }
                            }
                            model.admin.complaints = complaints;
                        }
                        Err(failure) => {
                            warn!(error = %failure, "admin complaints not loaded");
                            model.set_error(
                                AppError::new(ErrorKind::LoadFailed, "Error fetching complaints")
                                    .with_internal(failure.to_string()),
                            );
                        }
                    }
                }

                Event::AdminViewToggled => {
                    model.admin.view_mode = model.admin.view_mode.toggle();
                }

                Event::AdminViewModeChanged(mode) => model.admin.view_mode = mode,

                Event::ComplaintSelected { id } => {
                    if model.admin.complaints.iter().any(|c| c.id == id) {
                        if model.admin.selected != Some(id) {
                            model.admin.remarks.clear();
                        }
                        model.admin.selected = Some(id);
                    } else {
                        debug!(complaint = %id, "selected complaint not in list");
                    }
                }

                Event::ComplaintDeselected => {
                    model.admin.selected = None;
                    model.admin.remarks.clear();
                }

                Event::RemarksChanged(remarks) => model.admin.remarks = remarks,

                Event::StatusUpdateRequested { id, status } => {
                    Self::submit_status_update(model, caps, id, status);
                }

                Event::StatusUpdated { id, result } => {
                    model.admin.updating = None;
                    match http::read_success(*result) {
                        Ok(_) => {
                            info!(complaint = %id, "status updated");
                            model.show_toast("Status updated", ToastKind::Success);
                            model.admin.selected = None;
                            model.admin.remarks.clear();
                            Self::fetch_admin_complaints(model, caps);
                        }
                        Err(failure) => {
                            warn!(complaint = %id, error = %failure, "status update rejected");
                            model.set_error(
                                AppError::new(
                                    ErrorKind::StatusUpdateFailed,
                                    "Failed to update status",
                                )
                                .with_internal(failure.to_string())
                                .with_context("complaint_id", id.to_string()),
                            );
                        }
                    }
                }

                Event::DismissToast => model.active_toast = None,
                Event::DismissError => model.last_error = None,
            }

            caps.render.render();
        }

        fn view(&self, model: &Model) -> ViewModel {
            view::build(model)
        }
    }
}
