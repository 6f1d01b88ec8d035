use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

use crate::capabilities::{CameraResult, GeolocationResult, KvResult};
use crate::config::AppConfig;
use crate::model::{Category, ComplaintId, ComplaintStatus, Role, Screen};
use crate::workflow::WorkflowId;
use crate::FeedView;

type HttpResult = Box<crux_http::Result<crux_http::Response<Vec<u8>>>>;

/// A user-typed secret. Redacted in `Debug`, wiped on drop.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Which sign-in form the credentials came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginPortal {
    Citizen,
    Admin,
}

impl LoginPortal {
    /// The admin portal only admits admins; the citizen portal admits anyone
    /// and routes them by role.
    #[must_use]
    pub const fn accepts(self, role: Role) -> bool {
        match self {
            Self::Citizen => true,
            Self::Admin => matches!(role, Role::Admin),
        }
    }

    #[must_use]
    pub const fn success_message(self) -> &'static str {
        match self {
            Self::Citizen => "Logged in successfully",
            Self::Admin => "Admin logged in successfully",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub username: String,
    pub password: Secret,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub enum Event {
    // lifecycle
    AppStarted,
    Configure(Box<AppConfig>),
    #[serde(skip)]
    SessionLoaded(KvResult),
    #[serde(skip)]
    SessionPersisted(KvResult),
    #[serde(skip)]
    SessionCleared(KvResult),
    Navigate(Screen),

    // auth
    LoginSubmitted {
        portal: LoginPortal,
        username: String,
        password: Secret,
    },
    #[serde(skip)]
    LoginResponse {
        portal: LoginPortal,
        username: String,
        result: HttpResult,
    },
    RegisterSubmitted(RegistrationForm),
    #[serde(skip)]
    RegisterResponse(HttpResult),
    LogoutRequested,

    // citizen dashboard
    MyComplaintsRequested,
    #[serde(skip)]
    MyComplaintsLoaded(HttpResult),

    // capture-and-submit
    TitleChanged(String),
    DescriptionChanged(String),
    CategoryChanged(Category),
    LocateRequested,
    #[serde(skip)]
    LocationReceived {
        workflow: WorkflowId,
        result: GeolocationResult,
    },
    LocationPinDropped {
        lat: f64,
        lng: f64,
    },
    StartCameraRequested,
    #[serde(skip)]
    CameraStarted {
        workflow: WorkflowId,
        result: CameraResult,
    },
    CaptureRequested,
    #[serde(skip)]
    FrameCaptured {
        workflow: WorkflowId,
        result: CameraResult,
    },
    RetakeRequested,
    SubmitRequested,
    #[serde(skip)]
    ComplaintSubmitted {
        workflow: WorkflowId,
        result: HttpResult,
    },

    // admin dashboard
    AdminComplaintsRequested,
    #[serde(skip)]
    AdminComplaintsLoaded(HttpResult),
    AdminViewToggled,
    AdminViewModeChanged(FeedView),
    ComplaintSelected {
        id: ComplaintId,
    },
    ComplaintDeselected,
    RemarksChanged(String),
    StatusUpdateRequested {
        id: ComplaintId,
        status: ComplaintStatus,
    },
    #[serde(skip)]
    StatusUpdated {
        id: ComplaintId,
        result: HttpResult,
    },

    // notifications
    DismissToast,
    DismissError,
}

impl Event {
    /// Stable name for logging; never includes payloads.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AppStarted => "app_started",
            Self::Configure(_) => "configure",
            Self::SessionLoaded(_) => "session_loaded",
            Self::SessionPersisted(_) => "session_persisted",
            Self::SessionCleared(_) => "session_cleared",
            Self::Navigate(_) => "navigate",
            Self::LoginSubmitted { .. } => "login_submitted",
            Self::LoginResponse { .. } => "login_response",
            Self::RegisterSubmitted(_) => "register_submitted",
            Self::RegisterResponse(_) => "register_response",
            Self::LogoutRequested => "logout_requested",
            Self::MyComplaintsRequested => "my_complaints_requested",
            Self::MyComplaintsLoaded(_) => "my_complaints_loaded",
            Self::TitleChanged(_) => "title_changed",
            Self::DescriptionChanged(_) => "description_changed",
            Self::CategoryChanged(_) => "category_changed",
            Self::LocateRequested => "locate_requested",
            Self::LocationReceived { .. } => "location_received",
            Self::LocationPinDropped { .. } => "location_pin_dropped",
            Self::StartCameraRequested => "start_camera_requested",
            Self::CameraStarted { .. } => "camera_started",
            Self::CaptureRequested => "capture_requested",
            Self::FrameCaptured { .. } => "frame_captured",
            Self::RetakeRequested => "retake_requested",
            Self::SubmitRequested => "submit_requested",
            Self::ComplaintSubmitted { .. } => "complaint_submitted",
            Self::AdminComplaintsRequested => "admin_complaints_requested",
            Self::AdminComplaintsLoaded(_) => "admin_complaints_loaded",
            Self::AdminViewToggled => "admin_view_toggled",
            Self::AdminViewModeChanged(_) => "admin_view_mode_changed",
            Self::ComplaintSelected { .. } => "complaint_selected",
            Self::ComplaintDeselected => "complaint_deselected",
            Self::RemarksChanged(_) => "remarks_changed",
            Self::StatusUpdateRequested { .. } => "status_update_requested",
            Self::StatusUpdated { .. } => "status_updated",
            Self::DismissToast => "dismiss_toast",
            Self::DismissError => "dismiss_error",
        }
    }

    /// Events the shell sends on behalf of the user, as opposed to
    /// capability responses.
    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        !matches!(
            self,
            Self::SessionLoaded(_)
                | Self::SessionPersisted(_)
                | Self::SessionCleared(_)
                | Self::LoginResponse { .. }
                | Self::RegisterResponse(_)
                | Self::MyComplaintsLoaded(_)
                | Self::LocationReceived { .. }
                | Self::CameraStarted { .. }
                | Self::FrameCaptured { .. }
                | Self::ComplaintSubmitted { .. }
                | Self::AdminComplaintsLoaded(_)
                | Self::StatusUpdated { .. }
        )
    }
}

#[cfg(test)]
mod event_tests {
    use super::*;

    #[test]
    fn secret_is_redacted_in_debug() {
        let event = Event::LoginSubmitted {
            portal: LoginPortal::Citizen,
            username: "asha".into(),
            password: Secret::new("hunter2"),
        };
        let debug = format!("{event:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn admin_portal_rejects_citizens() {
        assert!(LoginPortal::Admin.accepts(Role::Admin));
        assert!(!LoginPortal::Admin.accepts(Role::Citizen));
        assert!(LoginPortal::Citizen.accepts(Role::Admin));
        assert!(LoginPortal::Citizen.accepts(Role::Citizen));
    }

    #[test]
    fn capability_responses_are_not_user_initiated() {
        assert!(Event::SubmitRequested.is_user_initiated());
        assert!(Event::CaptureRequested.is_user_initiated());
        assert!(!Event::SessionLoaded(Ok(None)).is_user_initiated());
        assert!(!Event::LocationReceived {
            workflow: WorkflowId::new(),
            result: Err(crate::capabilities::GeolocationError::Timeout),
        }
        .is_user_initiated());
    }

    #[test]
    fn shell_events_deserialize() {
        let event: Event =
            serde_json::from_str(r#"{"StatusUpdateRequested":{"id":4,"status":"COMPLETED"}}"#)
                .unwrap();
        assert_eq!(event.name(), "status_update_requested");
        assert!(matches!(
            event,
            Event::StatusUpdateRequested {
                status: ComplaintStatus::Completed,
                ..
            }
        ));

        let event: Event =
            serde_json::from_str(r#"{"LocationPinDropped":{"lat":12.97,"lng":77.59}}"#).unwrap();
        assert_eq!(event.name(), "location_pin_dropped");
    }

    #[test]
    fn capability_callbacks_cannot_be_sent_by_the_shell() {
        for variant in ["LocationReceived", "CameraStarted", "FrameCaptured"] {
            let json = format!(r#"{{"{variant}":{{"workflow":"{}"}}}}"#, WorkflowId::new());
            assert!(serde_json::from_str::<Event>(&json).is_err(), "{variant}");
        }
    }

    #[test]
    fn registration_form_carries_optional_contacts() {
        let form: RegistrationForm = serde_json::from_str(
            r#"{"username":"asha","password":"pw","full_name":"Asha Rao"}"#,
        )
        .unwrap();
        assert_eq!(form.email, None);
        assert_eq!(form.password.expose(), "pw");
    }
}
