use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::config::AppConfig;
use crate::session::Session;
use crate::workflow::CaptureWorkflow;
use crate::{AppError, FeedView, ToastKind, ToastMessage, ValidatedCoordinate};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplaintId(pub u64);

impl ComplaintId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComplaintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[default]
    Road,
    Garbage,
    Water,
    Electricity,
}

impl Category {
    pub const ALL: [Self; 4] = [Self::Road, Self::Garbage, Self::Water, Self::Electricity];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Road => "ROAD",
            Self::Garbage => "GARBAGE",
            Self::Water => "WATER",
            Self::Electricity => "ELECTRICITY",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Road => "Road",
            Self::Garbage => "Garbage",
            Self::Water => "Water",
            Self::Electricity => "Electricity",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Rejected,
}

impl ComplaintStatus {
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Rejected,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Rejected => "REJECTED",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
        }
    }

    #[must_use]
    pub const fn tone(self) -> StatusTone {
        match self {
            Self::Pending => StatusTone::Warning,
            Self::InProgress => StatusTone::Info,
            Self::Completed => StatusTone::Success,
            Self::Rejected => StatusTone::Danger,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Warning,
    Info,
    Success,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintOwner {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: ComplaintId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub status: ComplaintStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub user: Option<ComplaintOwner>,
    #[serde(default)]
    pub assigned_department: Option<Department>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<NaiveDateTime>,
}

impl Complaint {
    #[must_use]
    pub fn coordinate(&self) -> Option<ValidatedCoordinate> {
        ValidatedCoordinate::new(self.latitude?, self.longitude?).ok()
    }

    #[must_use]
    pub fn department_name(&self) -> &str {
        self.assigned_department
            .as_ref()
            .map_or("Unassigned", |d| d.name.as_str())
    }

    #[must_use]
    pub fn owner_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}

/// Accepts `2026-10-19T14:03:22.123`, RFC 3339, or nothing; anything else becomes `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        s.parse::<NaiveDateTime>().ok().or_else(|| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.naive_local())
        })
    }))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[serde(alias = "USER")]
    Citizen,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn home_screen(self) -> Screen {
        match self {
            Self::Citizen => Screen::Dashboard,
            Self::Admin => Screen::AdminDashboard,
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    #[default]
    Login,
    AdminLogin,
    Register,
    Dashboard,
    LodgeComplaint,
    AdminDashboard,
}

impl Screen {
    #[must_use]
    pub const fn required_role(self) -> Option<Role> {
        match self {
            Self::Login | Self::AdminLogin | Self::Register => None,
            Self::Dashboard | Self::LodgeComplaint => Some(Role::Citizen),
            Self::AdminDashboard => Some(Role::Admin),
        }
    }

    /// Where a request for this screen actually lands for the given session.
    #[must_use]
    pub fn resolve(self, session: Option<&Session>) -> Self {
        match (self.required_role(), session) {
            (None, _) => self,
            (Some(_), None) => Self::Login,
            (Some(role), Some(session)) if session.role() == role => self,
            (Some(_), Some(session)) => session.role().home_screen(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CitizenDesk {
    pub complaints: Vec<Complaint>,
    pub is_loading: bool,
}

#[derive(Debug, Default)]
pub struct AdminDesk {
    pub complaints: Vec<Complaint>,
    pub view_mode: FeedView,
    pub selected: Option<ComplaintId>,
    pub remarks: String,
    pub is_loading: bool,
    pub updating: Option<ComplaintId>,
}

impl AdminDesk {
    #[must_use]
    pub fn selected_complaint(&self) -> Option<&Complaint> {
        let id = self.selected?;
        self.complaints.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: AppConfig,
    pub screen: Screen,
    pub session: Option<Session>,
    pub session_restored: bool,
    pub auth_pending: bool,
    pub citizen: CitizenDesk,
    pub admin: AdminDesk,
    pub workflow: Option<CaptureWorkflow>,
    pub active_toast: Option<ToastMessage>,
    pub last_error: Option<AppError>,
}

impl Model {
    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_toast = Some(ToastMessage::new(message, kind));
    }

    pub fn set_error(&mut self, error: AppError) {
        self.show_toast(error.user_facing_message(), ToastKind::Error);
        self.last_error = Some(error);
    }
}
