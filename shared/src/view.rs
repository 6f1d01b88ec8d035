use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use serde::{Deserialize, Serialize};

use crate::config::MapConfig;
use crate::event::LoginPortal;
use crate::model::{Category, Complaint, ComplaintStatus, Model, Screen, StatusTone};
use crate::workflow::{CameraState, CaptureWorkflow, LocationState, SubmissionState};
use crate::{AppError, FeedView, ToastKind, ToastMessage};

const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub screen: ScreenView,
    pub nav: Option<NavView>,
    pub toast: Option<ToastView>,
    pub error: Option<UserFacingError>,
    pub map: MapConfig,
    pub is_busy: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScreenView {
    Loading,
    Login {
        portal: LoginPortal,
        is_submitting: bool,
    },
    Register {
        is_submitting: bool,
    },
    Dashboard(CitizenDashboardView),
    LodgeComplaint(LodgeComplaintView),
    AdminDashboard(AdminDashboardView),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavView {
    pub welcome: String,
    pub home: Screen,
    pub show_new_complaint: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusBadge {
    pub code: ComplaintStatus,
    pub label: String,
    pub tone: StatusTone,
}

impl From<ComplaintStatus> for StatusBadge {
    fn from(status: ComplaintStatus) -> Self {
        Self {
            code: status,
            label: status.display_name().to_string(),
            tone: status.tone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ComplaintRow {
    pub id: u64,
    pub title: String,
    pub category: String,
    pub status: StatusBadge,
    pub created_on: Option<String>,
    pub department: String,
    pub owner: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub has_image: bool,
}

impl From<&Complaint> for ComplaintRow {
    fn from(c: &Complaint) -> Self {
        let coord = c.coordinate();
        Self {
            id: c.id.get(),
            title: c.title.clone(),
            category: c.category.display_name().to_string(),
            status: c.status.into(),
            created_on: c
                .created_at
                .map(|at| at.format(DATE_FORMAT).to_string()),
            department: c.department_name().to_string(),
            owner: c.owner_name().map(str::to_string),
            latitude: coord.map(|p| p.lat()),
            longitude: coord.map(|p| p.lng()),
            has_image: c.image_url.is_some(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CitizenDashboardView {
    pub complaints: Vec<ComplaintRow>,
    pub is_loading: bool,
    pub is_empty: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryOption {
    pub value: Category,
    pub label: String,
    pub selected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LocationView {
    pub label: Option<String>,
    pub is_pending: bool,
    pub can_retry: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zoom: u8,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    Off,
    Starting,
    Live,
    Capturing,
    Captured,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CameraView {
    pub status: CameraStatus,
    /// Data URL of the stamped photo, once captured.
    pub preview: Option<String>,
    pub can_start: bool,
    pub can_retake: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LodgeComplaintView {
    pub title: String,
    pub description: String,
    pub categories: Vec<CategoryOption>,
    pub location: LocationView,
    pub camera: CameraView,
    pub can_capture: bool,
    pub can_submit: bool,
    pub is_submitting: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusAction {
    pub status: ComplaintStatus,
    pub label: String,
    pub is_current: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ComplaintDetailView {
    pub complaint: ComplaintRow,
    pub description: String,
    pub image_url: Option<String>,
    pub remarks: String,
    pub actions: Vec<StatusAction>,
    pub is_updating: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AdminDashboardView {
    pub view_mode: FeedView,
    pub complaints: Vec<ComplaintRow>,
    /// Complaint pins as a GeoJSON `FeatureCollection`.
    pub pins_geojson: String,
    pub selected: Option<ComplaintDetailView>,
    pub is_loading: bool,
    pub is_empty: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[must_use]
pub fn build(model: &Model) -> ViewModel {
    let screen = if model.session_restored {
        screen_view(model)
    } else {
        ScreenView::Loading
    };

    let nav = model.session.as_ref().map(|session| NavView {
        welcome: format!("Welcome, {}", session.username()),
        home: session.role().home_screen(),
        show_new_complaint: !session.role().is_admin(),
    });

    ViewModel {
        screen,
        nav,
        toast: model.active_toast.as_ref().map(ToastView::from),
        error: model.last_error.as_ref().map(UserFacingError::from),
        map: model.config.map.clone(),
        is_busy: model.auth_pending
            || model.citizen.is_loading
            || model.admin.is_loading
            || model.admin.updating.is_some(),
    }
}

fn screen_view(model: &Model) -> ScreenView {
    match model.screen {
        Screen::Login => ScreenView::Login {
            portal: LoginPortal::Citizen,
            is_submitting: model.auth_pending,
        },
        Screen::AdminLogin => ScreenView::Login {
            portal: LoginPortal::Admin,
            is_submitting: model.auth_pending,
        },
        Screen::Register => ScreenView::Register {
            is_submitting: model.auth_pending,
        },
        Screen::Dashboard => ScreenView::Dashboard(CitizenDashboardView {
            complaints: model
                .citizen
                .complaints
                .iter()
                .map(ComplaintRow::from)
                .collect(),
            is_loading: model.citizen.is_loading,
            is_empty: model.citizen.complaints.is_empty(),
        }),
        Screen::LodgeComplaint => match &model.workflow {
            Some(workflow) => {
                ScreenView::LodgeComplaint(lodge_view(workflow, &model.config.map))
            }
            None => ScreenView::Loading,
        },
        Screen::AdminDashboard => ScreenView::AdminDashboard(admin_view(model)),
    }
}

fn lodge_view(workflow: &CaptureWorkflow, map: &MapConfig) -> LodgeComplaintView {
    let draft = workflow.draft();
    let coord = workflow.coordinate();
    let editable = workflow.submission() == SubmissionState::Editing;

    let status = match workflow.camera() {
        CameraState::Idle => CameraStatus::Off,
        CameraState::Starting => CameraStatus::Starting,
        CameraState::Live => CameraStatus::Live,
        CameraState::Capturing => CameraStatus::Capturing,
        CameraState::Captured(_) => CameraStatus::Captured,
    };

    LodgeComplaintView {
        title: draft.title.clone(),
        description: draft.description.clone(),
        categories: Category::ALL
            .iter()
            .map(|&c| CategoryOption {
                value: c,
                label: c.display_name().to_string(),
                selected: c == draft.category,
            })
            .collect(),
        location: LocationView {
            label: workflow.location_label(),
            is_pending: workflow.location() == LocationState::Pending,
            can_retry: editable && workflow.location() == LocationState::Unset,
            latitude: coord.map(|c| c.lat()),
            longitude: coord.map(|c| c.lng()),
            zoom: map.lodge_zoom,
        },
        camera: CameraView {
            status,
            preview: workflow.photo().map(|p| p.data_url().to_string()),
            can_start: editable && status == CameraStatus::Off,
            can_retake: editable && status == CameraStatus::Captured,
        },
        can_capture: workflow.can_capture(),
        can_submit: workflow.can_submit(),
        is_submitting: workflow.submission() == SubmissionState::InFlight,
    }
}

fn admin_view(model: &Model) -> AdminDashboardView {
    let desk = &model.admin;
    let selected = desk.selected_complaint().map(|c| {
        let updating = desk.updating == Some(c.id);
        ComplaintDetailView {
            complaint: ComplaintRow::from(c),
            description: c.description.clone(),
            image_url: c.image_url.clone(),
            remarks: desk.remarks.clone(),
            actions: ComplaintStatus::ALL
                .iter()
                .map(|&status| StatusAction {
                    status,
                    label: status.display_name().to_string(),
                    is_current: status == c.status,
                })
                .collect(),
            is_updating: updating,
        }
    });

    AdminDashboardView {
        view_mode: desk.view_mode,
        complaints: desk.complaints.iter().map(ComplaintRow::from).collect(),
        pins_geojson: serde_json::to_string(&complaint_pins(&desk.complaints))
            .unwrap_or_default(),
        selected,
        is_loading: desk.is_loading,
        is_empty: desk.complaints.is_empty(),
    }
}

/// One point feature per complaint that has a usable coordinate.
#[must_use]
pub fn complaint_pins(complaints: &[Complaint]) -> FeatureCollection {
    let features = complaints
        .iter()
        .filter_map(|c| {
            let coord = c.coordinate()?;
            let mut properties = JsonObject::new();
            properties.insert("title".into(), JsonValue::from(c.title.clone()));
            properties.insert("status".into(), JsonValue::from(c.status.as_str()));
            properties.insert("category".into(), JsonValue::from(c.category.as_str()));
            properties.insert(
                "department".into(),
                JsonValue::from(c.department_name().to_string()),
            );
            Some(Feature {
                bbox: None,
                // GeoJSON positions are [lng, lat]
                geometry: Some(Geometry::new(Value::Point(vec![coord.lng(), coord.lat()]))),
                id: Some(geojson::feature::Id::Number(c.id.get().into())),
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod view_tests {
    use super::*;
    use crate::model::{ComplaintId, Role};
    use crate::session::Session;
    use crate::{ErrorKind, ValidatedCoordinate};

    fn complaint(id: u64, lat: Option<f64>) -> Complaint {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": format!("Complaint {id}"),
            "description": "Broken streetlight",
            "category": "ELECTRICITY",
            "status": "PENDING",
            "latitude": lat,
            "longitude": lat.map(|_| 77.59),
            "createdAt": "2026-10-19T14:03:22"
        }))
        .unwrap()
    }

    fn signed_in(role: Role) -> Model {
        Model {
            session: Some(Session::new("asha".into(), role, "tok".into()).unwrap()),
            session_restored: true,
            ..Model::default()
        }
    }

    #[test]
    fn unrestored_session_shows_loading() {
        let model = Model::default();
        assert_eq!(build(&model).screen, ScreenView::Loading);
    }

    #[test]
    fn nav_greets_and_hides_new_complaint_for_admins() {
        let vm = build(&signed_in(Role::Citizen));
        let nav = vm.nav.unwrap();
        assert_eq!(nav.welcome, "Welcome, asha");
        assert!(nav.show_new_complaint);

        let vm = build(&signed_in(Role::Admin));
        let nav = vm.nav.unwrap();
        assert!(!nav.show_new_complaint);
        assert_eq!(nav.home, Screen::AdminDashboard);
    }

    #[test]
    fn rows_format_date_and_department() {
        let row = ComplaintRow::from(&complaint(3, Some(12.97)));
        assert_eq!(row.created_on.as_deref(), Some("19/10/2026"));
        assert_eq!(row.department, "Unassigned");
        assert_eq!(row.status.label, "Pending");
        assert_eq!(row.category, "Electricity");
    }

    #[test]
    fn lodge_view_reflects_workflow() {
        let mut model = signed_in(Role::Citizen);
        model.screen = Screen::LodgeComplaint;
        let mut workflow = CaptureWorkflow::new();
        workflow.begin_locate().unwrap();
        model.workflow = Some(workflow);

        let ScreenView::LodgeComplaint(view) = build(&model).screen else {
            panic!("expected lodge view");
        };
        assert_eq!(view.location.label.as_deref(), Some("Fetching location..."));
        assert!(view.location.is_pending);
        assert!(!view.can_capture);
        assert!(!view.can_submit);
        assert!(view.camera.can_start);
        assert_eq!(view.categories.iter().filter(|c| c.selected).count(), 1);

        let workflow = model.workflow.as_mut().unwrap();
        workflow.location_resolved(ValidatedCoordinate::new(12.97, 77.59).unwrap());
        let ScreenView::LodgeComplaint(view) = build(&model).screen else {
            panic!("expected lodge view");
        };
        assert_eq!(
            view.location.label.as_deref(),
            Some("✓ 12.970000, 77.590000")
        );
        assert!(view.can_submit);
    }

    #[test]
    fn admin_view_exports_pins_and_actions() {
        let mut model = signed_in(Role::Admin);
        model.screen = Screen::AdminDashboard;
        model.admin.complaints = vec![complaint(1, Some(12.97)), complaint(2, None)];
        model.admin.selected = Some(ComplaintId::new(1));
        model.admin.updating = Some(ComplaintId::new(1));

        let vm = build(&model);
        assert!(vm.is_busy);
        let ScreenView::AdminDashboard(view) = vm.screen else {
            panic!("expected admin view");
        };
        assert_eq!(view.complaints.len(), 2);

        let pins: FeatureCollection = serde_json::from_str(&view.pins_geojson).unwrap();
        assert_eq!(pins.features.len(), 1);

        let detail = view.selected.unwrap();
        assert!(detail.is_updating);
        assert_eq!(detail.actions.len(), 4);
        assert!(detail
            .actions
            .iter()
            .any(|a| a.is_current && a.status == ComplaintStatus::Pending));
    }

    #[test]
    fn pins_use_lng_lat_order() {
        let pins = complaint_pins(&[complaint(5, Some(12.97))]);
        let geometry = pins.features[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.value, Value::Point(vec![77.59, 12.97]));
    }

    #[test]
    fn errors_and_toasts_are_projected() {
        let mut model = signed_in(Role::Citizen);
        model.set_error(AppError::new(ErrorKind::LoadFailed, "HTTP 502"));
        let vm = build(&model);
        assert_eq!(vm.error.unwrap().message, "Error fetching complaints");
        assert_eq!(vm.toast.unwrap().kind, ToastKind::Error);
    }
}
