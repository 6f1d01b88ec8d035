mod common;

use common::*;
use crux_http::http::StatusCode;
use shared::event::{LoginPortal, RegistrationForm, Secret};
use shared::model::{Role, Screen};
use shared::view::ScreenView;
use shared::{ErrorKind, Event, Model, ToastKind};

fn fresh(app: &Tester) -> Model {
    let mut model = Model::default();
    run(app, &mut model, vec![Event::SessionLoaded(Ok(None))]);
    model
}

fn login(portal: LoginPortal, password: &str) -> Event {
    Event::LoginSubmitted {
        portal,
        username: " asha ".into(),
        password: Secret::new(password),
    }
}

#[test]
fn startup_reads_stored_session_and_shows_loading() {
    let app = Tester::default();
    let mut model = Model::default();
    let update = app.update(Event::AppStarted, &mut model);
    assert!(has_kv(&update.effects));
    assert_eq!(app.view(&model).screen, ScreenView::Loading);
}

#[test]
fn missing_session_lands_on_login() {
    let app = Tester::default();
    let model = fresh(&app);
    assert_eq!(model.screen, Screen::Login);
    assert!(model.session.is_none());
    assert!(matches!(
        app.view(&model).screen,
        ScreenView::Login {
            portal: LoginPortal::Citizen,
            ..
        }
    ));
}

#[test]
fn restored_citizen_lands_on_dashboard() {
    let app = Tester::default();
    let (model, effects) = restored(&app, Role::Citizen);
    assert_eq!(model.screen, Screen::Dashboard);

    let request = take_http(effects);
    assert_eq!(request.method, "GET");
    assert_eq!(request.url, "http://localhost:8080/api/complaints/my");
    assert_eq!(header(&request, "Authorization"), Some("Bearer tok-123"));
}

#[test]
fn corrupt_session_is_discarded() {
    let app = Tester::default();
    let mut model = Model::default();
    let effects = run(
        &app,
        &mut model,
        vec![Event::SessionLoaded(Ok(Some(b"not json".to_vec())))],
    );
    assert!(has_kv(&effects));
    assert!(model.session.is_none());
    assert_eq!(model.screen, Screen::Login);
}

#[test]
fn citizen_login_persists_and_routes_home() {
    let app = Tester::default();
    let mut model = fresh(&app);

    let effects = run(&app, &mut model, vec![login(LoginPortal::Citizen, "pw")]);
    let request = take_http(effects);
    assert_eq!(request.url, "http://localhost:8080/api/auth/login");
    assert_eq!(request.method, "POST");
    assert_eq!(header(&request, "Authorization"), None);
    assert_eq!(
        json_body(&request),
        serde_json::json!({"username": "asha", "password": "pw"})
    );
    assert!(app.view(&model).is_busy);

    let effects = run(
        &app,
        &mut model,
        vec![Event::LoginResponse {
            portal: LoginPortal::Citizen,
            username: "asha".into(),
            result: ok_response(r#"{"jwt":"tok-9","role":"USER"}"#),
        }],
    );

    assert!(has_kv(&effects));
    assert_eq!(model.screen, Screen::Dashboard);
    let session = model.session.as_ref().expect("signed in");
    assert_eq!(session.role(), Role::Citizen);
    assert_eq!(session.bearer_header(), "Bearer tok-9");
    let toast = model.active_toast.as_ref().expect("toast");
    assert_eq!(toast.message, "Logged in successfully");
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(
        app.view(&model).nav.map(|n| n.welcome),
        Some("Welcome, asha".to_string())
    );
}

#[test]
fn admin_login_uses_admin_endpoint() {
    let app = Tester::default();
    let mut model = fresh(&app);
    run(&app, &mut model, vec![Event::Navigate(Screen::AdminLogin)]);

    let effects = run(&app, &mut model, vec![login(LoginPortal::Admin, "pw")]);
    let request = take_http(effects);
    assert_eq!(request.url, "http://localhost:8080/api/auth/admin/login");

    run(
        &app,
        &mut model,
        vec![Event::LoginResponse {
            portal: LoginPortal::Admin,
            username: "asha".into(),
            result: ok_response(r#"{"token":"adm","role":"ADMIN"}"#),
        }],
    );
    assert_eq!(model.screen, Screen::AdminDashboard);
    assert_eq!(
        model.active_toast.as_ref().map(|t| t.message.as_str()),
        Some("Admin logged in successfully")
    );
}

#[test]
fn admin_portal_refuses_citizens() {
    let app = Tester::default();
    let mut model = fresh(&app);
    run(&app, &mut model, vec![Event::Navigate(Screen::AdminLogin)]);
    let effects = run(
        &app,
        &mut model,
        vec![Event::LoginResponse {
            portal: LoginPortal::Admin,
            username: "asha".into(),
            result: ok_response(r#"{"jwt":"tok","role":"USER"}"#),
        }],
    );

    assert!(!has_kv(&effects));
    assert!(model.session.is_none());
    assert_eq!(model.screen, Screen::AdminLogin);
    assert_eq!(
        model.last_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::AuthenticationFailed)
    );
}

#[test]
fn failed_login_shows_server_message() {
    let app = Tester::default();
    let mut model = fresh(&app);
    run(
        &app,
        &mut model,
        vec![Event::LoginResponse {
            portal: LoginPortal::Citizen,
            username: "asha".into(),
            result: status_response(
                StatusCode::Unauthorized,
                r#"{"message":"Incorrect username or password"}"#,
            ),
        }],
    );
    assert_eq!(
        model.active_toast.as_ref().map(|t| t.message.as_str()),
        Some("Incorrect username or password")
    );
    assert!(!app.view(&model).is_busy);
}

#[test]
fn blank_credentials_never_reach_the_network() {
    let app = Tester::default();
    let mut model = fresh(&app);
    let effects = run(&app, &mut model, vec![login(LoginPortal::Citizen, "")]);
    assert!(http_requests(effects).is_empty());
    assert_eq!(
        model.last_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::AuthenticationFailed)
    );
}

#[test]
fn registration_round_trip() {
    let app = Tester::default();
    let mut model = fresh(&app);
    run(&app, &mut model, vec![Event::Navigate(Screen::Register)]);

    let form = RegistrationForm {
        username: "asha".into(),
        password: Secret::new("pw"),
        full_name: "Asha Rao".into(),
        email: Some("asha@example.com".into()),
        mobile: None,
    };
    let effects = run(&app, &mut model, vec![Event::RegisterSubmitted(form)]);
    let request = take_http(effects);
    assert_eq!(request.url, "http://localhost:8080/api/auth/register");
    let body = json_body(&request);
    assert_eq!(body["fullName"], "Asha Rao");
    assert!(body.get("mobile").is_none());

    run(
        &app,
        &mut model,
        vec![Event::RegisterResponse(ok_response(r#"{"id":4,"username":"asha"}"#))],
    );
    assert_eq!(model.screen, Screen::Login);
    assert_eq!(
        model.active_toast.as_ref().map(|t| t.message.as_str()),
        Some("Registration successful! Please login.")
    );
}

#[test]
fn rejected_registration_keeps_the_form_open() {
    let app = Tester::default();
    let mut model = fresh(&app);
    run(&app, &mut model, vec![Event::Navigate(Screen::Register)]);
    run(
        &app,
        &mut model,
        vec![Event::RegisterResponse(status_response(
            StatusCode::BadRequest,
            "Username is already taken!",
        ))],
    );
    assert_eq!(model.screen, Screen::Register);
    assert_eq!(
        model.active_toast.as_ref().map(|t| t.message.as_str()),
        Some("Username is already taken!")
    );
}

#[test]
fn logout_clears_everything() {
    let app = Tester::default();
    let (mut model, _) = restored(&app, Role::Citizen);
    let effects = run(&app, &mut model, vec![Event::LogoutRequested]);

    assert!(has_kv(&effects));
    assert!(model.session.is_none());
    assert!(model.citizen.complaints.is_empty());
    assert_eq!(model.screen, Screen::Login);
    assert!(app.view(&model).nav.is_none());
}

#[test]
fn guards_redirect_by_role() {
    let app = Tester::default();

    let mut model = fresh(&app);
    run(&app, &mut model, vec![Event::Navigate(Screen::LodgeComplaint)]);
    assert_eq!(model.screen, Screen::Login);
    assert!(model.workflow.is_none());

    let (mut model, _) = restored(&app, Role::Citizen);
    run(&app, &mut model, vec![Event::Navigate(Screen::AdminDashboard)]);
    assert_eq!(model.screen, Screen::Dashboard);

    let (mut model, _) = restored(&app, Role::Admin);
    run(&app, &mut model, vec![Event::Navigate(Screen::LodgeComplaint)]);
    assert_eq!(model.screen, Screen::AdminDashboard);
    assert!(model.workflow.is_none());
}
