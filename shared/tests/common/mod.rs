#![allow(dead_code)]

use crux_core::capability::Operation;
use crux_core::testing::AppTester;
use crux_core::Request;
use crux_http::protocol::HttpRequest;
use crux_http::testing::ResponseBuilder;

use shared::capabilities::{CameraOperation, GeolocationOperation};
use shared::model::Role;
use shared::session::{self, Session};
use shared::{App, Effect, Event, Model};

pub type Tester = AppTester<App, Effect>;

/// Runs events through `update`, collecting every effect they produce.
pub fn run(app: &Tester, model: &mut Model, events: Vec<Event>) -> Vec<Effect> {
    let mut effects = Vec::new();
    for event in events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

pub fn resolve<Op: Operation>(
    app: &Tester,
    model: &mut Model,
    mut request: Request<Op>,
    output: Op::Output,
) -> Vec<Effect> {
    let update = app
        .resolve(&mut request, output)
        .expect("request should resolve");
    run(app, model, update.events)
}

pub fn http_requests(effects: Vec<Effect>) -> Vec<HttpRequest> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::Http(request) => Some(request.operation),
            _ => None,
        })
        .collect()
}

pub fn take_http(effects: Vec<Effect>) -> HttpRequest {
    http_requests(effects)
        .into_iter()
        .next()
        .expect("expected an http request")
}

pub fn take_camera(effects: Vec<Effect>) -> Request<CameraOperation> {
    effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Camera(request) => Some(request),
            _ => None,
        })
        .expect("expected a camera request")
}

pub fn camera_ops(effects: &[Effect]) -> Vec<CameraOperation> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Camera(request) => Some(request.operation.clone()),
            _ => None,
        })
        .collect()
}

pub fn take_geolocation(effects: Vec<Effect>) -> Request<GeolocationOperation> {
    effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Geolocation(request) => Some(request),
            _ => None,
        })
        .expect("expected a geolocation request")
}

pub fn has_kv(effects: &[Effect]) -> bool {
    effects.iter().any(|e| matches!(e, Effect::KeyValue(_)))
}

pub fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

pub fn json_body(request: &HttpRequest) -> serde_json::Value {
    serde_json::from_slice(&request.body).expect("request body should be json")
}

pub fn ok_response(body: &str) -> Box<crux_http::Result<crux_http::Response<Vec<u8>>>> {
    Box::new(Ok(ResponseBuilder::ok().body(body.as_bytes().to_vec()).build()))
}

pub fn status_response(
    status: crux_http::http::StatusCode,
    body: &str,
) -> Box<crux_http::Result<crux_http::Response<Vec<u8>>>> {
    Box::new(Ok(ResponseBuilder::with_status(status)
        .body(body.as_bytes().to_vec())
        .build()))
}

/// A model whose stored session has just been restored, plus the effects
/// the restore produced.
pub fn restored(app: &Tester, role: Role) -> (Model, Vec<Effect>) {
    let mut model = Model::default();
    let session = Session::new("asha".into(), role, "tok-123".into()).expect("valid session");
    let bytes = session::encode(&session).expect("encodable session");
    let effects = run(app, &mut model, vec![Event::SessionLoaded(Ok(Some(bytes)))]);
    (model, effects)
}
