//! Shell-facing capabilities.
//!
//! Render, Http and KeyValue are the stock Crux capabilities; Camera and
//! Geolocation are ours and are resolved by each shell against its platform API.

mod camera;
mod geolocation;
pub mod http;
mod kv;

pub use self::camera::{
    Camera, CameraError, CameraFacing, CameraOperation, CameraOutput, CameraResult,
};
pub use self::geolocation::{
    Geolocation, GeolocationError, GeolocationOperation, GeolocationOptions, GeolocationResult,
    Position,
};
pub use self::http::{Endpoint, HttpFailure};
pub use self::kv::{KvError, KvResult};

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub kv: KeyValue<Event>,
    pub render: Render<Event>,
    pub camera: Camera<Event>,
    pub geolocation: Geolocation<Event>,
}
