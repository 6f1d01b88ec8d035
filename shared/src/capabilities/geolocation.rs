use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CoordinateError;

/// One-shot position fixes from the platform location service.
#[derive(Clone)]
pub struct Geolocation<E> {
    context: CapabilityContext<GeolocationOperation, E>,
}

impl<Ev> Capability<Ev> for Geolocation<Ev> {
    type Operation = GeolocationOperation;
    type MappedSelf<MappedEv> = Geolocation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Geolocation::new(self.context.map_event(f))
    }
}

impl<E> Geolocation<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<GeolocationOperation, E>) -> Self {
        Self { context }
    }

    pub fn current_position<F>(&self, options: GeolocationOptions, callback: F)
    where
        F: FnOnce(GeolocationResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(GeolocationOperation::CurrentPosition(options))
                .await;
            context.update_app(callback(result));
        });
    }
}

/// `timeout_ms: None` leaves the platform default in place.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GeolocationOptions {
    pub high_accuracy: bool,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeolocationOperation {
    CurrentPosition(GeolocationOptions),
}

impl Operation for GeolocationOperation {
    type Output = GeolocationResult;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    pub accuracy_m: Option<f64>,
}

pub type GeolocationResult = Result<Position, GeolocationError>;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("User denied Geolocation")]
    PermissionDenied,

    #[error("Timeout expired")]
    Timeout,

    #[error("Geolocation not supported")]
    Unsupported,

    #[error("{reason}")]
    Unavailable { reason: String },

    #[error("invalid position fix: {reason}")]
    InvalidFix { reason: String },
}

impl From<CoordinateError> for GeolocationError {
    fn from(e: CoordinateError) -> Self {
        Self::InvalidFix {
            reason: e.to_string(),
        }
    }
}
