use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crux_http::{HttpError, Response};

use crate::model::ComplaintId;

pub const MAX_ERROR_MESSAGE_LENGTH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// Backend routes consumed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    AdminLogin,
    Register,
    MyComplaints,
    CreateComplaint,
    AdminComplaints,
    UpdateStatus(ComplaintId),
}

impl Endpoint {
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/api/auth/login".into(),
            Self::AdminLogin => "/api/auth/admin/login".into(),
            Self::Register => "/api/auth/register".into(),
            Self::MyComplaints => "/api/complaints/my".into(),
            Self::CreateComplaint => "/api/complaints".into(),
            Self::AdminComplaints => "/api/admin/complaints".into(),
            Self::UpdateStatus(id) => format!("/api/admin/complaints/{id}/status"),
        }
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        match self {
            Self::MyComplaints | Self::AdminComplaints => Method::Get,
            Self::UpdateStatus(_) => Method::Put,
            Self::Login | Self::AdminLogin | Self::Register | Self::CreateComplaint => {
                Method::Post
            }
        }
    }

    /// Whether the bearer token must accompany the request.
    #[must_use]
    pub const fn requires_auth(&self) -> bool {
        !matches!(self, Self::Login | Self::AdminLogin | Self::Register)
    }
}

/// Every failed request is treated the same way; the variants only exist so
/// logs can tell a dropped connection from a rejected one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpFailure {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}")]
    Status {
        status: u16,
        message: Option<String>,
    },

    #[error("unreadable response body: {0}")]
    Decode(String),
}

impl HttpFailure {
    /// The message the backend put in the error body, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } => Some(message.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Pulls a human-readable message out of an error body.
///
/// The backend answers with `{"message": ...}`, `{"error": ...}` or a bare
/// string depending on the controller.
#[must_use]
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }

    if let Ok(parsed) = serde_json::from_slice::<ApiErrorBody>(body) {
        return parsed
            .message
            .or(parsed.error)
            .filter(|m| !m.trim().is_empty())
            .map(|m| truncate(&m));
    }

    if let Ok(text) = serde_json::from_slice::<String>(body) {
        return Some(truncate(&text)).filter(|m| !m.is_empty());
    }

    std::str::from_utf8(body)
        .ok()
        .map(str::trim)
        .filter(|text| !text.is_empty() && !text.starts_with('<'))
        .map(truncate)
}

fn truncate(message: &str) -> String {
    message.trim().chars().take(MAX_ERROR_MESSAGE_LENGTH).collect()
}

/// Succeeds on any 2xx, handing back the raw body. Non-2xx answers arrive
/// either as an `HttpError::Http` or as a plain response depending on the
/// shell; both end up as `HttpFailure::Status`.
pub fn read_success(
    result: crux_http::Result<Response<Vec<u8>>>,
) -> Result<Option<Vec<u8>>, HttpFailure> {
    let mut response = match result {
        Ok(response) => response,
        Err(HttpError::Http { code, body, .. }) => {
            return Err(HttpFailure::Status {
                status: u16::from(code),
                message: body.as_deref().and_then(extract_error_message),
            })
        }
        Err(e) => return Err(HttpFailure::Transport(e.to_string())),
    };
    let status = response.status();
    let body = response.take_body();

    if status.is_success() {
        Ok(body)
    } else {
        Err(HttpFailure::Status {
            status: u16::from(status),
            message: body.as_deref().and_then(extract_error_message),
        })
    }
}

pub fn read_json<T: DeserializeOwned>(
    result: crux_http::Result<Response<Vec<u8>>>,
) -> Result<T, HttpFailure> {
    let body = read_success(result)?.unwrap_or_default();
    serde_json::from_slice(&body).map_err(|e| HttpFailure::Decode(e.to_string()))
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crux_http::testing::ResponseBuilder;

    #[test]
    fn endpoint_paths_match_backend_routes() {
        assert_eq!(Endpoint::Login.path(), "/api/auth/login");
        assert_eq!(Endpoint::AdminLogin.path(), "/api/auth/admin/login");
        assert_eq!(Endpoint::Register.path(), "/api/auth/register");
        assert_eq!(Endpoint::MyComplaints.path(), "/api/complaints/my");
        assert_eq!(Endpoint::CreateComplaint.path(), "/api/complaints");
        assert_eq!(Endpoint::AdminComplaints.path(), "/api/admin/complaints");
        assert_eq!(
            Endpoint::UpdateStatus(ComplaintId::new(42)).path(),
            "/api/admin/complaints/42/status"
        );
    }

    #[test]
    fn endpoint_methods() {
        assert_eq!(Endpoint::Login.method(), Method::Post);
        assert_eq!(Endpoint::CreateComplaint.method(), Method::Post);
        assert_eq!(Endpoint::MyComplaints.method(), Method::Get);
        assert_eq!(Endpoint::AdminComplaints.method(), Method::Get);
        assert_eq!(Endpoint::UpdateStatus(ComplaintId::new(3)).method(), Method::Put);
    }

    #[test]
    fn auth_routes_are_public() {
        assert!(!Endpoint::Login.requires_auth());
        assert!(!Endpoint::Register.requires_auth());
        assert!(Endpoint::CreateComplaint.requires_auth());
        assert!(Endpoint::UpdateStatus(ComplaintId::new(1)).requires_auth());
        assert!(Endpoint::MyComplaints.requires_auth());
    }

    #[test]
    fn message_field_is_preferred() {
        let body = br#"{"message":"Invalid credentials","error":"Unauthorized"}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Invalid credentials")
        );
    }

    #[test]
    fn plain_text_bodies_are_used_verbatim() {
        assert_eq!(
            extract_error_message(b"Username is already taken!").as_deref(),
            Some("Username is already taken!")
        );
        assert_eq!(
            extract_error_message(br#""Invalid status""#).as_deref(),
            Some("Invalid status")
        );
    }

    #[test]
    fn html_and_empty_bodies_are_ignored() {
        assert_eq!(extract_error_message(b""), None);
        assert_eq!(extract_error_message(b"<html>Whitelabel</html>"), None);
        assert_eq!(extract_error_message(br#"{"message":"  "}"#), None);
    }

    #[test]
    fn long_messages_are_truncated() {
        let long = "x".repeat(1000);
        let message = extract_error_message(long.as_bytes()).unwrap();
        assert_eq!(message.len(), MAX_ERROR_MESSAGE_LENGTH);
    }

    #[test]
    fn successful_json_is_decoded() {
        let response = ResponseBuilder::ok().body(br#"[1,2,3]"#.to_vec()).build();
        let values: Vec<u32> = read_json(Ok(response)).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn malformed_json_is_a_decode_failure() {
        let response = ResponseBuilder::ok().body(b"not json".to_vec()).build();
        let result: Result<Vec<u32>, _> = read_json(Ok(response));
        assert!(matches!(result, Err(HttpFailure::Decode(_))));
    }

    #[test]
    fn http_errors_keep_the_server_message() {
        let result = Err(HttpError::Http {
            code: crux_http::http::StatusCode::Unauthorized,
            message: "Unauthorized".into(),
            body: Some(br#"{"message":"Incorrect username or password"}"#.to_vec()),
        });
        let failure = read_success(result).unwrap_err();
        assert_eq!(
            failure,
            HttpFailure::Status {
                status: 401,
                message: Some("Incorrect username or password".into()),
            }
        );
    }

    #[test]
    fn server_message_only_exists_on_status_failures() {
        let failure = HttpFailure::Status {
            status: 400,
            message: Some("Invalid status".into()),
        };
        assert_eq!(failure.server_message(), Some("Invalid status"));
        assert_eq!(HttpFailure::Transport("offline".into()).server_message(), None);
    }
}
