//! Request and response bodies exchanged with the complaint backend.

use serde::{Deserialize, Serialize};

use crate::event::RegistrationForm;
use crate::model::{Category, ComplaintStatus, Role};

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "jwt", alias = "accessToken")]
    pub token: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<&'a str>,
}

impl<'a> RegisterRequest<'a> {
    /// Trims every field; blank optional fields are left out of the body.
    pub fn from_form(form: &'a RegistrationForm) -> Result<Self, &'static str> {
        let username = form.username.trim();
        let full_name = form.full_name.trim();
        if username.is_empty() {
            return Err("Username is required");
        }
        if form.password.is_empty() {
            return Err("Password is required");
        }
        if full_name.is_empty() {
            return Err("Full name is required");
        }

        let optional = |value: &'a Option<String>| {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        };

        Ok(Self {
            username,
            password: form.password.expose(),
            full_name,
            email: optional(&form.email),
            mobile: optional(&form.mobile),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComplaintRequest {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdateRequest {
    pub status: ComplaintStatus,
    pub remarks: String,
}

#[cfg(test)]
mod api_tests {
    use super::*;
    use crate::event::Secret;
    use serde_json::{json, Value};

    fn form() -> RegistrationForm {
        RegistrationForm {
            username: " asha ".into(),
            password: Secret::new("pw"),
            full_name: "Asha Rao".into(),
            email: Some("  ".into()),
            mobile: Some("9876543210".into()),
        }
    }

    #[test]
    fn register_body_uses_camel_case_and_drops_blanks() {
        let form = form();
        let request = RegisterRequest::from_form(&form).unwrap();
        let body: Value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "username": "asha",
                "password": "pw",
                "fullName": "Asha Rao",
                "mobile": "9876543210"
            })
        );
    }

    #[test]
    fn register_requires_core_fields() {
        let mut form = form();
        form.full_name = " ".into();
        assert_eq!(
            RegisterRequest::from_form(&form).unwrap_err(),
            "Full name is required"
        );
        form.password = Secret::new("");
        assert_eq!(
            RegisterRequest::from_form(&form).unwrap_err(),
            "Password is required"
        );
    }

    #[test]
    fn login_response_accepts_jwt_alias() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"jwt":"abc","role":"USER","username":"asha"}"#).unwrap();
        assert_eq!(response.token, "abc");
        assert_eq!(response.role, Role::Citizen);
    }

    #[test]
    fn image_url_is_omitted_when_absent() {
        let request = CreateComplaintRequest {
            title: "Pothole".into(),
            description: "Deep".into(),
            category: Category::Road,
            latitude: 12.97,
            longitude: 77.59,
            image_url: None,
        };
        let body: Value = serde_json::to_value(&request).unwrap();
        assert!(body.get("imageUrl").is_none());
        assert_eq!(body["category"], "ROAD");
        assert_eq!(body["latitude"], 12.97);
    }

    #[test]
    fn status_update_body() {
        let body = serde_json::to_value(StatusUpdateRequest {
            status: ComplaintStatus::InProgress,
            remarks: "Crew assigned".into(),
        })
        .unwrap();
        assert_eq!(body, json!({"status": "IN_PROGRESS", "remarks": "Crew assigned"}));
    }
}
