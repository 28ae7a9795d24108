use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::notify::{EmailTemplate, Mailer};
use crate::AppState;

pub mod activities;
pub mod admin;
pub mod donations;
pub mod roles;

#[derive(Deserialize)]
pub struct ContactRequest {
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
}

/// Relay a contact-form message to the configured admin address.
pub async fn contact_admin(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> impl IntoResponse {
    if req.subject.trim().is_empty() || req.message.trim().is_empty() || req.email.trim().is_empty()
    {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Subject, message and email are required.",
        )
            .into_response();
    }

    state
        .mailer
        .send(
            &Mailer::admin_contact_email(),
            EmailTemplate::ContactMessage {
                subject: req.subject.trim().to_string(),
                message: req.message.trim().to_string(),
                sender_name: req.name.trim().to_string(),
                sender_email: req.email.trim().to_string(),
            },
        )
        .await;

    (
        StatusCode::OK,
        "Your message was sent successfully! We'll get back to you shortly.",
    )
        .into_response()
}
