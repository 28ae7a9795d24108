use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use mongodb::bson::DateTime;

use crate::auth::AuthenticatedUser;
use crate::db;
use crate::AppState;

/// Role flags are existence checks on the profile collections, never a
/// bitmask on the user document.
pub async fn my_roles(State(state): State<AppState>, user: AuthenticatedUser) -> impl IntoResponse {
    let current = match db::find_user_by_id(&state.db, &user.id).await {
        Ok(Some(current)) => current,
        Ok(None) => return (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("roles lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    match db::user_with_roles(&state.db, &current).await {
        Ok(view) => Json(serde_json::json!({
            "is_donor": view.is_donor,
            "is_recipient": view.is_recipient,
            "is_volunteer": view.is_volunteer,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("role flags lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn become_donor(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::ensure_donor_profile(&state.db, &user.id, DateTime::now()).await {
        Ok(true) => (StatusCode::CREATED, "Donor profile created successfully!").into_response(),
        Ok(false) => (StatusCode::OK, "You already have a donor profile.").into_response(),
        Err(e) => {
            tracing::error!("donor profile create failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn become_recipient(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    // The initial shipping address mirrors the user's street; editable later.
    let street = match db::find_user_by_id(&state.db, &user.id).await {
        Ok(Some(current)) => current
            .address
            .map(|a| a.street)
            .unwrap_or_default(),
        Ok(None) => return (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("recipient profile lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    match db::ensure_recipient_profile(&state.db, &user.id, &street, DateTime::now()).await {
        Ok(true) => (
            StatusCode::CREATED,
            "Recipient profile created successfully!",
        )
            .into_response(),
        Ok(false) => (StatusCode::OK, "You already have a recipient profile.").into_response(),
        Err(e) => {
            tracing::error!("recipient profile create failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn become_volunteer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::ensure_volunteer_profile(&state.db, &user.id, DateTime::now()).await {
        Ok(true) => (
            StatusCode::CREATED,
            "Volunteer profile created successfully!",
        )
            .into_response(),
        Ok(false) => (StatusCode::OK, "You already have a volunteer profile.").into_response(),
        Err(e) => {
            tracing::error!("volunteer profile create failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
