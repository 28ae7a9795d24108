use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::DateTime;
use serde::Deserialize;

use crate::auth::AuthenticatedUser;
use crate::db::activities::{JoinOutcome, LeaveOutcome, NewActivity};
use crate::db::models::{ActivityStatus, ParticipationStatus};
use crate::db;
use crate::db::views::paginate;
use crate::notify::EmailTemplate;
use crate::AppState;

const LIST_PAGE_SIZE: u64 = 12;

#[derive(Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
}

/// Upcoming activities with live joined-counts. When the caller is signed in
/// as a volunteer, each entry also says whether they currently participate.
pub async fn list_activities(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let viewer_volunteer = match &viewer {
        Some(user) => match db::volunteer_for_user(&state.db, &user.id).await {
            Ok(volunteer) => volunteer,
            Err(e) => {
                tracing::error!("volunteer lookup failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
            }
        },
        None => None,
    };

    let result: anyhow::Result<_> = async {
        let activities = db::list_upcoming_activities(
            &state.db,
            params.category.as_deref(),
            params.search.as_deref(),
            DateTime::now(),
        )
        .await?;
        let details = db::activity_details_for(
            &state.db,
            &activities,
            viewer_volunteer.as_ref().map(|v| v.id.as_str()),
        )
        .await?;
        let categories = db::distinct_activity_categories(&state.db).await?;
        Ok((details, categories))
    }
    .await;

    match result {
        Ok((details, categories)) => {
            let page = paginate(details, params.page.unwrap_or(1), LIST_PAGE_SIZE);
            Json(serde_json::json!({
                "activities": page,
                "categories": categories,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!("activity list failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct CreateActivityRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_url: Option<String>,
    /// RFC 3339 timestamp.
    pub activity_date: String,
    pub duration_hours: Option<i64>,
    pub max_participants: Option<i64>,
    pub requirements: Option<String>,
    pub contact_info: Option<String>,
}

pub async fn create_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateActivityRequest>,
) -> impl IntoResponse {
    if req.title.trim().is_empty()
        || req.description.trim().is_empty()
        || req.category.trim().is_empty()
        || req.location.trim().is_empty()
    {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Title, description, category and location are required.",
        )
            .into_response();
    }
    let activity_date = match ChronoDateTime::parse_from_rfc3339(&req.activity_date) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                "activity_date must be an RFC 3339 timestamp.",
            )
                .into_response();
        }
    };

    let volunteer = match db::volunteer_for_user(&state.db, &user.id).await {
        Ok(Some(volunteer)) => volunteer,
        Ok(None) => {
            return (StatusCode::FORBIDDEN, "Volunteer profile not found.").into_response();
        }
        Err(e) => {
            tracing::error!("volunteer lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let new_activity = NewActivity {
        title: req.title.trim().to_string(),
        description: req.description.trim().to_string(),
        category: req.category.trim().to_string(),
        location: req.location.trim().to_string(),
        latitude: req.latitude,
        longitude: req.longitude,
        image_url: req.image_url,
        activity_date: DateTime::from_chrono(activity_date),
        duration_hours: req.duration_hours.unwrap_or(1),
        max_participants: req.max_participants.unwrap_or(1),
        requirements: req.requirements,
        contact_info: req.contact_info,
    };

    match db::create_activity(&state.db, &volunteer.id, new_activity, DateTime::now()).await {
        Ok(activity) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": activity.id, "status": activity.status })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("activity create failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Volunteer dashboard: organized activities plus the caller's participation
/// history and counts.
pub async fn my_activities(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let volunteer = match db::volunteer_for_user(&state.db, &user.id).await {
        Ok(Some(volunteer)) => volunteer,
        Ok(None) => {
            return (StatusCode::FORBIDDEN, "Volunteer profile not found.").into_response();
        }
        Err(e) => {
            tracing::error!("volunteer lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let result: anyhow::Result<_> = async {
        let organized = db::activities_for_volunteer(&state.db, &volunteer.id).await?;
        let organized =
            db::activity_details_for(&state.db, &organized, Some(&volunteer.id)).await?;
        let participations = db::participations_for_volunteer(&state.db, &volunteer.id).await?;
        let participations = db::participation_views_for(&state.db, &participations).await?;
        let joined_count =
            db::count_participations_for_volunteer(&state.db, &volunteer.id, None).await?;
        let completed_count = db::count_participations_for_volunteer(
            &state.db,
            &volunteer.id,
            Some(ParticipationStatus::Completed),
        )
        .await?;
        let total_activities = organized.len();
        Ok(serde_json::json!({
            "activities": organized,
            "participations": participations,
            "total_activities": total_activities,
            "joined_count": joined_count,
            "completed_count": completed_count,
        }))
    }
    .await;

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            tracing::error!("volunteer dashboard failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn join_activity(
    Path(activity_id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let volunteer = match db::volunteer_for_user(&state.db, &user.id).await {
        Ok(Some(volunteer)) => volunteer,
        Ok(None) => {
            return (
                StatusCode::FORBIDDEN,
                "You need to be a volunteer to join activities.",
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("volunteer lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let activity = match db::activity_by_id(&state.db, &activity_id).await {
        Ok(Some(activity)) => activity,
        Ok(None) => return (StatusCode::NOT_FOUND, "Activity not found.").into_response(),
        Err(e) => {
            tracing::error!("activity lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    // A closed or cancelled activity takes no new joins; this is what keeps
    // the joined-count at or below capacity.
    if activity.status != ActivityStatus::Available {
        return (StatusCode::CONFLICT, "This activity is full or closed.").into_response();
    }

    let outcome = match db::join_activity(
        &state.db,
        &activity.id,
        &volunteer.id,
        &user.id,
        DateTime::now(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("join failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    match outcome {
        JoinOutcome::Joined | JoinOutcome::Rejoined => {}
        JoinOutcome::AlreadyJoined => {
            return (
                StatusCode::OK,
                Json(serde_json::json!({
                    "message": "You are already participating in this activity.",
                })),
            )
                .into_response();
        }
        JoinOutcome::Terminal => {
            return (
                StatusCode::CONFLICT,
                "Your participation in this activity has already ended.",
            )
                .into_response();
        }
    }

    let closed = match db::refresh_activity_status(&state.db, &activity.id).await {
        Ok(status) => status == Some(ActivityStatus::Completed),
        Err(e) => {
            tracing::error!("activity status refresh failed: {}", e);
            false
        }
    };

    notify_join(&state, &activity.volunteer_id, &activity.title, &user).await;

    let message = if closed {
        "Successfully joined the activity! The activity is now full."
    } else {
        "Successfully joined the activity!"
    };
    (StatusCode::OK, Json(serde_json::json!({ "message": message }))).into_response()
}

/// Email the joiner and the organizer. Best-effort only.
async fn notify_join(
    state: &AppState,
    organizer_volunteer_id: &str,
    activity_title: &str,
    joiner: &AuthenticatedUser,
) {
    state
        .mailer
        .send(
            &joiner.email,
            EmailTemplate::ActivityJoinedVolunteer {
                volunteer_name: joiner.name.clone(),
                activity_title: activity_title.to_string(),
            },
        )
        .await;

    let organizer_user = match db::volunteer_by_id(&state.db, organizer_volunteer_id).await {
        Ok(Some(volunteer)) => match db::find_user_by_id(&state.db, &volunteer.user_id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!("join notification organizer lookup failed: {}", e);
                None
            }
        },
        _ => None,
    };
    if let Some(organizer) = organizer_user {
        state
            .mailer
            .send(
                &organizer.email,
                EmailTemplate::ActivityJoinedOrganizer {
                    organizer_name: organizer.name,
                    volunteer_name: joiner.name.clone(),
                    activity_title: activity_title.to_string(),
                },
            )
            .await;
    }
}

pub async fn leave_activity(
    Path(activity_id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let volunteer = match db::volunteer_for_user(&state.db, &user.id).await {
        Ok(Some(volunteer)) => volunteer,
        Ok(None) => {
            return (
                StatusCode::FORBIDDEN,
                "You need to be a volunteer to leave activities.",
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("volunteer lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let activity = match db::activity_by_id(&state.db, &activity_id).await {
        Ok(Some(activity)) => activity,
        Ok(None) => return (StatusCode::NOT_FOUND, "Activity not found.").into_response(),
        Err(e) => {
            tracing::error!("activity lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let outcome = match db::leave_activity(&state.db, &activity.id, &volunteer.id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("leave failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    match outcome {
        LeaveOutcome::Left => {
            let reopened = match db::refresh_activity_status(&state.db, &activity.id).await {
                Ok(status) => status == Some(ActivityStatus::Available),
                Err(e) => {
                    tracing::error!("activity status refresh failed: {}", e);
                    false
                }
            };
            let message = if reopened {
                "Successfully left the activity. The activity has space again."
            } else {
                "Successfully left the activity."
            };
            (StatusCode::OK, Json(serde_json::json!({ "message": message }))).into_response()
        }
        LeaveOutcome::NotJoined | LeaveOutcome::NotFound => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "You are not participating in this activity.",
            })),
        )
            .into_response(),
        LeaveOutcome::Terminal => (
            StatusCode::CONFLICT,
            "Your participation in this activity has already ended.",
        )
            .into_response(),
    }
}

/// Organizer override of the derived status: available and completed toggle,
/// cancelled goes back to available.
pub async fn update_activity_status(
    Path(activity_id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let activity = match db::activity_by_id(&state.db, &activity_id).await {
        Ok(Some(activity)) => activity,
        Ok(None) => return (StatusCode::NOT_FOUND, "Activity not found.").into_response(),
        Err(e) => {
            tracing::error!("activity lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    match db::volunteer_for_user(&state.db, &user.id).await {
        Ok(Some(volunteer)) if volunteer.id == activity.volunteer_id => {}
        Ok(_) => {
            return (
                StatusCode::FORBIDDEN,
                "You can only update activities you created.",
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("volunteer lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    let next = match activity.status {
        ActivityStatus::Available => ActivityStatus::Completed,
        ActivityStatus::Completed | ActivityStatus::Cancelled => ActivityStatus::Available,
    };

    match db::set_activity_status(&state.db, &activity.id, next).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": activity.id, "status": next })),
        )
            .into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Activity not found.").into_response(),
        Err(e) => {
            tracing::error!("activity status update failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn delete_activity(
    Path(activity_id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let activity = match db::activity_by_id(&state.db, &activity_id).await {
        Ok(Some(activity)) => activity,
        Ok(None) => return (StatusCode::NOT_FOUND, "Activity not found.").into_response(),
        Err(e) => {
            tracing::error!("activity lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let is_owner = match db::volunteer_for_user(&state.db, &user.id).await {
        Ok(volunteer) => volunteer
            .map(|v| v.id == activity.volunteer_id)
            .unwrap_or(false),
        Err(e) => {
            tracing::error!("volunteer lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    if !is_owner && !(user.is_staff || user.is_superuser) {
        return (
            StatusCode::FORBIDDEN,
            "You can only delete activities you created.",
        )
            .into_response();
    }

    match db::delete_activity_cascade(&state.db, &activity.id).await {
        Ok(true) => (StatusCode::OK, "Activity deleted successfully!").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Activity not found.").into_response(),
        Err(e) => {
            tracing::error!("activity delete failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
