use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime, Document};
use serde::Deserialize;

use crate::auth::AdminUser;
use crate::db::models::{DonationStatus, ParticipationStatus};
use crate::db;
use crate::db::views::{paginate, AdminDashboard, EventLogEntry};
use crate::AppState;

const USERS_PAGE_SIZE: u64 = 20;
const DONATIONS_PAGE_SIZE: u64 = 20;
const ACTIVITIES_PAGE_SIZE: u64 = 20;
const LOGS_PAGE_SIZE: u64 = 50;
const LEADERBOARD_SIZE: usize = 10;
const RECENT_SIZE: i64 = 10;

#[derive(Deserialize)]
pub struct DashboardParams {
    pub days: Option<i64>,
}

/// Aggregate statistics over every collection. Each figure is its own live
/// query; the dashboard reflects the store as of each query, not a single
/// snapshot.
pub async fn dashboard(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<DashboardParams>,
) -> impl IntoResponse {
    let days = params.days.unwrap_or(30).clamp(1, 365);
    let now = chrono::Utc::now();
    let window_start = DateTime::from_chrono(now - chrono::Duration::days(days));

    let result: anyhow::Result<AdminDashboard> = async {
        let donations = db::donation_counts(&state.db).await?;

        let recent_users = db::recent_users(&state.db, RECENT_SIZE).await?;
        let mut recent_user_views = Vec::with_capacity(recent_users.len());
        for user in &recent_users {
            recent_user_views.push(db::user_with_roles(&state.db, user).await?);
        }

        let categories = db::distinct_item_categories(&state.db).await?;
        let mut category_stats = Vec::with_capacity(categories.len());
        for category in categories {
            category_stats.push(db::category_donation_stats(&state.db, &category).await?);
        }

        Ok(AdminDashboard {
            days,
            total_users: db::count_users(&state.db).await?,
            active_users: db::count_users_by_active(&state.db, true).await?,
            blocked_users: db::count_users_by_active(&state.db, false).await?,
            new_users_period: db::count_users_joined_since(&state.db, window_start).await?,
            new_donations_period: db::count_donations_since(&state.db, window_start).await?,
            donations,
            total_activities: db::count_activities(&state.db).await?,
            joined_participations: db::count_participations_by_status(
                &state.db,
                ParticipationStatus::Joined,
            )
            .await?,
            completed_participations: db::count_participations_by_status(
                &state.db,
                ParticipationStatus::Completed,
            )
            .await?,
            cancelled_participations: db::count_participations_by_status(
                &state.db,
                ParticipationStatus::Cancelled,
            )
            .await?,
            donation_category_stats: category_stats,
            volunteer_activity_trends: db::trend_points(&state.db, days, now).await?,
            top_donors: db::top_donors(&state.db, LEADERBOARD_SIZE).await?,
            top_recipients: db::top_recipients(&state.db, LEADERBOARD_SIZE).await?,
            recent_donations: db::recent_donations(&state.db, RECENT_SIZE).await?,
            recent_users: recent_user_views,
        })
    }
    .await;

    match result {
        Ok(dashboard) => Json(dashboard).into_response(),
        Err(e) => {
            tracing::error!("admin dashboard failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct UserListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub role: Option<String>,
    pub page: Option<u64>,
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<UserListParams>,
) -> impl IntoResponse {
    let active = match params.status.as_deref() {
        Some("active") => Some(true),
        Some("blocked") => Some(false),
        Some("") | None => None,
        Some(_) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Status filter must be active or blocked.",
            )
                .into_response();
        }
    };

    let result: anyhow::Result<_> = async {
        let users = db::list_users_filtered(&state.db, params.search.as_deref(), active).await?;
        let mut views = Vec::with_capacity(users.len());
        for user in &users {
            views.push(db::user_with_roles(&state.db, user).await?);
        }
        Ok(views)
    }
    .await;

    let mut views = match result {
        Ok(views) => views,
        Err(e) => {
            tracing::error!("admin user list failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    match params.role.as_deref() {
        Some("donor") => views.retain(|u| u.is_donor),
        Some("recipient") => views.retain(|u| u.is_recipient),
        Some("volunteer") => views.retain(|u| u.is_volunteer),
        _ => {}
    }

    Json(paginate(views, params.page.unwrap_or(1), USERS_PAGE_SIZE)).into_response()
}

pub async fn user_detail(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    _admin: AdminUser,
) -> impl IntoResponse {
    let user = match db::find_user_by_id(&state.db, &user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("admin user lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let result: anyhow::Result<_> = async {
        let view = db::user_with_roles(&state.db, &user).await?;

        let donations = match db::donor_for_user(&state.db, &user.id).await? {
            Some(donor) => {
                let donations = db::donations_for_donor(&state.db, &donor.id).await?;
                db::donation_details_for(&state.db, &donations).await?
            }
            None => Vec::new(),
        };
        let claimed = match db::recipient_for_user(&state.db, &user.id).await? {
            Some(recipient) => {
                let claims = db::donations_for_recipient(&state.db, &recipient.id).await?;
                db::donation_details_for(&state.db, &claims).await?
            }
            None => Vec::new(),
        };
        let activities = match db::volunteer_for_user(&state.db, &user.id).await? {
            Some(volunteer) => {
                let organized = db::activities_for_volunteer(&state.db, &volunteer.id).await?;
                db::activity_details_for(&state.db, &organized, Some(&volunteer.id)).await?
            }
            None => Vec::new(),
        };

        Ok(serde_json::json!({
            "user": view,
            "email_verified": user.email_verified,
            "is_staff": user.is_staff,
            "is_superuser": user.is_superuser,
            "donations": donations,
            "claimed_donations": claimed,
            "activities": activities,
        }))
    }
    .await;

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            tracing::error!("admin user detail failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn toggle_user_status(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    _admin: AdminUser,
) -> impl IntoResponse {
    match db::toggle_user_active(&state.db, &user_id).await {
        Ok(Some(is_active)) => Json(serde_json::json!({
            "id": user_id,
            "is_active": is_active,
        }))
        .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("admin user toggle failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn delete_user(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    _admin: AdminUser,
) -> impl IntoResponse {
    match db::delete_user_cascade(&state.db, &user_id).await {
        Ok(true) => (
            StatusCode::OK,
            "User and all related data deleted successfully.",
        )
            .into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("admin user delete failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct DonationListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub page: Option<u64>,
}

pub async fn list_donations(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<DonationListParams>,
) -> impl IntoResponse {
    let status = match params.status.as_deref() {
        Some("") | None => None,
        Some(raw) => match DonationStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return (StatusCode::UNPROCESSABLE_ENTITY, "Unknown donation status.")
                    .into_response();
            }
        },
    };

    let details = db::donations_filtered(
        &state.db,
        status,
        params.category.as_deref(),
        params.search.as_deref(),
    )
    .await;
    match details {
        Ok(details) => {
            let categories = db::distinct_item_categories(&state.db)
                .await
                .unwrap_or_default();
            let page = paginate(details, params.page.unwrap_or(1), DONATIONS_PAGE_SIZE);
            Json(serde_json::json!({
                "donations": page,
                "categories": categories,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!("admin donation list failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn ship_donation(
    Path(donation_id): Path<String>,
    State(state): State<AppState>,
    _admin: AdminUser,
) -> impl IntoResponse {
    match db::donation_by_id(&state.db, &donation_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return (StatusCode::NOT_FOUND, "Donation not found.").into_response(),
        Err(e) => {
            tracing::error!("donation lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    match db::ship_donation(&state.db, &donation_id).await {
        Ok(true) => (StatusCode::OK, "Donation marked as shipped.").into_response(),
        Ok(false) => (
            StatusCode::CONFLICT,
            "Only claimed donations can be shipped.",
        )
            .into_response(),
        Err(e) => {
            tracing::error!("ship update failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn delete_donation(
    Path(donation_id): Path<String>,
    State(state): State<AppState>,
    _admin: AdminUser,
) -> impl IntoResponse {
    match db::delete_donation_cascade(&state.db, &donation_id).await {
        Ok(true) => (StatusCode::OK, "Donation deleted successfully.").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Donation not found.").into_response(),
        Err(e) => {
            tracing::error!("admin donation delete failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct ActivityListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<u64>,
}

pub async fn list_activities(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ActivityListParams>,
) -> impl IntoResponse {
    let result: anyhow::Result<_> = async {
        let activities = db::activities_filtered(
            &state.db,
            params.category.as_deref(),
            params.search.as_deref(),
        )
        .await?;
        let details = db::activity_details_for(&state.db, &activities, None).await?;
        let categories = db::distinct_activity_categories(&state.db).await?;
        Ok((details, categories))
    }
    .await;

    match result {
        Ok((details, categories)) => {
            let page = paginate(details, params.page.unwrap_or(1), ACTIVITIES_PAGE_SIZE);
            Json(serde_json::json!({
                "activities": page,
                "categories": categories,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!("admin activity list failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn delete_activity(
    Path(activity_id): Path<String>,
    State(state): State<AppState>,
    _admin: AdminUser,
) -> impl IntoResponse {
    match db::delete_activity_cascade(&state.db, &activity_id).await {
        Ok(true) => (StatusCode::OK, "Activity deleted successfully.").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Activity not found.").into_response(),
        Err(e) => {
            tracing::error!("admin activity delete failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct LogsParams {
    pub page: Option<u64>,
}

/// Merged feed of recent donation and activity events, newest first.
pub async fn activity_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<LogsParams>,
) -> impl IntoResponse {
    let result: anyhow::Result<Vec<EventLogEntry>> = async {
        let mut entries = Vec::new();

        for donation in db::recent_donations(&state.db, 20).await? {
            entries.push(EventLogEntry {
                kind: "donation".to_string(),
                action: format!("Donation {}", donation.status.as_str()),
                description: format!("{} by {}", donation.item.name, donation.donor_name),
                timestamp: donation.created_at,
                user: donation.donor_name.clone(),
            });
        }

        let activities = db::recent_activities(&state.db, 20).await?;
        for activity in db::activity_details_for(&state.db, &activities, None).await? {
            entries.push(EventLogEntry {
                kind: "activity".to_string(),
                action: "Activity created".to_string(),
                description: format!("{} at {}", activity.title, activity.location),
                timestamp: activity.created_at,
                user: activity.organizer_name.clone(),
            });
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
    .await;

    match result {
        Ok(entries) => {
            Json(paginate(entries, params.page.unwrap_or(1), LOGS_PAGE_SIZE)).into_response()
        }
        Err(e) => {
            tracing::error!("admin logs failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct ExportParams {
    #[serde(rename = "type")]
    pub export_type: Option<String>,
}

/// Attachment-style JSON dump of the selected collections.
pub async fn export_data(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ExportParams>,
) -> impl IntoResponse {
    let export_type = params.export_type.unwrap_or_else(|| "all".to_string());
    if !matches!(
        export_type.as_str(),
        "all" | "users" | "donations" | "activities"
    ) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Export type must be one of all, users, donations, activities.",
        )
            .into_response();
    }

    let result: anyhow::Result<serde_json::Value> = async {
        let mut data = serde_json::Map::new();
        for name in ["users", "donations", "activities"] {
            if export_type != "all" && export_type != name {
                continue;
            }
            let docs: Vec<Document> = state
                .db
                .collection::<Document>(name)
                .find(doc! {})
                .await?
                .try_collect()
                .await?;
            data.insert(name.to_string(), serde_json::to_value(docs)?);
        }
        Ok(serde_json::Value::Object(data))
    }
    .await;

    match result {
        Ok(data) => {
            let body = serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string());
            let filename = format!(
                "admin_export_{}_{}.json",
                export_type,
                chrono::Utc::now().format("%Y%m%d_%H%M%S")
            );

            let mut resp = Response::new(body.into());
            let headers = resp.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            headers.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
                    .expect("valid header"),
            );
            resp
        }
        Err(e) => {
            tracing::error!("admin export failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
