use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use mongodb::bson::DateTime;
use serde::Deserialize;

use crate::auth::AuthenticatedUser;
use crate::db::models::DonationStatus;
use crate::db::views::paginate;
use crate::db::{self, NewItem};
use crate::notify::EmailTemplate;
use crate::AppState;

const BROWSE_PAGE_SIZE: u64 = 12;

#[derive(Deserialize)]
pub struct BrowseParams {
    pub category: Option<String>,
    pub condition: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
}

/// Public browse of available donations, joined with their items.
pub async fn list_donations(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> impl IntoResponse {
    let details = db::browse_available_donations(
        &state.db,
        params.category.as_deref(),
        params.condition.as_deref(),
        params.search.as_deref(),
    )
    .await;
    let details = match details {
        Ok(details) => details,
        Err(e) => {
            tracing::error!("donation browse failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let categories = db::distinct_item_categories(&state.db).await.unwrap_or_default();
    let conditions = db::distinct_item_conditions(&state.db).await.unwrap_or_default();

    let page = paginate(details, params.page.unwrap_or(1), BROWSE_PAGE_SIZE);
    Json(serde_json::json!({
        "donations": page,
        "categories": categories,
        "conditions": conditions,
    }))
    .into_response()
}

#[derive(Deserialize)]
pub struct CreateDonationRequest {
    pub name: String,
    pub description: String,
    pub category: String,
    pub condition: String,
    pub image_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub item_location: Option<String>,
}

pub async fn create_donation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateDonationRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty()
        || req.description.trim().is_empty()
        || req.category.trim().is_empty()
        || req.condition.trim().is_empty()
    {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Name, description, category and condition are required.",
        )
            .into_response();
    }

    let donor = match db::donor_for_user(&state.db, &user.id).await {
        Ok(Some(donor)) => donor,
        Ok(None) => {
            return (StatusCode::FORBIDDEN, "Donor profile not found.").into_response();
        }
        Err(e) => {
            tracing::error!("donor lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let new_item = NewItem {
        name: req.name.trim().to_string(),
        description: req.description.trim().to_string(),
        category: req.category.trim().to_string(),
        condition: req.condition.trim().to_string(),
        image_url: req.image_url,
        latitude: req.latitude,
        longitude: req.longitude,
        item_location: req.item_location,
    };

    match db::create_item_with_donation(&state.db, &donor.id, new_item, DateTime::now()).await {
        Ok((item, donation)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": donation.id,
                "item_id": item.id,
                "status": donation.status,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("donation create failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Donor dashboard: own donations joined with items, plus headline counts.
pub async fn my_donations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let donor = match db::donor_for_user(&state.db, &user.id).await {
        Ok(Some(donor)) => donor,
        Ok(None) => {
            return (StatusCode::FORBIDDEN, "Donor profile not found.").into_response();
        }
        Err(e) => {
            tracing::error!("donor lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let result: anyhow::Result<_> = async {
        let donations = db::donations_for_donor(&state.db, &donor.id).await?;
        let details = db::donation_details_for(&state.db, &donations).await?;

        let total = donations.len();
        let available = donations
            .iter()
            .filter(|d| d.status == DonationStatus::Available)
            .count();
        let claimed = donations
            .iter()
            .filter(|d| d.status == DonationStatus::Claimed)
            .count();
        let people_helped = donations
            .iter()
            .filter(|d| {
                matches!(d.status, DonationStatus::Claimed | DonationStatus::Shipped)
            })
            .count();

        Ok(serde_json::json!({
            "donations": details,
            "total_donations": total,
            "available_donations": available,
            "claimed_donations": claimed,
            "people_helped": people_helped,
        }))
    }
    .await;

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            tracing::error!("donor dashboard failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Recipient dashboard: claims plus headline counts.
pub async fn my_claims(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let recipient = match db::recipient_for_user(&state.db, &user.id).await {
        Ok(Some(recipient)) => recipient,
        Ok(None) => {
            return (StatusCode::FORBIDDEN, "Recipient profile not found.").into_response();
        }
        Err(e) => {
            tracing::error!("recipient lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let result: anyhow::Result<_> = async {
        let claims = db::donations_for_recipient(&state.db, &recipient.id).await?;
        let details = db::donation_details_for(&state.db, &claims).await?;
        let total_claimed = details.len();
        let available_items =
            db::count_donations_by_status(&state.db, DonationStatus::Available).await?;
        Ok(serde_json::json!({
            "donations": details,
            "total_claimed": total_claimed,
            "available_items": available_items,
        }))
    }
    .await;

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            tracing::error!("recipient dashboard failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn claim_donation(
    Path(donation_id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let recipient = match db::recipient_for_user(&state.db, &user.id).await {
        Ok(Some(recipient)) => recipient,
        Ok(None) => {
            return (
                StatusCode::FORBIDDEN,
                "You need to be a recipient to claim donations.",
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("recipient lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let donation = match db::donation_by_id(&state.db, &donation_id).await {
        Ok(Some(donation)) => donation,
        Ok(None) => return (StatusCode::NOT_FOUND, "Donation not found.").into_response(),
        Err(e) => {
            tracing::error!("donation lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let won = match db::claim_donation(&state.db, &donation.id, &recipient.id, DateTime::now())
        .await
    {
        Ok(won) => won,
        Err(e) => {
            tracing::error!("claim update failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    if !won {
        // Lost the race (or the donation left `available` some other way).
        return (StatusCode::CONFLICT, "This donation is no longer available.").into_response();
    }

    notify_claim(&state, &donation.item_id, &donation.donor_id, &user).await;

    (StatusCode::OK, "Donation claimed successfully!").into_response()
}

/// Email both ends of a successful claim. Best-effort only; a lookup or
/// send failure must not undo the claim.
async fn notify_claim(state: &AppState, item_id: &str, donor_id: &str, claimer: &AuthenticatedUser) {
    let item_name = match db::item_by_id(&state.db, item_id).await {
        Ok(Some(item)) => item.name,
        Ok(None) => "your item".to_string(),
        Err(e) => {
            tracing::error!("claim notification item lookup failed: {}", e);
            return;
        }
    };

    let donor_user = match db::donor_by_id(&state.db, donor_id).await {
        Ok(Some(donor)) => match db::find_user_by_id(&state.db, &donor.user_id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!("claim notification donor lookup failed: {}", e);
                None
            }
        },
        _ => None,
    };

    if let Some(donor_user) = &donor_user {
        state
            .mailer
            .send(
                &donor_user.email,
                EmailTemplate::DonationClaimedDonor {
                    donor_name: donor_user.name.clone(),
                    recipient_name: claimer.name.clone(),
                    item_name: item_name.clone(),
                },
            )
            .await;
    }

    state
        .mailer
        .send(
            &claimer.email,
            EmailTemplate::DonationClaimedRecipient {
                recipient_name: claimer.name.clone(),
                donor_name: donor_user
                    .map(|u| u.name)
                    .unwrap_or_else(|| "a donor".to_string()),
                item_name,
            },
        )
        .await;
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// Donor-side availability toggle. Claimed and shipped donations are out of
/// reach here; shipping belongs to the admin surface.
pub async fn update_donation_status(
    Path(donation_id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<StatusRequest>,
) -> impl IntoResponse {
    let make_available = match req.status.as_str() {
        "available" => true,
        "unavailable" => false,
        _ => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Status must be either available or unavailable.",
            )
                .into_response();
        }
    };

    let donation = match db::donation_by_id(&state.db, &donation_id).await {
        Ok(Some(donation)) => donation,
        Ok(None) => return (StatusCode::NOT_FOUND, "Donation not found.").into_response(),
        Err(e) => {
            tracing::error!("donation lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    match db::donor_for_user(&state.db, &user.id).await {
        Ok(Some(donor)) if donor.id == donation.donor_id => {}
        Ok(_) => {
            return (
                StatusCode::FORBIDDEN,
                "You can only update your own donations.",
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("donor lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    match db::set_donation_availability(&state.db, &donation.id, make_available).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": donation.id, "status": req.status })),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::CONFLICT,
            "This donation cannot be toggled from its current status.",
        )
            .into_response(),
        Err(e) => {
            tracing::error!("donation status update failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn delete_donation(
    Path(donation_id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let donation = match db::donation_by_id(&state.db, &donation_id).await {
        Ok(Some(donation)) => donation,
        Ok(None) => return (StatusCode::NOT_FOUND, "Donation not found.").into_response(),
        Err(e) => {
            tracing::error!("donation lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let is_owner = match db::donor_for_user(&state.db, &user.id).await {
        Ok(donor) => donor.map(|d| d.id == donation.donor_id).unwrap_or(false),
        Err(e) => {
            tracing::error!("donor lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    if !is_owner && !(user.is_staff || user.is_superuser) {
        return (
            StatusCode::FORBIDDEN,
            "You can only delete your own donations.",
        )
            .into_response();
    }

    match db::delete_donation_cascade(&state.db, &donation.id).await {
        Ok(true) => (StatusCode::OK, "Donation deleted successfully!").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Donation not found.").into_response(),
        Err(e) => {
            tracing::error!("donation delete failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
