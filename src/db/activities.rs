use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime};
use uuid::Uuid;

use super::models::{Activity, ActivityStatus, ParticipationStatus, VolunteerActivity};
use super::views::{ActivityDetail, ParticipationView, TrendPoint};
use super::{activities_coll, users_coll, volunteer_activities_coll, volunteers_coll, Db};

pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_url: Option<String>,
    pub activity_date: DateTime,
    pub duration_hours: i64,
    pub max_participants: i64,
    pub requirements: Option<String>,
    pub contact_info: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    /// First participation record for this pair.
    Joined,
    /// A previous `left` record flipped back to `joined`.
    Rejoined,
    AlreadyJoined,
    /// Participation already reached a terminal state.
    Terminal,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    NotJoined,
    Terminal,
    NotFound,
}

pub async fn create_activity(
    db: &Db,
    volunteer_id: &str,
    new_activity: NewActivity,
    now: DateTime,
) -> anyhow::Result<Activity> {
    let activity = Activity {
        id: Uuid::new_v4().to_string(),
        title: new_activity.title,
        description: new_activity.description,
        category: new_activity.category,
        location: new_activity.location,
        latitude: new_activity.latitude,
        longitude: new_activity.longitude,
        image_url: new_activity.image_url,
        volunteer_id: volunteer_id.to_string(),
        created_at: now,
        activity_date: new_activity.activity_date,
        duration_hours: new_activity.duration_hours,
        max_participants: new_activity.max_participants.max(1),
        requirements: new_activity.requirements,
        contact_info: new_activity.contact_info,
        status: ActivityStatus::Available,
    };
    activities_coll(db).insert_one(&activity).await?;
    Ok(activity)
}

pub async fn activity_by_id(db: &Db, activity_id: &str) -> anyhow::Result<Option<Activity>> {
    Ok(activities_coll(db)
        .find_one(doc! { "_id": activity_id })
        .await?)
}

/// Upcoming activities only; past ones drop out of the listing.
pub async fn list_upcoming_activities(
    db: &Db,
    category: Option<&str>,
    search: Option<&str>,
    now: DateTime,
) -> anyhow::Result<Vec<Activity>> {
    let mut filter = doc! { "activity_date": { "$gte": now } };
    if let Some(category) = category.filter(|s| !s.is_empty()) {
        filter.insert("category", category);
    }
    if let Some(search) = search.filter(|s| !s.is_empty()) {
        let pattern = regex::escape(search);
        filter.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": &pattern, "$options": "i" } },
                doc! { "description": { "$regex": &pattern, "$options": "i" } },
            ],
        );
    }

    let activities = activities_coll(db)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(activities)
}

/// Admin listing: same filters, no date cutoff.
pub async fn activities_filtered(
    db: &Db,
    category: Option<&str>,
    search: Option<&str>,
) -> anyhow::Result<Vec<Activity>> {
    let mut filter = doc! {};
    if let Some(category) = category.filter(|s| !s.is_empty()) {
        filter.insert("category", category);
    }
    if let Some(search) = search.filter(|s| !s.is_empty()) {
        let pattern = regex::escape(search);
        filter.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": &pattern, "$options": "i" } },
                doc! { "description": { "$regex": &pattern, "$options": "i" } },
            ],
        );
    }

    let activities = activities_coll(db)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(activities)
}

pub async fn activities_for_volunteer(
    db: &Db,
    volunteer_id: &str,
) -> anyhow::Result<Vec<Activity>> {
    let activities = activities_coll(db)
        .find(doc! { "volunteer_id": volunteer_id })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(activities)
}

pub async fn count_joined(db: &Db, activity_id: &str) -> anyhow::Result<u64> {
    Ok(volunteer_activities_coll(db)
        .count_documents(doc! { "activity_id": activity_id, "status": "joined" })
        .await?)
}

pub async fn participation_for(
    db: &Db,
    activity_id: &str,
    volunteer_id: &str,
) -> anyhow::Result<Option<VolunteerActivity>> {
    Ok(volunteer_activities_coll(db)
        .find_one(doc! { "activity_id": activity_id, "volunteer_id": volunteer_id })
        .await?)
}

pub async fn participations_for_volunteer(
    db: &Db,
    volunteer_id: &str,
) -> anyhow::Result<Vec<VolunteerActivity>> {
    let participations = volunteer_activities_coll(db)
        .find(doc! { "volunteer_id": volunteer_id })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(participations)
}

/// Join keeps one record per (activity, volunteer): first joins insert via a
/// conditional upsert, a `left` record transitions back conditionally, and
/// anything else is a no-op or terminal.
pub async fn join_activity(
    db: &Db,
    activity_id: &str,
    volunteer_id: &str,
    participant_id: &str,
    now: DateTime,
) -> anyhow::Result<JoinOutcome> {
    let existing = participation_for(db, activity_id, volunteer_id).await?;

    let Some(participation) = existing else {
        let result = volunteer_activities_coll(db)
            .update_one(
                doc! { "activity_id": activity_id, "volunteer_id": volunteer_id },
                doc! { "$setOnInsert": {
                    "_id": Uuid::new_v4().to_string(),
                    "activity_id": activity_id,
                    "volunteer_id": volunteer_id,
                    "participant_id": participant_id,
                    "status": "joined",
                    "created_at": now,
                }},
            )
            .upsert(true)
            .await?;
        // A concurrent join can slip in between the read and the upsert; in
        // that case the upsert matched the existing record and changed
        // nothing.
        return Ok(if result.upserted_id.is_some() {
            JoinOutcome::Joined
        } else {
            JoinOutcome::AlreadyJoined
        });
    };

    match participation.status {
        ParticipationStatus::Joined => Ok(JoinOutcome::AlreadyJoined),
        ParticipationStatus::Left => {
            let result = volunteer_activities_coll(db)
                .update_one(
                    doc! { "_id": &participation.id, "status": "left" },
                    doc! { "$set": { "status": "joined" } },
                )
                .await?;
            Ok(if result.matched_count == 1 {
                JoinOutcome::Rejoined
            } else {
                JoinOutcome::AlreadyJoined
            })
        }
        ParticipationStatus::Completed | ParticipationStatus::Cancelled => {
            Ok(JoinOutcome::Terminal)
        }
    }
}

/// Leaving is only meaningful from `joined`; completed and cancelled records
/// are terminal.
pub async fn leave_activity(
    db: &Db,
    activity_id: &str,
    volunteer_id: &str,
) -> anyhow::Result<LeaveOutcome> {
    let Some(participation) = participation_for(db, activity_id, volunteer_id).await? else {
        return Ok(LeaveOutcome::NotFound);
    };

    match participation.status {
        ParticipationStatus::Joined => {
            let result = volunteer_activities_coll(db)
                .update_one(
                    doc! { "_id": &participation.id, "status": "joined" },
                    doc! { "$set": { "status": "left" } },
                )
                .await?;
            Ok(if result.matched_count == 1 {
                LeaveOutcome::Left
            } else {
                LeaveOutcome::NotJoined
            })
        }
        ParticipationStatus::Left => Ok(LeaveOutcome::NotJoined),
        ParticipationStatus::Completed | ParticipationStatus::Cancelled => {
            Ok(LeaveOutcome::Terminal)
        }
    }
}

/// The derived-status rule: a full activity closes, a closed one with room
/// again reopens. Cancelled activities are only ever changed explicitly.
pub fn capacity_adjusted_status(
    current: ActivityStatus,
    joined: u64,
    max_participants: i64,
) -> Option<ActivityStatus> {
    let max = max_participants.max(0) as u64;
    match current {
        ActivityStatus::Available if joined >= max => Some(ActivityStatus::Completed),
        ActivityStatus::Completed if joined < max => Some(ActivityStatus::Available),
        _ => None,
    }
}

/// Recompute the joined-count and apply the derived-status rule. Returns the
/// new status when it changed.
pub async fn refresh_activity_status(
    db: &Db,
    activity_id: &str,
) -> anyhow::Result<Option<ActivityStatus>> {
    let Some(activity) = activity_by_id(db, activity_id).await? else {
        return Ok(None);
    };
    let joined = count_joined(db, activity_id).await?;
    let Some(next) = capacity_adjusted_status(activity.status, joined, activity.max_participants)
    else {
        return Ok(None);
    };
    activities_coll(db)
        .update_one(
            doc! { "_id": activity_id },
            doc! { "$set": { "status": next.as_str() } },
        )
        .await?;
    Ok(Some(next))
}

pub async fn set_activity_status(
    db: &Db,
    activity_id: &str,
    status: ActivityStatus,
) -> anyhow::Result<bool> {
    let result = activities_coll(db)
        .update_one(
            doc! { "_id": activity_id },
            doc! { "$set": { "status": status.as_str() } },
        )
        .await?;
    Ok(result.matched_count == 1)
}

/// Deleting an activity removes every participation record with it.
pub async fn delete_activity_cascade(db: &Db, activity_id: &str) -> anyhow::Result<bool> {
    let Some(activity) = activity_by_id(db, activity_id).await? else {
        return Ok(false);
    };
    volunteer_activities_coll(db)
        .delete_many(doc! { "activity_id": &activity.id })
        .await?;
    activities_coll(db)
        .delete_one(doc! { "_id": &activity.id })
        .await?;
    Ok(true)
}

pub async fn activity_detail(
    db: &Db,
    activity: &Activity,
    viewer_volunteer_id: Option<&str>,
) -> anyhow::Result<ActivityDetail> {
    let organizer_user = match volunteers_coll(db)
        .find_one(doc! { "_id": &activity.volunteer_id })
        .await?
    {
        Some(volunteer) => {
            users_coll(db)
                .find_one(doc! { "_id": &volunteer.user_id })
                .await?
        }
        None => None,
    };

    let joined = count_joined(db, &activity.id).await?;
    let user_has_joined = match viewer_volunteer_id {
        Some(volunteer_id) => participation_for(db, &activity.id, volunteer_id)
            .await?
            .map(|p| p.status == ParticipationStatus::Joined)
            .unwrap_or(false),
        None => false,
    };

    Ok(ActivityDetail {
        id: activity.id.clone(),
        title: activity.title.clone(),
        description: activity.description.clone(),
        category: activity.category.clone(),
        location: activity.location.clone(),
        latitude: activity.latitude,
        longitude: activity.longitude,
        image_url: activity.image_url.clone(),
        activity_date: activity.activity_date.to_chrono(),
        duration_hours: activity.duration_hours,
        max_participants: activity.max_participants,
        requirements: activity.requirements.clone(),
        contact_info: activity.contact_info.clone(),
        status: activity.status,
        created_at: activity.created_at.to_chrono(),
        organizer_name: organizer_user
            .as_ref()
            .map(|u| u.name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        organizer_email: organizer_user
            .map(|u| u.email)
            .unwrap_or_else(|| "Unknown".to_string()),
        joined_participants: joined,
        user_has_joined,
    })
}

pub async fn activity_details_for(
    db: &Db,
    activities: &[Activity],
    viewer_volunteer_id: Option<&str>,
) -> anyhow::Result<Vec<ActivityDetail>> {
    let mut details = Vec::with_capacity(activities.len());
    for activity in activities {
        details.push(activity_detail(db, activity, viewer_volunteer_id).await?);
    }
    Ok(details)
}

pub async fn participation_views_for(
    db: &Db,
    participations: &[VolunteerActivity],
) -> anyhow::Result<Vec<ParticipationView>> {
    let mut views = Vec::with_capacity(participations.len());
    for participation in participations {
        let title = activity_by_id(db, &participation.activity_id)
            .await?
            .map(|a| a.title)
            .unwrap_or_else(|| "Unknown".to_string());
        views.push(ParticipationView {
            id: participation.id.clone(),
            activity_id: participation.activity_id.clone(),
            activity_title: title,
            status: participation.status,
            notes: participation.notes.clone(),
            created_at: participation.created_at.to_chrono(),
        });
    }
    Ok(views)
}

pub async fn recent_activities(db: &Db, limit: i64) -> anyhow::Result<Vec<Activity>> {
    let activities = activities_coll(db)
        .find(doc! {})
        .sort(doc! { "created_at": -1 })
        .limit(limit)
        .await?
        .try_collect()
        .await?;
    Ok(activities)
}

pub async fn count_activities(db: &Db) -> anyhow::Result<u64> {
    Ok(activities_coll(db).count_documents(doc! {}).await?)
}

pub async fn count_participations_by_status(
    db: &Db,
    status: ParticipationStatus,
) -> anyhow::Result<u64> {
    Ok(volunteer_activities_coll(db)
        .count_documents(doc! { "status": status.as_str() })
        .await?)
}

pub async fn count_participations_for_volunteer(
    db: &Db,
    volunteer_id: &str,
    status: Option<ParticipationStatus>,
) -> anyhow::Result<u64> {
    let mut filter = doc! { "volunteer_id": volunteer_id };
    if let Some(status) = status {
        filter.insert("status", status.as_str());
    }
    Ok(volunteer_activities_coll(db)
        .count_documents(filter)
        .await?)
}

pub async fn distinct_activity_categories(db: &Db) -> anyhow::Result<Vec<String>> {
    let values = activities_coll(db).distinct("category", doc! {}).await?;
    Ok(super::donations::bson_strings(values))
}

/// One bucket per calendar day, oldest first, so today sits at the end of
/// the series.
pub async fn trend_points(
    db: &Db,
    days: i64,
    now: chrono::DateTime<chrono::Utc>,
) -> anyhow::Result<Vec<TrendPoint>> {
    let mut points = Vec::with_capacity(days.max(0) as usize);
    for offset in (0..days).rev() {
        let day = now.date_naive() - chrono::Duration::days(offset);
        let start = day.and_hms_opt(0, 0, 0).expect("midnight exists").and_utc();
        let end = start + chrono::Duration::days(1);
        let (start, end) = (DateTime::from_chrono(start), DateTime::from_chrono(end));

        let created = activities_coll(db)
            .count_documents(doc! { "created_at": { "$gte": start, "$lt": end } })
            .await?;
        let completed = volunteer_activities_coll(db)
            .count_documents(doc! {
                "status": "completed",
                "created_at": { "$gte": start, "$lt": end },
            })
            .await?;

        points.push(TrendPoint {
            date: day.format("%Y-%m-%d").to_string(),
            activities_created: created,
            activities_completed: completed,
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::capacity_adjusted_status;
    use crate::db::models::ActivityStatus;

    #[test]
    fn full_available_activity_closes() {
        assert_eq!(
            capacity_adjusted_status(ActivityStatus::Available, 3, 3),
            Some(ActivityStatus::Completed)
        );
        assert_eq!(
            capacity_adjusted_status(ActivityStatus::Available, 5, 3),
            Some(ActivityStatus::Completed)
        );
    }

    #[test]
    fn closed_activity_with_room_reopens() {
        assert_eq!(
            capacity_adjusted_status(ActivityStatus::Completed, 2, 3),
            Some(ActivityStatus::Available)
        );
    }

    #[test]
    fn no_change_when_within_capacity_or_cancelled() {
        assert_eq!(capacity_adjusted_status(ActivityStatus::Available, 1, 3), None);
        assert_eq!(capacity_adjusted_status(ActivityStatus::Completed, 3, 3), None);
        assert_eq!(capacity_adjusted_status(ActivityStatus::Cancelled, 0, 3), None);
    }
}
