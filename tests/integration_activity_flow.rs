use mongodb::bson::DateTime;
use uuid::Uuid;

use hopebridge::db::activities::{JoinOutcome, LeaveOutcome, NewActivity};
use hopebridge::db::models::{ActivityStatus, ParticipationStatus};
use hopebridge::db::{self};

fn test_activity(title: &str, max_participants: i64) -> NewActivity {
    let next_week = chrono::Utc::now() + chrono::Duration::days(7);
    NewActivity {
        title: title.to_string(),
        description: "integration test activity".to_string(),
        category: "community".to_string(),
        location: "Test Park".to_string(),
        latitude: None,
        longitude: None,
        image_url: None,
        activity_date: DateTime::from_chrono(next_week),
        duration_hours: 2,
        max_participants,
        requirements: None,
        contact_info: None,
    }
}

async fn setup_volunteer(database: &db::Db, tag: &str) -> (String, String) {
    let now = DateTime::now();
    let email = format!("volunteer-{}@test.local", tag);
    let user = db::create_user(database, &email, "Test Volunteer", "0501234567", None, "x", now)
        .await
        .expect("create volunteer user");
    db::ensure_volunteer_profile(database, &user.id, now)
        .await
        .expect("volunteer profile");
    let volunteer = db::volunteer_for_user(database, &user.id)
        .await
        .expect("volunteer lookup")
        .expect("volunteer exists");
    (user.id, volunteer.id)
}

#[tokio::test]
async fn capacity_closes_and_reopens_activity() {
    dotenvy::dotenv().ok();
    if std::env::var("MONGODB_URI").is_err() {
        eprintln!("skipping: MONGODB_URI not set");
        return;
    }
    let database = db::connect().await.expect("connect");

    let tag = Uuid::new_v4().to_string();
    let (organizer_user, organizer_id) = setup_volunteer(&database, &format!("org-{}", tag)).await;
    let (joiner_user, joiner_id) = setup_volunteer(&database, &format!("join-{}", tag)).await;

    let activity = db::create_activity(
        &database,
        &organizer_id,
        test_activity("Beach Cleanup", 1),
        DateTime::now(),
    )
    .await
    .expect("create activity");
    assert_eq!(activity.status, ActivityStatus::Available);

    // Joining the last open slot auto-closes the activity.
    let outcome = db::join_activity(&database, &activity.id, &joiner_id, &joiner_user, DateTime::now())
        .await
        .expect("join");
    assert_eq!(outcome, JoinOutcome::Joined);
    assert_eq!(
        db::refresh_activity_status(&database, &activity.id)
            .await
            .expect("refresh"),
        Some(ActivityStatus::Completed)
    );
    assert_eq!(db::count_joined(&database, &activity.id).await.expect("count"), 1);

    // Leaving frees the slot and reopens it.
    let outcome = db::leave_activity(&database, &activity.id, &joiner_id)
        .await
        .expect("leave");
    assert_eq!(outcome, LeaveOutcome::Left);
    assert_eq!(
        db::refresh_activity_status(&database, &activity.id)
            .await
            .expect("refresh"),
        Some(ActivityStatus::Available)
    );

    db::delete_activity_cascade(&database, &activity.id)
        .await
        .expect("cleanup activity");
    db::delete_user_cascade(&database, &organizer_user).await.expect("cleanup organizer");
    db::delete_user_cascade(&database, &joiner_user).await.expect("cleanup joiner");
}

#[tokio::test]
async fn rejoin_reuses_the_single_participation_record() {
    dotenvy::dotenv().ok();
    if std::env::var("MONGODB_URI").is_err() {
        eprintln!("skipping: MONGODB_URI not set");
        return;
    }
    let database = db::connect().await.expect("connect");

    let tag = Uuid::new_v4().to_string();
    let (organizer_user, organizer_id) = setup_volunteer(&database, &format!("org-{}", tag)).await;
    let (joiner_user, joiner_id) = setup_volunteer(&database, &format!("join-{}", tag)).await;

    let activity = db::create_activity(
        &database,
        &organizer_id,
        test_activity("Food Drive", 5),
        DateTime::now(),
    )
    .await
    .expect("create activity");

    // Join, leave, join again: one record, ending joined.
    assert_eq!(
        db::join_activity(&database, &activity.id, &joiner_id, &joiner_user, DateTime::now())
            .await
            .expect("join"),
        JoinOutcome::Joined
    );
    assert_eq!(
        db::leave_activity(&database, &activity.id, &joiner_id)
            .await
            .expect("leave"),
        LeaveOutcome::Left
    );
    assert_eq!(
        db::join_activity(&database, &activity.id, &joiner_id, &joiner_user, DateTime::now())
            .await
            .expect("rejoin"),
        JoinOutcome::Rejoined
    );

    let participations = db::participations_for_volunteer(&database, &joiner_id)
        .await
        .expect("participations");
    let for_activity: Vec<_> = participations
        .iter()
        .filter(|p| p.activity_id == activity.id)
        .collect();
    assert_eq!(for_activity.len(), 1);
    assert_eq!(for_activity[0].status, ParticipationStatus::Joined);

    // A repeat join is a no-op notice.
    assert_eq!(
        db::join_activity(&database, &activity.id, &joiner_id, &joiner_user, DateTime::now())
            .await
            .expect("repeat join"),
        JoinOutcome::AlreadyJoined
    );

    // Deleting the activity removes the participation record with it.
    assert!(db::delete_activity_cascade(&database, &activity.id)
        .await
        .expect("delete activity"));
    assert!(db::participation_for(&database, &activity.id, &joiner_id)
        .await
        .expect("participation lookup")
        .is_none());

    db::delete_user_cascade(&database, &organizer_user).await.expect("cleanup organizer");
    db::delete_user_cascade(&database, &joiner_user).await.expect("cleanup joiner");
}

#[tokio::test]
async fn leaving_without_joining_is_informational() {
    dotenvy::dotenv().ok();
    if std::env::var("MONGODB_URI").is_err() {
        eprintln!("skipping: MONGODB_URI not set");
        return;
    }
    let database = db::connect().await.expect("connect");

    let tag = Uuid::new_v4().to_string();
    let (organizer_user, organizer_id) = setup_volunteer(&database, &format!("org-{}", tag)).await;
    let (other_user, other_id) = setup_volunteer(&database, &format!("other-{}", tag)).await;

    let activity = db::create_activity(
        &database,
        &organizer_id,
        test_activity("Tree Planting", 3),
        DateTime::now(),
    )
    .await
    .expect("create activity");

    assert_eq!(
        db::leave_activity(&database, &activity.id, &other_id)
            .await
            .expect("leave"),
        LeaveOutcome::NotFound
    );

    db::delete_activity_cascade(&database, &activity.id)
        .await
        .expect("cleanup activity");
    db::delete_user_cascade(&database, &organizer_user).await.expect("cleanup organizer");
    db::delete_user_cascade(&database, &other_user).await.expect("cleanup other");
}
