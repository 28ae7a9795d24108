use mongodb::bson::DateTime;
use uuid::Uuid;

use hopebridge::db::{self, models::DonationStatus, NewItem};

fn test_item(name: &str) -> NewItem {
    NewItem {
        name: name.to_string(),
        description: "integration test item".to_string(),
        category: "clothing".to_string(),
        condition: "good".to_string(),
        image_url: None,
        latitude: None,
        longitude: None,
        item_location: None,
    }
}

async fn setup_donor(database: &db::Db, tag: &str) -> (String, String) {
    let now = DateTime::now();
    let email = format!("donor-{}@test.local", tag);
    let user = db::create_user(database, &email, "Test Donor", "0501234567", None, "x", now)
        .await
        .expect("create donor user");
    db::ensure_donor_profile(database, &user.id, now)
        .await
        .expect("donor profile");
    let donor = db::donor_for_user(database, &user.id)
        .await
        .expect("donor lookup")
        .expect("donor exists");
    (user.id, donor.id)
}

async fn setup_recipient(database: &db::Db, tag: &str) -> (String, String) {
    let now = DateTime::now();
    let email = format!("recipient-{}@test.local", tag);
    let user = db::create_user(database, &email, "Test Recipient", "0501234567", None, "x", now)
        .await
        .expect("create recipient user");
    db::ensure_recipient_profile(database, &user.id, "1 Test St", now)
        .await
        .expect("recipient profile");
    let recipient = db::recipient_for_user(database, &user.id)
        .await
        .expect("recipient lookup")
        .expect("recipient exists");
    (user.id, recipient.id)
}

#[tokio::test]
async fn donation_lifecycle_claim_ship_delete() {
    dotenvy::dotenv().ok();
    if std::env::var("MONGODB_URI").is_err() {
        eprintln!("skipping: MONGODB_URI not set");
        return;
    }
    let database = db::connect().await.expect("connect");

    let tag = Uuid::new_v4().to_string();
    let (donor_user, donor_id) = setup_donor(&database, &tag).await;
    let (recipient_user, recipient_id) = setup_recipient(&database, &tag).await;

    // Create: the donation starts available with no recipient.
    let (item, donation) =
        db::create_item_with_donation(&database, &donor_id, test_item("Winter Coat"), DateTime::now())
            .await
            .expect("create donation");
    assert_eq!(donation.status, DonationStatus::Available);
    assert!(donation.recipient_id.is_none());

    // Claim: status moves to claimed and the recipient is recorded.
    let won = db::claim_donation(&database, &donation.id, &recipient_id, DateTime::now())
        .await
        .expect("claim");
    assert!(won, "first claim should win");
    let claimed = db::donation_by_id(&database, &donation.id)
        .await
        .expect("reload")
        .expect("donation exists");
    assert_eq!(claimed.status, DonationStatus::Claimed);
    assert_eq!(claimed.recipient_id.as_deref(), Some(recipient_id.as_str()));
    assert!(claimed.claimed_at.is_some());

    // A second claim observes "no longer available".
    let again = db::claim_donation(&database, &donation.id, &recipient_id, DateTime::now())
        .await
        .expect("second claim");
    assert!(!again);

    // Ship only succeeds from claimed, and only once.
    assert!(db::ship_donation(&database, &donation.id).await.expect("ship"));
    assert!(!db::ship_donation(&database, &donation.id).await.expect("re-ship"));
    let shipped = db::donation_by_id(&database, &donation.id)
        .await
        .expect("reload")
        .expect("donation exists");
    assert_eq!(shipped.status, DonationStatus::Shipped);

    // Delete cascades to the item.
    assert!(db::delete_donation_cascade(&database, &donation.id)
        .await
        .expect("delete"));
    assert!(db::item_by_id(&database, &item.id)
        .await
        .expect("item lookup")
        .is_none());

    db::delete_user_cascade(&database, &donor_user).await.expect("cleanup donor");
    db::delete_user_cascade(&database, &recipient_user)
        .await
        .expect("cleanup recipient");
}

#[tokio::test]
async fn concurrent_claims_have_one_winner() {
    dotenvy::dotenv().ok();
    if std::env::var("MONGODB_URI").is_err() {
        eprintln!("skipping: MONGODB_URI not set");
        return;
    }
    let database = db::connect().await.expect("connect");

    let tag = Uuid::new_v4().to_string();
    let (donor_user, donor_id) = setup_donor(&database, &tag).await;
    let (recipient_a_user, recipient_a) = setup_recipient(&database, &format!("a-{}", tag)).await;
    let (recipient_b_user, recipient_b) = setup_recipient(&database, &format!("b-{}", tag)).await;

    let (_item, donation) =
        db::create_item_with_donation(&database, &donor_id, test_item("Desk Lamp"), DateTime::now())
            .await
            .expect("create donation");

    let (won_a, won_b) = tokio::join!(
        db::claim_donation(&database, &donation.id, &recipient_a, DateTime::now()),
        db::claim_donation(&database, &donation.id, &recipient_b, DateTime::now()),
    );
    let won_a = won_a.expect("claim a");
    let won_b = won_b.expect("claim b");
    assert!(won_a ^ won_b, "exactly one concurrent claim must win");

    let claimed = db::donation_by_id(&database, &donation.id)
        .await
        .expect("reload")
        .expect("donation exists");
    assert_eq!(claimed.status, DonationStatus::Claimed);
    let winner = if won_a { &recipient_a } else { &recipient_b };
    assert_eq!(claimed.recipient_id.as_deref(), Some(winner.as_str()));

    db::delete_user_cascade(&database, &donor_user).await.expect("cleanup donor");
    db::delete_user_cascade(&database, &recipient_a_user).await.expect("cleanup a");
    db::delete_user_cascade(&database, &recipient_b_user).await.expect("cleanup b");
}

#[tokio::test]
async fn donor_toggle_is_conditional_on_current_status() {
    dotenvy::dotenv().ok();
    if std::env::var("MONGODB_URI").is_err() {
        eprintln!("skipping: MONGODB_URI not set");
        return;
    }
    let database = db::connect().await.expect("connect");

    let tag = Uuid::new_v4().to_string();
    let (donor_user, donor_id) = setup_donor(&database, &tag).await;
    let (recipient_user, recipient_id) = setup_recipient(&database, &tag).await;

    let (_item, donation) =
        db::create_item_with_donation(&database, &donor_id, test_item("Bookshelf"), DateTime::now())
            .await
            .expect("create donation");

    // available -> unavailable -> available works; repeating a direction
    // does not match.
    assert!(db::set_donation_availability(&database, &donation.id, false)
        .await
        .expect("to unavailable"));
    assert!(!db::set_donation_availability(&database, &donation.id, false)
        .await
        .expect("repeat to unavailable"));
    assert!(db::set_donation_availability(&database, &donation.id, true)
        .await
        .expect("back to available"));

    // Once claimed, the donor-side toggle can no longer touch it.
    assert!(db::claim_donation(&database, &donation.id, &recipient_id, DateTime::now())
        .await
        .expect("claim"));
    assert!(!db::set_donation_availability(&database, &donation.id, false)
        .await
        .expect("toggle claimed"));
    assert!(!db::set_donation_availability(&database, &donation.id, true)
        .await
        .expect("release claimed"));

    db::delete_user_cascade(&database, &donor_user).await.expect("cleanup donor");
    db::delete_user_cascade(&database, &recipient_user)
        .await
        .expect("cleanup recipient");
}
