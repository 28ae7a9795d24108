use mongodb::bson::DateTime;
use uuid::Uuid;

use hopebridge::db::models::DonationStatus;
use hopebridge::db::{self, NewItem};

fn test_item(name: &str) -> NewItem {
    NewItem {
        name: name.to_string(),
        description: "cascade test item".to_string(),
        category: "furniture".to_string(),
        condition: "fair".to_string(),
        image_url: None,
        latitude: None,
        longitude: None,
        item_location: None,
    }
}

#[tokio::test]
async fn deleting_recipient_releases_claims_and_deleting_donor_removes_catalog() {
    dotenvy::dotenv().ok();
    if std::env::var("MONGODB_URI").is_err() {
        eprintln!("skipping: MONGODB_URI not set");
        return;
    }
    let database = db::connect().await.expect("connect");
    let now = DateTime::now();
    let tag = Uuid::new_v4().to_string();

    let donor_user = db::create_user(
        &database,
        &format!("cascade-donor-{}@test.local", tag),
        "Cascade Donor",
        "0501234567",
        None,
        "x",
        now,
    )
    .await
    .expect("create donor user");
    db::ensure_donor_profile(&database, &donor_user.id, now)
        .await
        .expect("donor profile");
    let donor = db::donor_for_user(&database, &donor_user.id)
        .await
        .expect("donor lookup")
        .expect("donor exists");

    let recipient_user = db::create_user(
        &database,
        &format!("cascade-recipient-{}@test.local", tag),
        "Cascade Recipient",
        "0501234567",
        None,
        "x",
        now,
    )
    .await
    .expect("create recipient user");
    db::ensure_recipient_profile(&database, &recipient_user.id, "2 Test St", now)
        .await
        .expect("recipient profile");
    let recipient = db::recipient_for_user(&database, &recipient_user.id)
        .await
        .expect("recipient lookup")
        .expect("recipient exists");

    let (item, donation) =
        db::create_item_with_donation(&database, &donor.id, test_item("Armchair"), now)
            .await
            .expect("create donation");
    assert!(db::claim_donation(&database, &donation.id, &recipient.id, now)
        .await
        .expect("claim"));

    // Deleting the recipient releases the claim instead of deleting the
    // donation.
    assert!(db::delete_user_cascade(&database, &recipient_user.id)
        .await
        .expect("delete recipient"));
    let released = db::donation_by_id(&database, &donation.id)
        .await
        .expect("reload")
        .expect("donation still exists");
    assert_eq!(released.status, DonationStatus::Available);
    assert!(released.recipient_id.is_none());
    assert!(db::recipient_for_user(&database, &recipient_user.id)
        .await
        .expect("profile lookup")
        .is_none());

    // Deleting the donor removes the whole catalog side.
    assert!(db::delete_user_cascade(&database, &donor_user.id)
        .await
        .expect("delete donor"));
    assert!(db::donation_by_id(&database, &donation.id)
        .await
        .expect("donation lookup")
        .is_none());
    assert!(db::item_by_id(&database, &item.id)
        .await
        .expect("item lookup")
        .is_none());
    assert!(db::find_user_by_id(&database, &donor_user.id)
        .await
        .expect("user lookup")
        .is_none());
}

#[tokio::test]
async fn deleting_shipped_claims_keeps_history_but_drops_the_reference() {
    dotenvy::dotenv().ok();
    if std::env::var("MONGODB_URI").is_err() {
        eprintln!("skipping: MONGODB_URI not set");
        return;
    }
    let database = db::connect().await.expect("connect");
    let now = DateTime::now();
    let tag = Uuid::new_v4().to_string();

    let donor_user = db::create_user(
        &database,
        &format!("ship-donor-{}@test.local", tag),
        "Ship Donor",
        "0501234567",
        None,
        "x",
        now,
    )
    .await
    .expect("create donor user");
    db::ensure_donor_profile(&database, &donor_user.id, now)
        .await
        .expect("donor profile");
    let donor = db::donor_for_user(&database, &donor_user.id)
        .await
        .expect("donor lookup")
        .expect("donor exists");

    let recipient_user = db::create_user(
        &database,
        &format!("ship-recipient-{}@test.local", tag),
        "Ship Recipient",
        "0501234567",
        None,
        "x",
        now,
    )
    .await
    .expect("create recipient user");
    db::ensure_recipient_profile(&database, &recipient_user.id, "3 Test St", now)
        .await
        .expect("recipient profile");
    let recipient = db::recipient_for_user(&database, &recipient_user.id)
        .await
        .expect("recipient lookup")
        .expect("recipient exists");

    let (_item, donation) =
        db::create_item_with_donation(&database, &donor.id, test_item("Crockery Set"), now)
            .await
            .expect("create donation");
    assert!(db::claim_donation(&database, &donation.id, &recipient.id, now)
        .await
        .expect("claim"));
    assert!(db::ship_donation(&database, &donation.id).await.expect("ship"));

    assert!(db::delete_user_cascade(&database, &recipient_user.id)
        .await
        .expect("delete recipient"));
    let shipped = db::donation_by_id(&database, &donation.id)
        .await
        .expect("reload")
        .expect("donation still exists");
    assert_eq!(shipped.status, DonationStatus::Shipped);
    assert!(shipped.recipient_id.is_none());

    db::delete_user_cascade(&database, &donor_user.id)
        .await
        .expect("cleanup donor");
}
