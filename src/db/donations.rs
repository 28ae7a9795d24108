use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, DateTime};
use uuid::Uuid;

use super::models::{Donation, DonationStatus, Item};
use super::views::{CategoryStats, DonationCounts, DonationDetail, ItemSummary, LeaderboardEntry};
use super::{donations_coll, donors_coll, items_coll, recipients_coll, users_coll, Db};

pub struct NewItem {
    pub name: String,
    pub description: String,
    pub category: String,
    pub condition: String,
    pub image_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub item_location: Option<String>,
}

/// Create the item and its donation together. The donation starts
/// `available`; if its insert fails the item is removed so no orphan is
/// left behind.
pub async fn create_item_with_donation(
    db: &Db,
    donor_id: &str,
    new_item: NewItem,
    now: DateTime,
) -> anyhow::Result<(Item, Donation)> {
    let item = Item {
        id: Uuid::new_v4().to_string(),
        name: new_item.name,
        description: new_item.description,
        category: new_item.category,
        condition: new_item.condition,
        image_url: new_item.image_url,
        donor_id: donor_id.to_string(),
        latitude: new_item.latitude,
        longitude: new_item.longitude,
        item_location: new_item.item_location,
        created_at: now,
    };
    items_coll(db).insert_one(&item).await?;

    let donation = Donation {
        id: Uuid::new_v4().to_string(),
        item_id: item.id.clone(),
        donor_id: donor_id.to_string(),
        recipient_id: None,
        status: DonationStatus::Available,
        created_at: now,
        claimed_at: None,
    };
    if let Err(e) = donations_coll(db).insert_one(&donation).await {
        let _ = items_coll(db).delete_one(doc! { "_id": &item.id }).await;
        return Err(e.into());
    }

    Ok((item, donation))
}

pub async fn donation_by_id(db: &Db, donation_id: &str) -> anyhow::Result<Option<Donation>> {
    Ok(donations_coll(db)
        .find_one(doc! { "_id": donation_id })
        .await?)
}

pub async fn item_by_id(db: &Db, item_id: &str) -> anyhow::Result<Option<Item>> {
    Ok(items_coll(db).find_one(doc! { "_id": item_id }).await?)
}

/// The claim compare-and-swap. The filter pins the current status, so of two
/// concurrent claims exactly one matches; the loser sees `false` and reports
/// "no longer available".
pub async fn claim_donation(
    db: &Db,
    donation_id: &str,
    recipient_id: &str,
    now: DateTime,
) -> anyhow::Result<bool> {
    let result = donations_coll(db)
        .update_one(
            doc! { "_id": donation_id, "status": "available" },
            doc! { "$set": {
                "status": "claimed",
                "recipient_id": recipient_id,
                "claimed_at": now,
            }},
        )
        .await?;
    Ok(result.matched_count == 1)
}

/// Donor-side toggle between available and unavailable. Both directions are
/// conditional on the current status so claimed/shipped donations are
/// untouchable here, and returning to available always clears the recipient
/// reference.
pub async fn set_donation_availability(
    db: &Db,
    donation_id: &str,
    make_available: bool,
) -> anyhow::Result<bool> {
    let result = if make_available {
        donations_coll(db)
            .update_one(
                doc! { "_id": donation_id, "status": "unavailable" },
                doc! {
                    "$set": { "status": "available" },
                    "$unset": { "recipient_id": "", "claimed_at": "" },
                },
            )
            .await?
    } else {
        donations_coll(db)
            .update_one(
                doc! { "_id": donation_id, "status": "available" },
                doc! { "$set": { "status": "unavailable" } },
            )
            .await?
    };
    Ok(result.matched_count == 1)
}

/// Staff transition claimed -> shipped; no other source state matches.
pub async fn ship_donation(db: &Db, donation_id: &str) -> anyhow::Result<bool> {
    let result = donations_coll(db)
        .update_one(
            doc! { "_id": donation_id, "status": "claimed" },
            doc! { "$set": { "status": "shipped" } },
        )
        .await?;
    Ok(result.matched_count == 1)
}

/// Deleting a donation takes its item with it.
pub async fn delete_donation_cascade(db: &Db, donation_id: &str) -> anyhow::Result<bool> {
    let Some(donation) = donation_by_id(db, donation_id).await? else {
        return Ok(false);
    };
    items_coll(db)
        .delete_one(doc! { "_id": &donation.item_id })
        .await?;
    donations_coll(db)
        .delete_one(doc! { "_id": &donation.id })
        .await?;
    Ok(true)
}

pub async fn donations_for_donor(db: &Db, donor_id: &str) -> anyhow::Result<Vec<Donation>> {
    let donations = donations_coll(db)
        .find(doc! { "donor_id": donor_id })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(donations)
}

pub async fn donations_for_recipient(db: &Db, recipient_id: &str) -> anyhow::Result<Vec<Donation>> {
    let donations = donations_coll(db)
        .find(doc! { "recipient_id": recipient_id })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(donations)
}

pub async fn items_for_donor(db: &Db, donor_id: &str) -> anyhow::Result<Vec<Item>> {
    let items = items_coll(db)
        .find(doc! { "donor_id": donor_id })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(items)
}

/// Join one donation with its item and both parties' display fields.
/// Donations whose item has vanished are skipped by the callers.
pub async fn donation_detail(
    db: &Db,
    donation: &Donation,
) -> anyhow::Result<Option<DonationDetail>> {
    let Some(item) = item_by_id(db, &donation.item_id).await? else {
        return Ok(None);
    };

    let donor_user = match donors_coll(db)
        .find_one(doc! { "_id": &donation.donor_id })
        .await?
    {
        Some(donor) => {
            users_coll(db)
                .find_one(doc! { "_id": &donor.user_id })
                .await?
        }
        None => None,
    };

    let recipient_user = match &donation.recipient_id {
        Some(recipient_id) => {
            match recipients_coll(db)
                .find_one(doc! { "_id": recipient_id })
                .await?
            {
                Some(recipient) => {
                    users_coll(db)
                        .find_one(doc! { "_id": &recipient.user_id })
                        .await?
                }
                None => None,
            }
        }
        None => None,
    };

    Ok(Some(DonationDetail {
        id: donation.id.clone(),
        status: donation.status,
        created_at: donation.created_at.to_chrono(),
        claimed_at: donation.claimed_at.map(|t| t.to_chrono()),
        item: ItemSummary::from(&item),
        donor_name: donor_user
            .as_ref()
            .map(|u| u.name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        donor_email: donor_user
            .as_ref()
            .map(|u| u.email.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        recipient_name: recipient_user.as_ref().map(|u| u.name.clone()),
        recipient_email: recipient_user.map(|u| u.email),
    }))
}

pub async fn donation_details_for(
    db: &Db,
    donations: &[Donation],
) -> anyhow::Result<Vec<DonationDetail>> {
    let mut details = Vec::with_capacity(donations.len());
    for donation in donations {
        if let Some(detail) = donation_detail(db, donation).await? {
            details.push(detail);
        }
    }
    Ok(details)
}

/// Public browse: available donations joined with their items, filtered by
/// category/condition and a case-insensitive search over item name and
/// description.
pub async fn browse_available_donations(
    db: &Db,
    category: Option<&str>,
    condition: Option<&str>,
    search: Option<&str>,
) -> anyhow::Result<Vec<DonationDetail>> {
    let donations: Vec<Donation> = donations_coll(db)
        .find(doc! { "status": "available" })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    let mut details = donation_details_for(db, &donations).await?;
    if let Some(category) = category.filter(|s| !s.is_empty()) {
        details.retain(|d| d.item.category == category);
    }
    if let Some(condition) = condition.filter(|s| !s.is_empty()) {
        details.retain(|d| d.item.condition == condition);
    }
    if let Some(search) = search.filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        details.retain(|d| {
            d.item.name.to_lowercase().contains(&needle)
                || d.item.description.to_lowercase().contains(&needle)
        });
    }
    Ok(details)
}

/// Admin listing: optional status filter pushed to the store, category and
/// search applied over the joined view.
pub async fn donations_filtered(
    db: &Db,
    status: Option<DonationStatus>,
    category: Option<&str>,
    search: Option<&str>,
) -> anyhow::Result<Vec<DonationDetail>> {
    let mut filter = doc! {};
    if let Some(status) = status {
        filter.insert("status", status.as_str());
    }
    let donations: Vec<Donation> = donations_coll(db)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    let mut details = donation_details_for(db, &donations).await?;
    if let Some(category) = category.filter(|s| !s.is_empty()) {
        details.retain(|d| d.item.category == category);
    }
    if let Some(search) = search.filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        details.retain(|d| {
            d.item.name.to_lowercase().contains(&needle)
                || d.item.description.to_lowercase().contains(&needle)
        });
    }
    Ok(details)
}

pub async fn recent_donations(db: &Db, limit: i64) -> anyhow::Result<Vec<DonationDetail>> {
    let donations: Vec<Donation> = donations_coll(db)
        .find(doc! {})
        .sort(doc! { "created_at": -1 })
        .limit(limit)
        .await?
        .try_collect()
        .await?;
    donation_details_for(db, &donations).await
}

pub async fn count_donations(db: &Db) -> anyhow::Result<u64> {
    Ok(donations_coll(db).count_documents(doc! {}).await?)
}

pub async fn count_donations_by_status(db: &Db, status: DonationStatus) -> anyhow::Result<u64> {
    Ok(donations_coll(db)
        .count_documents(doc! { "status": status.as_str() })
        .await?)
}

pub async fn count_donations_since(db: &Db, since: DateTime) -> anyhow::Result<u64> {
    Ok(donations_coll(db)
        .count_documents(doc! { "created_at": { "$gte": since } })
        .await?)
}

pub async fn donation_counts(db: &Db) -> anyhow::Result<DonationCounts> {
    Ok(DonationCounts {
        total: count_donations(db).await?,
        available: count_donations_by_status(db, DonationStatus::Available).await?,
        claimed: count_donations_by_status(db, DonationStatus::Claimed).await?,
        shipped: count_donations_by_status(db, DonationStatus::Shipped).await?,
        unavailable: count_donations_by_status(db, DonationStatus::Unavailable).await?,
    })
}

pub async fn count_donations_by_donor(db: &Db, donor_id: &str) -> anyhow::Result<u64> {
    Ok(donations_coll(db)
        .count_documents(doc! { "donor_id": donor_id })
        .await?)
}

pub async fn count_donations_by_recipient(db: &Db, recipient_id: &str) -> anyhow::Result<u64> {
    Ok(donations_coll(db)
        .count_documents(doc! { "recipient_id": recipient_id })
        .await?)
}

pub async fn distinct_item_categories(db: &Db) -> anyhow::Result<Vec<String>> {
    let values = items_coll(db).distinct("category", doc! {}).await?;
    Ok(bson_strings(values))
}

pub async fn distinct_item_conditions(db: &Db) -> anyhow::Result<Vec<String>> {
    let values = items_coll(db).distinct("condition", doc! {}).await?;
    Ok(bson_strings(values))
}

pub(crate) fn bson_strings(values: Vec<Bson>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Per-category status breakdown, resolved through the items that carry the
/// category.
pub async fn category_donation_stats(db: &Db, category: &str) -> anyhow::Result<CategoryStats> {
    let item_ids: Vec<String> = items_coll(db)
        .find(doc! { "category": category })
        .await?
        .try_collect::<Vec<_>>()
        .await?
        .into_iter()
        .map(|item| item.id)
        .collect();

    let count_with_status = |status: Option<&'static str>| {
        let mut filter = doc! { "item_id": { "$in": item_ids.clone() } };
        if let Some(status) = status {
            filter.insert("status", status);
        }
        async move { donations_coll(db).count_documents(filter).await }
    };

    Ok(CategoryStats {
        category: category.to_string(),
        total_count: count_with_status(None).await?,
        available_count: count_with_status(Some("available")).await?,
        claimed_count: count_with_status(Some("claimed")).await?,
        shipped_count: count_with_status(Some("shipped")).await?,
    })
}

/// Leaderboard by full scan and in-memory sort; no materialized counters.
pub async fn top_donors(db: &Db, limit: usize) -> anyhow::Result<Vec<LeaderboardEntry>> {
    let donors = donors_coll(db)
        .find(doc! {})
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    let mut entries = Vec::new();
    for donor in donors {
        let count = count_donations_by_donor(db, &donor.id).await?;
        if count == 0 {
            continue;
        }
        if let Some(user) = users_coll(db)
            .find_one(doc! { "_id": &donor.user_id })
            .await?
        {
            entries.push(LeaderboardEntry {
                user_id: user.id,
                name: user.name,
                email: user.email,
                count,
            });
        }
    }
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(limit);
    Ok(entries)
}

pub async fn top_recipients(db: &Db, limit: usize) -> anyhow::Result<Vec<LeaderboardEntry>> {
    let recipients = recipients_coll(db)
        .find(doc! {})
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    let mut entries = Vec::new();
    for recipient in recipients {
        let count = count_donations_by_recipient(db, &recipient.id).await?;
        if count == 0 {
            continue;
        }
        if let Some(user) = users_coll(db)
            .find_one(doc! { "_id": &recipient.user_id })
            .await?
        {
            entries.push(LeaderboardEntry {
                user_id: user.id,
                name: user.name,
                email: user.email,
                count,
            });
        }
    }
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(limit);
    Ok(entries)
}
