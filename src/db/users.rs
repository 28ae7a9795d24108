use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime};
use uuid::Uuid;

use super::models::{Address, Donor, Recipient, User, Volunteer};
use super::views::UserWithRoles;
use super::{
    activities, activities_coll, donations_coll, donors_coll, items_coll, recipients_coll,
    users_coll, volunteer_activities_coll, volunteers_coll, Db,
};

pub async fn find_user_by_email(db: &Db, email: &str) -> anyhow::Result<Option<User>> {
    Ok(users_coll(db).find_one(doc! { "email": email }).await?)
}

pub async fn find_user_by_id(db: &Db, user_id: &str) -> anyhow::Result<Option<User>> {
    Ok(users_coll(db).find_one(doc! { "_id": user_id }).await?)
}

pub async fn create_user(
    db: &Db,
    email: &str,
    name: &str,
    phone: &str,
    address: Option<Address>,
    password_hash: &str,
    now: DateTime,
) -> anyhow::Result<User> {
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        name: name.to_string(),
        phone: phone.to_string(),
        address,
        password_hash: password_hash.to_string(),
        is_active: true,
        is_staff: false,
        is_superuser: false,
        date_joined: now,
        last_login: None,
        email_verified: false,
        verification_code: None,
        verification_code_created_at: None,
    };
    users_coll(db).insert_one(&user).await?;
    Ok(user)
}

pub async fn record_login(db: &Db, user_id: &str, now: DateTime) -> anyhow::Result<()> {
    users_coll(db)
        .update_one(doc! { "_id": user_id }, doc! { "$set": { "last_login": now } })
        .await?;
    Ok(())
}

pub async fn set_verification_code(
    db: &Db,
    user_id: &str,
    code: &str,
    now: DateTime,
) -> anyhow::Result<()> {
    users_coll(db)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": {
                "verification_code": code,
                "verification_code_created_at": now,
            }},
        )
        .await?;
    Ok(())
}

pub async fn mark_email_verified(db: &Db, user_id: &str) -> anyhow::Result<()> {
    users_coll(db)
        .update_one(
            doc! { "_id": user_id },
            doc! {
                "$set": { "email_verified": true },
                "$unset": { "verification_code": "", "verification_code_created_at": "" },
            },
        )
        .await?;
    Ok(())
}

pub async fn clear_verification_code(db: &Db, user_id: &str) -> anyhow::Result<()> {
    users_coll(db)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$unset": { "verification_code": "", "verification_code_created_at": "" } },
        )
        .await?;
    Ok(())
}

pub async fn update_password(db: &Db, user_id: &str, password_hash: &str) -> anyhow::Result<()> {
    users_coll(db)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "password_hash": password_hash } },
        )
        .await?;
    Ok(())
}

pub async fn update_profile(
    db: &Db,
    user_id: &str,
    name: &str,
    phone: &str,
    address: Option<Address>,
) -> anyhow::Result<bool> {
    let mut set = doc! { "name": name, "phone": phone };
    if let Some(address) = address {
        set.insert("address", mongodb::bson::to_bson(&address)?);
    }
    let result = users_coll(db)
        .update_one(doc! { "_id": user_id }, doc! { "$set": set })
        .await?;
    Ok(result.matched_count == 1)
}

pub async fn set_admin_flags(db: &Db, user_id: &str) -> anyhow::Result<()> {
    users_coll(db)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "is_staff": true, "is_superuser": true } },
        )
        .await?;
    Ok(())
}

/// Flip the active flag; returns the new state, or None when the user is
/// missing.
pub async fn toggle_user_active(db: &Db, user_id: &str) -> anyhow::Result<Option<bool>> {
    let Some(user) = find_user_by_id(db, user_id).await? else {
        return Ok(None);
    };
    let next = !user.is_active;
    users_coll(db)
        .update_one(doc! { "_id": user_id }, doc! { "$set": { "is_active": next } })
        .await?;
    Ok(Some(next))
}

pub async fn list_users_filtered(
    db: &Db,
    search: Option<&str>,
    active: Option<bool>,
) -> anyhow::Result<Vec<User>> {
    let mut filter = doc! {};
    if let Some(search) = search.filter(|s| !s.is_empty()) {
        let pattern = regex::escape(search);
        filter.insert(
            "$or",
            vec![
                doc! { "name": { "$regex": &pattern, "$options": "i" } },
                doc! { "email": { "$regex": &pattern, "$options": "i" } },
            ],
        );
    }
    if let Some(active) = active {
        filter.insert("is_active", active);
    }

    let users = users_coll(db)
        .find(filter)
        .sort(doc! { "date_joined": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(users)
}

pub async fn count_users(db: &Db) -> anyhow::Result<u64> {
    Ok(users_coll(db).count_documents(doc! {}).await?)
}

pub async fn count_users_by_active(db: &Db, active: bool) -> anyhow::Result<u64> {
    Ok(users_coll(db)
        .count_documents(doc! { "is_active": active })
        .await?)
}

pub async fn count_users_joined_since(db: &Db, since: DateTime) -> anyhow::Result<u64> {
    Ok(users_coll(db)
        .count_documents(doc! { "date_joined": { "$gte": since } })
        .await?)
}

pub async fn recent_users(db: &Db, limit: i64) -> anyhow::Result<Vec<User>> {
    let users = users_coll(db)
        .find(doc! {})
        .sort(doc! { "date_joined": -1 })
        .limit(limit)
        .await?
        .try_collect()
        .await?;
    Ok(users)
}

// -- Role profiles ----------------------------------------------------------
//
// Creation is a conditional upsert on user_id so a double submission cannot
// leave two profile rows behind.

pub async fn ensure_donor_profile(db: &Db, user_id: &str, now: DateTime) -> anyhow::Result<bool> {
    let result = donors_coll(db)
        .update_one(
            doc! { "user_id": user_id },
            doc! { "$setOnInsert": {
                "_id": Uuid::new_v4().to_string(),
                "user_id": user_id,
                "created_at": now,
            }},
        )
        .upsert(true)
        .await?;
    Ok(result.upserted_id.is_some())
}

pub async fn ensure_recipient_profile(
    db: &Db,
    user_id: &str,
    shipping_address: &str,
    now: DateTime,
) -> anyhow::Result<bool> {
    let result = recipients_coll(db)
        .update_one(
            doc! { "user_id": user_id },
            doc! { "$setOnInsert": {
                "_id": Uuid::new_v4().to_string(),
                "user_id": user_id,
                "shipping_address": shipping_address,
                "created_at": now,
            }},
        )
        .upsert(true)
        .await?;
    Ok(result.upserted_id.is_some())
}

pub async fn ensure_volunteer_profile(
    db: &Db,
    user_id: &str,
    now: DateTime,
) -> anyhow::Result<bool> {
    let result = volunteers_coll(db)
        .update_one(
            doc! { "user_id": user_id },
            doc! { "$setOnInsert": {
                "_id": Uuid::new_v4().to_string(),
                "user_id": user_id,
                "created_at": now,
            }},
        )
        .upsert(true)
        .await?;
    Ok(result.upserted_id.is_some())
}

pub async fn donor_for_user(db: &Db, user_id: &str) -> anyhow::Result<Option<Donor>> {
    Ok(donors_coll(db).find_one(doc! { "user_id": user_id }).await?)
}

pub async fn recipient_for_user(db: &Db, user_id: &str) -> anyhow::Result<Option<Recipient>> {
    Ok(recipients_coll(db)
        .find_one(doc! { "user_id": user_id })
        .await?)
}

pub async fn volunteer_for_user(db: &Db, user_id: &str) -> anyhow::Result<Option<Volunteer>> {
    Ok(volunteers_coll(db)
        .find_one(doc! { "user_id": user_id })
        .await?)
}

pub async fn donor_by_id(db: &Db, donor_id: &str) -> anyhow::Result<Option<Donor>> {
    Ok(donors_coll(db).find_one(doc! { "_id": donor_id }).await?)
}

pub async fn recipient_by_id(db: &Db, recipient_id: &str) -> anyhow::Result<Option<Recipient>> {
    Ok(recipients_coll(db)
        .find_one(doc! { "_id": recipient_id })
        .await?)
}

pub async fn volunteer_by_id(db: &Db, volunteer_id: &str) -> anyhow::Result<Option<Volunteer>> {
    Ok(volunteers_coll(db)
        .find_one(doc! { "_id": volunteer_id })
        .await?)
}

pub async fn user_with_roles(db: &Db, user: &User) -> anyhow::Result<UserWithRoles> {
    let is_donor = donor_for_user(db, &user.id).await?.is_some();
    let is_recipient = recipient_for_user(db, &user.id).await?.is_some();
    let is_volunteer = volunteer_for_user(db, &user.id).await?.is_some();
    Ok(UserWithRoles {
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        phone: user.phone.clone(),
        is_active: user.is_active,
        date_joined: user.date_joined.to_chrono(),
        is_donor,
        is_recipient,
        is_volunteer,
    })
}

/// Delete a user and everything hanging off their role profiles.
///
/// Donor side: their items and those items' donations go away. Recipient
/// side: donations they claimed become available again (shipped ones keep
/// their status) and lose the recipient reference. Volunteer side: organized
/// activities go away with all participation records, the user's own
/// participations elsewhere are removed, and any activity that drops below
/// capacity reopens.
pub async fn delete_user_cascade(db: &Db, user_id: &str) -> anyhow::Result<bool> {
    let Some(user) = find_user_by_id(db, user_id).await? else {
        return Ok(false);
    };

    if let Some(donor) = donor_for_user(db, &user.id).await? {
        donations_coll(db)
            .delete_many(doc! { "donor_id": &donor.id })
            .await?;
        items_coll(db)
            .delete_many(doc! { "donor_id": &donor.id })
            .await?;
        donors_coll(db).delete_one(doc! { "_id": &donor.id }).await?;
    }

    if let Some(recipient) = recipient_for_user(db, &user.id).await? {
        donations_coll(db)
            .update_many(
                doc! { "recipient_id": &recipient.id, "status": "claimed" },
                doc! {
                    "$set": { "status": "available" },
                    "$unset": { "recipient_id": "", "claimed_at": "" },
                },
            )
            .await?;
        donations_coll(db)
            .update_many(
                doc! { "recipient_id": &recipient.id },
                doc! { "$unset": { "recipient_id": "" } },
            )
            .await?;
        recipients_coll(db)
            .delete_one(doc! { "_id": &recipient.id })
            .await?;
    }

    if let Some(volunteer) = volunteer_for_user(db, &user.id).await? {
        let organized: Vec<String> = activities_coll(db)
            .find(doc! { "volunteer_id": &volunteer.id })
            .await?
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
        if !organized.is_empty() {
            volunteer_activities_coll(db)
                .delete_many(doc! { "activity_id": { "$in": organized.clone() } })
                .await?;
            activities_coll(db)
                .delete_many(doc! { "volunteer_id": &volunteer.id })
                .await?;
        }

        // Participations in other people's activities: remember which
        // activities lose a joined member, then reconcile their status.
        let joined_elsewhere: Vec<String> = volunteer_activities_coll(db)
            .find(doc! { "volunteer_id": &volunteer.id, "status": "joined" })
            .await?
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .map(|p| p.activity_id)
            .collect();
        volunteer_activities_coll(db)
            .delete_many(doc! { "volunteer_id": &volunteer.id })
            .await?;
        for activity_id in joined_elsewhere {
            activities::refresh_activity_status(db, &activity_id).await?;
        }

        volunteers_coll(db)
            .delete_one(doc! { "_id": &volunteer.id })
            .await?;
    }

    users_coll(db).delete_one(doc! { "_id": &user.id }).await?;
    Ok(true)
}
