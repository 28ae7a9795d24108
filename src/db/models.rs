use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// Minutes a 6-digit email verification code stays usable.
pub const VERIFICATION_CODE_TTL_MINUTES: i64 = 10;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub apartment: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<Address>,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime,
    #[serde(default)]
    pub last_login: Option<DateTime>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub verification_code: Option<String>,
    #[serde(default)]
    pub verification_code_created_at: Option<DateTime>,
}

impl User {
    /// A code is usable iff it matches the stored one and was issued within
    /// the TTL window.
    pub fn verification_code_valid(&self, code: &str, now: chrono::DateTime<chrono::Utc>) -> bool {
        let (Some(stored), Some(created_at)) =
            (&self.verification_code, self.verification_code_created_at)
        else {
            return false;
        };
        if stored != code {
            return false;
        }
        let age = now - created_at.to_chrono();
        age >= chrono::Duration::zero()
            && age < chrono::Duration::minutes(VERIFICATION_CODE_TTL_MINUTES)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Donor {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Recipient {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub shipping_address: String,
    pub created_at: DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Volunteer {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub preferences: Option<String>,
    #[serde(default)]
    pub limitations: Option<String>,
    pub created_at: DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub condition: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub donor_id: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub item_location: Option<String>,
    pub created_at: DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Available,
    Claimed,
    Shipped,
    Unavailable,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Available => "available",
            DonationStatus::Claimed => "claimed",
            DonationStatus::Shipped => "shipped",
            DonationStatus::Unavailable => "unavailable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(DonationStatus::Available),
            "claimed" => Some(DonationStatus::Claimed),
            "shipped" => Some(DonationStatus::Shipped),
            "unavailable" => Some(DonationStatus::Unavailable),
            _ => None,
        }
    }
}

/// Claimed and shipped donations always carry a recipient reference;
/// available ones never do.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Donation {
    #[serde(rename = "_id")]
    pub id: String,
    pub item_id: String,
    pub donor_id: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    pub status: DonationStatus,
    pub created_at: DateTime,
    #[serde(default)]
    pub claimed_at: Option<DateTime>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Available,
    Completed,
    Cancelled,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Available => "available",
            ActivityStatus::Completed => "completed",
            ActivityStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub volunteer_id: String,
    pub created_at: DateTime,
    pub activity_date: DateTime,
    pub duration_hours: i64,
    pub max_participants: i64,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
    pub status: ActivityStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParticipationStatus {
    Joined,
    Left,
    Completed,
    Cancelled,
}

impl ParticipationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationStatus::Joined => "joined",
            ParticipationStatus::Left => "left",
            ParticipationStatus::Completed => "completed",
            ParticipationStatus::Cancelled => "cancelled",
        }
    }
}

/// At most one record exists per (activity, volunteer) pair; rejoining
/// flips a `left` record back to `joined` instead of inserting a second one.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VolunteerActivity {
    #[serde(rename = "_id")]
    pub id: String,
    pub activity_id: String,
    pub volunteer_id: String,
    pub participant_id: String,
    pub status: ParticipationStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn user_with_code(code: &str, issued: chrono::DateTime<Utc>) -> User {
        User {
            id: "u1".into(),
            email: "a@b.co".into(),
            name: "A".into(),
            phone: "0501234567".into(),
            address: None,
            password_hash: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: DateTime::from_chrono(issued),
            last_login: None,
            email_verified: false,
            verification_code: Some(code.to_string()),
            verification_code_created_at: Some(DateTime::from_chrono(issued)),
        }
    }

    #[test]
    fn verification_code_matches_within_window() {
        let now = Utc::now();
        let user = user_with_code("123456", now - Duration::minutes(5));
        assert!(user.verification_code_valid("123456", now));
    }

    #[test]
    fn verification_code_rejects_mismatch_and_expiry() {
        let now = Utc::now();
        let user = user_with_code("123456", now - Duration::minutes(5));
        assert!(!user.verification_code_valid("654321", now));

        let stale = user_with_code("123456", now - Duration::minutes(11));
        assert!(!stale.verification_code_valid("123456", now));
    }

    #[test]
    fn verification_code_requires_issue_timestamp() {
        let now = Utc::now();
        let mut user = user_with_code("123456", now);
        user.verification_code_created_at = None;
        assert!(!user.verification_code_valid("123456", now));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            DonationStatus::Available,
            DonationStatus::Claimed,
            DonationStatus::Shipped,
            DonationStatus::Unavailable,
        ] {
            assert_eq!(DonationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DonationStatus::parse("lost"), None);
    }
}
