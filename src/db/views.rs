//! Read models returned by the query layer. These are defined view types:
//! handlers and templates never assemble ad hoc composites out of raw
//! documents.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::models::{ActivityStatus, DonationStatus, Item, ParticipationStatus};

#[derive(Serialize, Debug, Clone)]
pub struct ItemSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub condition: String,
    pub image_url: Option<String>,
    pub item_location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        ItemSummary {
            id: item.id.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            category: item.category.clone(),
            condition: item.condition.clone(),
            image_url: item.image_url.clone(),
            item_location: item.item_location.clone(),
            latitude: item.latitude,
            longitude: item.longitude,
        }
    }
}

/// A donation joined with its item and the display fields of the people on
/// both ends.
#[derive(Serialize, Debug, Clone)]
pub struct DonationDetail {
    pub id: String,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub item: ItemSummary,
    pub donor_name: String,
    pub donor_email: String,
    pub recipient_name: Option<String>,
    pub recipient_email: Option<String>,
}

/// An activity joined with organizer display fields and its live
/// participation state.
#[derive(Serialize, Debug, Clone)]
pub struct ActivityDetail {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_url: Option<String>,
    pub activity_date: DateTime<Utc>,
    pub duration_hours: i64,
    pub max_participants: i64,
    pub requirements: Option<String>,
    pub contact_info: Option<String>,
    pub status: ActivityStatus,
    pub created_at: DateTime<Utc>,
    pub organizer_name: String,
    pub organizer_email: String,
    pub joined_participants: u64,
    pub user_has_joined: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct ParticipationView {
    pub id: String,
    pub activity_id: String,
    pub activity_title: String,
    pub status: ParticipationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// "Has role X" means "profile X exists for this user"; roles are profile
/// rows, never flags on the user document.
#[derive(Serialize, Debug, Clone)]
pub struct UserWithRoles {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub is_donor: bool,
    pub is_recipient: bool,
    pub is_volunteer: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

/// In-memory pagination over an already-filtered result set. Out-of-range
/// pages clamp to the nearest valid page rather than erroring, matching the
/// forgiving behavior of the dashboard listings.
pub fn paginate<T>(items: Vec<T>, page: u64, per_page: u64) -> Page<T> {
    let per_page = per_page.max(1);
    let total = items.len() as u64;
    let total_pages = (total.div_ceil(per_page)).max(1);
    let page = page.clamp(1, total_pages);

    let start = ((page - 1) * per_page) as usize;
    let items: Vec<T> = items
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();

    Page {
        items,
        page,
        per_page,
        total,
        total_pages,
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct DonationCounts {
    pub total: u64,
    pub available: u64,
    pub claimed: u64,
    pub shipped: u64,
    pub unavailable: u64,
}

#[derive(Serialize, Debug, Clone)]
pub struct CategoryStats {
    pub category: String,
    pub total_count: u64,
    pub available_count: u64,
    pub claimed_count: u64,
    pub shipped_count: u64,
}

/// One calendar-day bucket of the admin trend chart; buckets are returned
/// oldest first so today lands at the end.
#[derive(Serialize, Debug, Clone)]
pub struct TrendPoint {
    pub date: String,
    pub activities_created: u64,
    pub activities_completed: u64,
}

#[derive(Serialize, Debug, Clone)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub count: u64,
}

#[derive(Serialize, Debug, Clone)]
pub struct AdminDashboard {
    pub days: i64,
    pub total_users: u64,
    pub active_users: u64,
    pub blocked_users: u64,
    pub new_users_period: u64,
    pub donations: DonationCounts,
    pub new_donations_period: u64,
    pub total_activities: u64,
    pub joined_participations: u64,
    pub completed_participations: u64,
    pub cancelled_participations: u64,
    pub donation_category_stats: Vec<CategoryStats>,
    pub volunteer_activity_trends: Vec<TrendPoint>,
    pub top_donors: Vec<LeaderboardEntry>,
    pub top_recipients: Vec<LeaderboardEntry>,
    pub recent_donations: Vec<DonationDetail>,
    pub recent_users: Vec<UserWithRoles>,
}

/// One row of the admin event feed.
#[derive(Serialize, Debug, Clone)]
pub struct EventLogEntry {
    pub kind: String,
    pub action: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::paginate;

    #[test]
    fn paginates_full_and_partial_pages() {
        let page = paginate((1..=25).collect::<Vec<_>>(), 2, 10);
        assert_eq!(page.items, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);

        let last = paginate((1..=25).collect::<Vec<_>>(), 3, 10);
        assert_eq!(last.items, (21..=25).collect::<Vec<_>>());
    }

    #[test]
    fn clamps_out_of_range_pages() {
        let page = paginate(vec![1, 2, 3], 99, 10);
        assert_eq!(page.page, 1);
        assert_eq!(page.items, vec![1, 2, 3]);

        let empty: super::Page<i32> = paginate(vec![], 1, 10);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }
}
