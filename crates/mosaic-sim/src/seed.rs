use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::accounts::Account;
use crate::{SimResult, Simulation};

const SEEDED_KEY: &str = "request_users_seeded";

/// Invented personas whose pending requests populate a fresh inbox.
const SAMPLE_USERS: [(&str, &str, bool, u64, u64); 5] = [
    ("wren_atlas", "Wren Atlas", true, 2_400_000, 318),
    ("june_meadow", "June Meadow", false, 150_000, 89),
    ("petal_fox", "Petal Fox", false, 45_000, 234),
    ("indigo_vale", "Indigo Vale", true, 890_000, 412),
    ("moss_and_fern", "Moss & Fern", false, 12_000, 67),
];

const SAMPLE_MESSAGES: [&str; 5] = [
    "Hey! Love your latest post",
    "Hi there! Can we chat?",
    "Your photos are amazing",
    "Would love to collaborate sometime",
    "Saw your story, that view is unreal",
];

impl Simulation {
    /// First-run seeding: sample accounts plus staggered pending requests
    /// aimed at the active account. Guarded by a flag key so it runs once;
    /// without an active account there is nothing to aim at and nothing
    /// happens.
    pub fn seed_sample_requests(&self) -> SimResult<()> {
        if self.store.get::<bool>(SEEDED_KEY)?.unwrap_or(false) {
            return Ok(());
        }

        let Some(active) = self.active_account()? else {
            return Ok(());
        };

        let now = Utc::now();
        let sample_accounts: Vec<Account> = SAMPLE_USERS
            .iter()
            .map(|(username, full_name, verified, followers, posts)| Account {
                id: Uuid::new_v4().to_string(),
                username: (*username).to_string(),
                full_name: (*full_name).to_string(),
                avatar: None,
                is_verified: *verified,
                followers_count: *followers,
                posts_count: *posts,
                is_active: false,
                created_at: now,
            })
            .collect();

        for (index, account) in sample_accounts.iter().enumerate() {
            let request = self.add_message_request(
                &account.id,
                &active.id,
                SAMPLE_MESSAGES[index % SAMPLE_MESSAGES.len()],
            )?;
            // Stagger arrival times so the inbox reads naturally.
            let mut requests = self.message_requests()?;
            if let Some(stored) = requests.iter_mut().find(|r| r.id == request.id) {
                stored.created_at = now - Duration::hours(index as i64);
            }
            self.store.set(crate::requests::REQUESTS_KEY, &requests)?;
        }

        self.upsert_accounts(sample_accounts)?;
        self.store.set(SEEDED_KEY, &true)?;
        debug!("seeded sample message requests for {}", active.username);
        Ok(())
    }
}
