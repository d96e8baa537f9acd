use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{SimResult, Simulation};

pub(crate) const ACCOUNTS_KEY: &str = "accounts";

/// A locally simulated account. Exactly one carries `is_active`; switching
/// accounts moves the flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub is_verified: bool,
    pub followers_count: u64,
    pub posts_count: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Simulation {
    pub fn accounts(&self) -> SimResult<Vec<Account>> {
        self.store.get_or_default(ACCOUNTS_KEY)
    }

    pub fn active_account(&self) -> SimResult<Option<Account>> {
        Ok(self.accounts()?.into_iter().find(|a| a.is_active))
    }

    /// Accounts other than the active one, for the switcher UI.
    pub fn other_accounts(&self) -> SimResult<Vec<Account>> {
        Ok(self.accounts()?.into_iter().filter(|a| !a.is_active).collect())
    }

    pub fn add_account(
        &self,
        username: &str,
        full_name: &str,
        make_active: bool,
    ) -> SimResult<Account> {
        let mut accounts = self.accounts()?;

        let account = Account {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            full_name: full_name.to_string(),
            avatar: None,
            is_verified: false,
            followers_count: 0,
            posts_count: 0,
            is_active: make_active,
            created_at: Utc::now(),
        };

        if make_active {
            for existing in accounts.iter_mut() {
                existing.is_active = false;
            }
        }
        accounts.push(account.clone());
        self.store.set(ACCOUNTS_KEY, &accounts)?;
        Ok(account)
    }

    /// Moves the active flag. Unknown ids leave the collection untouched.
    pub fn switch_account(&self, id: &str) -> SimResult<()> {
        let mut accounts = self.accounts()?;
        if !accounts.iter().any(|a| a.id == id) {
            return Ok(());
        }
        for account in accounts.iter_mut() {
            account.is_active = account.id == id;
        }
        self.store.set(ACCOUNTS_KEY, &accounts)
    }

    pub(crate) fn upsert_accounts(&self, new_accounts: Vec<Account>) -> SimResult<()> {
        let mut accounts = self.accounts()?;
        for account in new_accounts {
            if !accounts.iter().any(|a| a.id == account.id) {
                accounts.push(account);
            }
        }
        self.store.set(ACCOUNTS_KEY, &accounts)
    }
}
