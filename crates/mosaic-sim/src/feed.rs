use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{SimResult, Simulation};

pub(crate) const POSTS_KEY: &str = "posts";
pub(crate) const STORIES_KEY: &str = "stories";
pub(crate) const NOTES_KEY: &str = "notes";

/// Stories and notes both disappear 24 hours after creation.
fn content_ttl() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimPost {
    pub id: String,
    pub account_id: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub account_id: String,
    pub note_text: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Simulation {
    // -- Posts --

    pub fn posts(&self) -> SimResult<Vec<SimPost>> {
        self.store.get_or_default(POSTS_KEY)
    }

    pub fn add_post(
        &self,
        account_id: &str,
        image_url: &str,
        caption: Option<&str>,
    ) -> SimResult<SimPost> {
        let mut posts = self.posts()?;
        let post = SimPost {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            image_url: image_url.to_string(),
            caption: caption.map(str::to_string),
            created_at: Utc::now(),
        };
        posts.push(post.clone());
        self.store.set(POSTS_KEY, &posts)?;
        Ok(post)
    }

    // -- Stories --

    /// Replaces the story list: the given accounts have a fresh 24-hour
    /// story, everyone else's is dropped.
    pub fn set_story_accounts(&self, account_ids: &[String]) -> SimResult<()> {
        let now = Utc::now();
        let stories: Vec<Story> = account_ids
            .iter()
            .map(|id| Story {
                account_id: id.clone(),
                created_at: now,
                expires_at: now + content_ttl(),
            })
            .collect();
        self.store.set(STORIES_KEY, &stories)
    }

    /// Accounts whose story has not yet expired.
    pub fn accounts_with_active_stories(&self) -> SimResult<Vec<String>> {
        let stories: Vec<Story> = self.store.get_or_default(STORIES_KEY)?;
        let now = Utc::now();
        Ok(stories
            .into_iter()
            .filter(|s| s.expires_at > now)
            .map(|s| s.account_id)
            .collect())
    }

    // -- Notes --

    /// Unexpired notes only; expired entries are filtered out on read, not
    /// garbage-collected.
    pub fn notes(&self) -> SimResult<Vec<Note>> {
        let notes: Vec<Note> = self.store.get_or_default(NOTES_KEY)?;
        let now = Utc::now();
        Ok(notes.into_iter().filter(|n| n.expires_at > now).collect())
    }

    /// One note per account: saving replaces, a blank text removes.
    pub fn save_note(&self, account_id: &str, note_text: &str) -> SimResult<()> {
        let mut notes: Vec<Note> = self.notes()?;
        notes.retain(|n| n.account_id != account_id);

        let trimmed = note_text.trim();
        if !trimmed.is_empty() {
            let now = Utc::now();
            notes.push(Note {
                account_id: account_id.to_string(),
                note_text: trimmed.to_string(),
                created_at: now,
                expires_at: now + content_ttl(),
            });
        }
        self.store.set(NOTES_KEY, &notes)
    }

    pub fn note_for(&self, account_id: &str) -> SimResult<Option<Note>> {
        Ok(self.notes()?.into_iter().find(|n| n.account_id == account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Simulation;

    #[test]
    fn saving_a_note_replaces_the_previous_one() {
        let dir = tempfile::tempdir().unwrap();
        let sim = Simulation::open(dir.path()).unwrap();

        sim.save_note("acct", "first thought").unwrap();
        sim.save_note("acct", "second thought").unwrap();

        let notes = sim.notes().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].note_text, "second thought");
    }

    #[test]
    fn blank_note_clears_the_existing_one() {
        let dir = tempfile::tempdir().unwrap();
        let sim = Simulation::open(dir.path()).unwrap();

        sim.save_note("acct", "temporary").unwrap();
        sim.save_note("acct", "   ").unwrap();
        assert!(sim.note_for("acct").unwrap().is_none());
    }

    #[test]
    fn expired_notes_and_stories_are_filtered_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let sim = Simulation::open(dir.path()).unwrap();
        let past = Utc::now() - Duration::hours(1);

        sim.store()
            .set(
                NOTES_KEY,
                &vec![Note {
                    account_id: "acct".into(),
                    note_text: "stale".into(),
                    created_at: past - content_ttl(),
                    expires_at: past,
                }],
            )
            .unwrap();
        assert!(sim.notes().unwrap().is_empty());

        sim.store()
            .set(
                STORIES_KEY,
                &vec![
                    Story {
                        account_id: "gone".into(),
                        created_at: past - content_ttl(),
                        expires_at: past,
                    },
                    Story {
                        account_id: "fresh".into(),
                        created_at: Utc::now(),
                        expires_at: Utc::now() + content_ttl(),
                    },
                ],
            )
            .unwrap();
        assert_eq!(sim.accounts_with_active_stories().unwrap(), vec!["fresh"]);
    }

    #[test]
    fn replacing_story_accounts_drops_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let sim = Simulation::open(dir.path()).unwrap();

        sim.set_story_accounts(&["a".into(), "b".into()]).unwrap();
        sim.set_story_accounts(&["c".into()]).unwrap();
        assert_eq!(sim.accounts_with_active_stories().unwrap(), vec!["c"]);
    }
}
