//! Learning state tracking
//!
//! Each (user, card) pair moves between `new`, `learning` and `mastered`
//! only when the user says so during study. Every mark bumps the review
//! counter and stamps the review time. There is no scheduling and no decay.

use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Per-card learning status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningStatus {
    #[default]
    New,
    Learning,
    Mastered,
}

impl LearningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStatus::New => "new",
            LearningStatus::Learning => "learning",
            LearningStatus::Mastered => "mastered",
        }
    }

    /// Study order: unfinished cards (0) come before mastered ones (1)
    pub fn study_priority(&self) -> u8 {
        match self {
            LearningStatus::New | LearningStatus::Learning => 0,
            LearningStatus::Mastered => 1,
        }
    }
}

impl FromStr for LearningStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(LearningStatus::New),
            "learning" => Ok(LearningStatus::Learning),
            "mastered" => Ok(LearningStatus::Mastered),
            other => Err(Error::InvalidInput(format!("Unknown learning status: {}", other))),
        }
    }
}

/// Progress of one user on one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardProgress {
    pub user_id: String,
    pub card_id: Uuid,
    pub status: LearningStatus,
    pub review_count: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl CardProgress {
    /// Fresh progress: `new`, never reviewed
    pub fn new(user_id: impl Into<String>, card_id: Uuid) -> Self {
        Self {
            user_id: user_id.into(),
            card_id,
            status: LearningStatus::New,
            review_count: 0,
            last_reviewed_at: None,
        }
    }

    /// Apply a user-triggered transition. Any status may follow any other.
    pub fn mark(&mut self, status: LearningStatus, at: DateTime<Utc>) {
        self.status = status;
        self.review_count = self.review_count.saturating_add(1);
        self.last_reviewed_at = Some(at);
    }
}

/// Backing store for card progress, scoped per user
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load(&self, user_id: &str, card_id: Uuid) -> Result<Option<CardProgress>>;

    /// Apply `marks` for one user in order, all or none.
    ///
    /// Each mark increments the stored review counter in place, so
    /// concurrent callers never overwrite each other's reviews. Returns the
    /// progress after every mark, in input order.
    async fn apply_marks(
        &self,
        user_id: &str,
        marks: &[(Uuid, LearningStatus)],
        at: DateTime<Utc>,
    ) -> Result<Vec<CardProgress>>;

    async fn list(&self, user_id: &str) -> Result<Vec<CardProgress>>;
}

/// In-process progress store
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    entries: RwLock<HashMap<(String, Uuid), CardProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load(&self, user_id: &str, card_id: Uuid) -> Result<Option<CardProgress>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(user_id.to_string(), card_id)).cloned())
    }

    async fn apply_marks(
        &self,
        user_id: &str,
        marks: &[(Uuid, LearningStatus)],
        at: DateTime<Utc>,
    ) -> Result<Vec<CardProgress>> {
        let mut entries = self.entries.write().await;
        let applied = marks
            .iter()
            .map(|&(card_id, status)| {
                let progress = entries
                    .entry((user_id.to_string(), card_id))
                    .or_insert_with(|| CardProgress::new(user_id, card_id));
                progress.mark(status, at);
                progress.clone()
            })
            .collect();
        Ok(applied)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<CardProgress>> {
        let entries = self.entries.read().await;
        let mut list: Vec<CardProgress> = entries
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by_key(|p| p.card_id);
        Ok(list)
    }
}

/// Reads and applies learning transitions through a [`ProgressStore`]
pub struct LearningTracker<S> {
    store: S,
}

impl<S: ProgressStore> LearningTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current progress, or a fresh `new` record if the user never touched the card
    pub async fn progress(&self, user_id: &str, card_id: Uuid) -> Result<CardProgress> {
        Ok(self
            .store
            .load(user_id, card_id)
            .await?
            .unwrap_or_else(|| CardProgress::new(user_id, card_id)))
    }

    pub async fn status(&self, user_id: &str, card_id: Uuid) -> Result<LearningStatus> {
        Ok(self.progress(user_id, card_id).await?.status)
    }

    pub async fn mark(
        &self,
        user_id: &str,
        card_id: Uuid,
        status: LearningStatus,
    ) -> Result<CardProgress> {
        self.mark_at(user_id, card_id, status, Utc::now()).await
    }

    pub async fn mark_at(
        &self,
        user_id: &str,
        card_id: Uuid,
        status: LearningStatus,
        at: DateTime<Utc>,
    ) -> Result<CardProgress> {
        self.mark_all_at(user_id, &[(card_id, status)], at)
            .await?
            .pop()
            .ok_or_else(|| Error::Internal(format!("No progress returned for card {}", card_id)))
    }

    /// Apply several marks as one unit
    pub async fn mark_all(
        &self,
        user_id: &str,
        marks: &[(Uuid, LearningStatus)],
    ) -> Result<Vec<CardProgress>> {
        self.mark_all_at(user_id, marks, Utc::now()).await
    }

    pub async fn mark_all_at(
        &self,
        user_id: &str,
        marks: &[(Uuid, LearningStatus)],
        at: DateTime<Utc>,
    ) -> Result<Vec<CardProgress>> {
        let applied = self.store.apply_marks(user_id, marks, at).await?;

        for progress in &applied {
            tracing::debug!(
                user_id = %user_id,
                card_id = %progress.card_id,
                status = progress.status.as_str(),
                review_count = progress.review_count,
                "Card progress updated"
            );
        }

        Ok(applied)
    }
}

// ============================================================================
// Study sessions
// ============================================================================

/// Stable ordering for study: new/learning ahead of mastered, otherwise
/// the original order is kept.
pub fn order_for_study<T, F>(items: &mut [T], status_of: F)
where
    F: Fn(&T) -> LearningStatus,
{
    items.sort_by_key(|item| status_of(item).study_priority());
}

/// Card queued in a study session with its status at session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyItem {
    pub card_id: Uuid,
    pub status: LearningStatus,
}

/// Counts per resulting status at the end of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub new: usize,
    pub learning: usize,
    pub mastered: usize,
    /// Cards the user marked during the session
    pub reviewed: usize,
    pub total: usize,
}

impl SessionSummary {
    pub fn from_statuses(statuses: impl IntoIterator<Item = LearningStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            summary.total += 1;
            match status {
                LearningStatus::New => summary.new += 1,
                LearningStatus::Learning => summary.learning += 1,
                LearningStatus::Mastered => summary.mastered += 1,
            }
        }
        summary
    }
}

/// One pass over a set of cards
#[derive(Debug, Clone)]
pub struct StudySession {
    queue: Vec<StudyItem>,
    results: HashMap<Uuid, LearningStatus>,
}

impl StudySession {
    /// Order `items` for study and cap the queue at `limit` cards
    pub fn new(mut items: Vec<StudyItem>, limit: Option<usize>) -> Self {
        order_for_study(&mut items, |item| item.status);
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Self {
            queue: items,
            results: HashMap::new(),
        }
    }

    pub fn queue(&self) -> &[StudyItem] {
        &self.queue
    }

    /// Record the status the user chose for a queued card
    pub fn record(&mut self, card_id: Uuid, status: LearningStatus) -> Result<()> {
        if !self.queue.iter().any(|item| item.card_id == card_id) {
            return Err(Error::InvalidInput(format!(
                "Card {} is not part of this study session",
                card_id
            )));
        }
        self.results.insert(card_id, status);
        Ok(())
    }

    /// Resulting status of a queued card: the last recorded mark, or its
    /// status at session start when untouched
    pub fn status_of(&self, card_id: Uuid) -> Option<LearningStatus> {
        self.queue
            .iter()
            .find(|item| item.card_id == card_id)
            .map(|item| self.results.get(&card_id).copied().unwrap_or(item.status))
    }

    pub fn is_complete(&self) -> bool {
        self.queue.iter().all(|item| self.results.contains_key(&item.card_id))
    }

    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary::from_statuses(
            self.queue
                .iter()
                .map(|item| self.results.get(&item.card_id).copied().unwrap_or(item.status)),
        );
        summary.reviewed = self.results.len();
        summary
    }
}
