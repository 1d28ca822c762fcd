//! Score persistence gateway.
//!
//! Game code never waits on storage: finished games and early exits produce
//! `ScoreRecord`s which are handed to `dispatch`, and failures only show up
//! in the logs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::AccountId;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),
}

/// A pending update for one durable account
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreRecord {
    /// The game finished normally
    RoundOutcome {
        account_id: AccountId,
        score_delta: i64,
        won: bool,
    },
    /// The player left, or the room was torn down, mid-game
    EarlyExit {
        account_id: AccountId,
        score_delta: i64,
    },
}

impl ScoreRecord {
    pub fn account_id(&self) -> &str {
        match self {
            ScoreRecord::RoundOutcome { account_id, .. } => account_id,
            ScoreRecord::EarlyExit { account_id, .. } => account_id,
        }
    }
}

/// Cumulative statistics of one account
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountStats {
    pub account_id: AccountId,
    pub total_score: i64,
    pub games_played: u32,
    pub games_won: u32,
}

/// Sink for score updates keyed by durable account identity
#[async_trait]
pub trait ScoreGateway: Send + Sync {
    /// Count a finished game: one more game played, the score added, and a
    /// win if the player placed
    async fn record_round_outcome(
        &self,
        account_id: &str,
        score_delta: i64,
        won: bool,
    ) -> GatewayResult<()>;

    /// Count an abandoned game: one more game played and the score so far
    async fn record_early_exit(&self, account_id: &str, score_delta: i64) -> GatewayResult<()>;

    /// Top accounts by cumulative score
    async fn leaderboard(&self, limit: usize) -> GatewayResult<Vec<AccountStats>>;

    /// Get the name of this gateway
    fn name(&self) -> &str;
}

/// Hand records to the gateway in the background, logging failures
pub fn dispatch(gateway: Arc<dyn ScoreGateway>, records: Vec<ScoreRecord>) {
    if records.is_empty() {
        return;
    }
    tokio::spawn(async move {
        for record in records {
            let result = match &record {
                ScoreRecord::RoundOutcome {
                    account_id,
                    score_delta,
                    won,
                } => {
                    gateway
                        .record_round_outcome(account_id, *score_delta, *won)
                        .await
                }
                ScoreRecord::EarlyExit {
                    account_id,
                    score_delta,
                } => gateway.record_early_exit(account_id, *score_delta).await,
            };
            match result {
                Ok(()) => tracing::debug!(
                    "Recorded {:?} via {} gateway",
                    record,
                    gateway.name()
                ),
                Err(e) => tracing::error!(
                    "Score sync failure for account {}: {}",
                    record.account_id(),
                    e
                ),
            }
        }
    });
}

/// Process-local gateway backing the leaderboard route.
///
/// Accounts are created on first update.
#[derive(Debug, Default)]
pub struct InMemoryLeaderboard {
    accounts: RwLock<HashMap<AccountId, AccountStats>>,
}

impl InMemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stats(&self, account_id: &str) -> Option<AccountStats> {
        self.accounts.read().await.get(account_id).cloned()
    }

    async fn apply(&self, account_id: &str, score_delta: i64, won: bool) {
        let mut accounts = self.accounts.write().await;
        let stats = accounts
            .entry(account_id.to_string())
            .or_insert_with(|| AccountStats {
                account_id: account_id.to_string(),
                ..AccountStats::default()
            });
        stats.games_played += 1;
        stats.total_score += score_delta;
        if won {
            stats.games_won += 1;
        }
    }
}

#[async_trait]
impl ScoreGateway for InMemoryLeaderboard {
    async fn record_round_outcome(
        &self,
        account_id: &str,
        score_delta: i64,
        won: bool,
    ) -> GatewayResult<()> {
        self.apply(account_id, score_delta, won).await;
        Ok(())
    }

    async fn record_early_exit(&self, account_id: &str, score_delta: i64) -> GatewayResult<()> {
        self.apply(account_id, score_delta, false).await;
        Ok(())
    }

    async fn leaderboard(&self, limit: usize) -> GatewayResult<Vec<AccountStats>> {
        let accounts = self.accounts.read().await;
        let mut ranked: Vec<AccountStats> = accounts.values().cloned().collect();
        ranked.sort_by(|a, b| {
            b.total_score
                .cmp(&a.total_score)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
