//! In-memory [`TournamentStore`].

use super::{StoreError, StoreResult, TournamentStore};
use crate::tournament::{Tournament, TournamentId};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    tournaments: HashMap<TournamentId, Tournament>,
    order: Vec<TournamentId>,
    current: Option<TournamentId>,
}

/// Store backed by a map; contents are lost when the process exits
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    writes: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves that actually changed stored data
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TournamentStore for InMemoryStore {
    async fn load(&self, id: &str) -> StoreResult<Tournament> {
        self.inner
            .read()
            .await
            .tournaments
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save(&self, tournament: &Tournament) -> StoreResult<()> {
        let mut inner = self.inner.write().await;

        match inner.tournaments.get(&tournament.id) {
            Some(existing) if existing == tournament => return Ok(()),
            Some(_) => {}
            None => inner.order.push(tournament.id.clone()),
        }

        inner
            .tournaments
            .insert(tournament.id.clone(), tournament.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn list_ids(&self) -> StoreResult<Vec<TournamentId>> {
        Ok(self.inner.read().await.order.clone())
    }

    async fn current(&self) -> StoreResult<Option<TournamentId>> {
        Ok(self.inner.read().await.current.clone())
    }

    async fn set_current(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.tournaments.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        inner.current = Some(id.to_string());
        Ok(())
    }
}
