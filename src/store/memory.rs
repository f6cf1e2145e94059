//! In-memory chunk and status store.
//!
//! Keeps the order of every append and every status write, which makes it the
//! store of choice for pipeline tests.

use super::{Chunk, ChunkSink, ProcessingStatus, StatusRecord, StatusReporter};
use crate::error::{LecternError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
#[cfg(test)]
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory store implementing both [`ChunkSink`] and [`StatusReporter`].
#[derive(Default)]
pub struct MemoryStore {
    chunks: RwLock<HashMap<String, BTreeMap<usize, String>>>,
    appends: RwLock<Vec<(String, usize)>>,
    statuses: RwLock<HashMap<String, StatusRecord>>,
    history: RwLock<Vec<(String, ProcessingStatus)>>,
    #[cfg(test)]
    failing_orders: HashSet<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every append of chunk `order` fail with a persistence error.
    #[cfg(test)]
    pub(crate) fn failing_append(mut self, order: usize) -> Self {
        self.failing_orders.insert(order);
        self
    }

    /// `(owner_id, order)` of every successful append, in call order.
    pub fn append_log(&self) -> Vec<(String, usize)> {
        read(&self.appends).map(|a| a.clone()).unwrap_or_default()
    }

    /// Orders appended for `owner_id`, in call order.
    pub fn appended_orders(&self, owner_id: &str) -> Vec<usize> {
        self.append_log()
            .into_iter()
            .filter(|(owner, _)| owner == owner_id)
            .map(|(_, order)| order)
            .collect()
    }

    /// Every status written for `owner_id`, in call order.
    pub fn status_history(&self, owner_id: &str) -> Vec<ProcessingStatus> {
        read(&self.history)
            .map(|h| {
                h.iter()
                    .filter(|(owner, _)| owner == owner_id)
                    .map(|(_, status)| *status)
                    .collect()
            })
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn reject_injected(&self, order: usize) -> Result<()> {
        if self.failing_orders.contains(&order) {
            return Err(LecternError::Persistence(format!(
                "write of chunk {} rejected",
                order
            )));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn reject_injected(&self, _order: usize) -> Result<()> {
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| LecternError::Persistence(format!("Failed to acquire lock: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| LecternError::Persistence(format!("Failed to acquire lock: {}", e)))
}

#[async_trait]
impl ChunkSink for MemoryStore {
    async fn append(&self, owner_id: &str, chunk: &Chunk) -> Result<()> {
        self.reject_injected(chunk.order)?;

        write(&self.chunks)?
            .entry(owner_id.to_string())
            .or_default()
            .insert(chunk.order, chunk.content.clone());
        write(&self.appends)?.push((owner_id.to_string(), chunk.order));
        Ok(())
    }

    async fn chunks(&self, owner_id: &str) -> Result<Vec<Chunk>> {
        let chunks = read(&self.chunks)?;
        Ok(chunks
            .get(owner_id)
            .map(|owned| {
                owned
                    .iter()
                    .map(|(order, content)| Chunk {
                        order: *order,
                        content: content.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl StatusReporter for MemoryStore {
    async fn set_status(&self, owner_id: &str, status: ProcessingStatus) -> Result<()> {
        let record = StatusRecord {
            owner_id: owner_id.to_string(),
            status,
            updated_at: Utc::now(),
        };
        write(&self.statuses)?.insert(owner_id.to_string(), record);
        write(&self.history)?.push((owner_id.to_string(), status));
        Ok(())
    }

    async fn status_record(&self, owner_id: &str) -> Result<Option<StatusRecord>> {
        Ok(read(&self.statuses)?.get(owner_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn chunk(order: usize) -> Chunk {
        Chunk {
            order,
            content: format!("chunk {}", order),
        }
    }

    #[tokio::test]
    async fn test_append_log_and_sorted_read() {
        let store = MemoryStore::new();
        assert_ok!(store.append("a", &chunk(1)).await);
        assert_ok!(store.append("a", &chunk(0)).await);
        assert_ok!(store.append("b", &chunk(0)).await);

        assert_eq!(store.appended_orders("a"), vec![1, 0]);
        let orders: Vec<usize> = store.chunks("a").await.unwrap().iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1]);
        assert_eq!(store.append_log().len(), 3);
    }

    #[tokio::test]
    async fn test_reappend_replaces_in_place() {
        let store = MemoryStore::new();
        assert_ok!(store.append("a", &chunk(0)).await);
        assert_ok!(store.append("a", &chunk(1)).await);

        let again = Chunk {
            order: 0,
            content: "retried".to_string(),
        };
        assert_ok!(store.append("a", &again).await);

        let chunks = store.chunks("a").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "retried");
        assert_eq!(chunks[1].content, "chunk 1");
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new().failing_append(2);
        assert_ok!(store.append("a", &chunk(0)).await);
        assert_err!(store.append("a", &chunk(2)).await);
        assert_eq!(store.appended_orders("a"), vec![0]);
        assert_eq!(store.chunks("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_history() {
        let store = MemoryStore::new();
        assert_eq!(store.status("a").await.unwrap(), ProcessingStatus::NotStarted);

        store.set_status("a", ProcessingStatus::NotStarted).await.unwrap();
        store.set_status("a", ProcessingStatus::Downloading).await.unwrap();
        store.set_status("b", ProcessingStatus::Failed).await.unwrap();

        assert_eq!(
            store.status_history("a"),
            vec![ProcessingStatus::NotStarted, ProcessingStatus::Downloading]
        );
        assert_eq!(store.status("a").await.unwrap(), ProcessingStatus::Downloading);
        assert_eq!(store.status("b").await.unwrap(), ProcessingStatus::Failed);
    }
}
