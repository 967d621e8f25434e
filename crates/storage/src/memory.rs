use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

use kamikaze_common::{StoreError, StoreResult};

use crate::pubsub::PubSub;
use crate::store::{EntryStore, Subscriber};

/// Estado compartilhado entre todos os handles.
struct SharedState {
    sets: DashMap<String, HashMap<String, f64>>,
    pubsub: Mutex<PubSub>,
}

/// Store in-process com a mesma semântica de sorted set + pub/sub do Redis.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<SharedState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            shared: Arc::new(SharedState {
                sets: DashMap::new(),
                pubsub: Mutex::new(PubSub::new()),
            }),
        }
    }

    /// Número de membros no sorted set.
    pub fn len(&self, key: &str) -> usize {
        self.shared.sets.get(key).map(|set| set.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    type Subscriber = MemorySubscriber;

    async fn scan(&self, key: &str) -> StoreResult<Vec<(String, f64)>> {
        let mut entries: Vec<(String, f64)> = match self.shared.sets.get(key) {
            Some(set) => set.iter().map(|(m, s)| (m.clone(), *s)).collect(),
            None => return Ok(vec![]),
        };
        // Ordem de um sorted set: score, depois membro
        entries.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries)
    }

    async fn add(&self, key: &str, score: f64, member: &str) -> StoreResult<()> {
        self.shared
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn remove(&self, key: &str, members: &[String]) -> StoreResult<usize> {
        let mut set = match self.shared.sets.get_mut(key) {
            Some(set) => set,
            None => return Ok(0),
        };

        let removed = members
            .iter()
            .filter(|m| set.remove(m.as_str()).is_some())
            .count();

        // Limpar chave se o set ficou vazio
        if set.is_empty() {
            drop(set);
            self.shared.sets.remove(key);
        }
        Ok(removed)
    }

    async fn publish(&self, channel: &str, message: &str) -> StoreResult<usize> {
        let mut pubsub = self.shared.pubsub.lock().await;
        Ok(pubsub.publish(channel, message.to_string()))
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<MemorySubscriber> {
        let mut pubsub = self.shared.pubsub.lock().await;
        let rx = pubsub.subscribe(channel);
        Ok(MemorySubscriber {
            channel: channel.to_string(),
            stream: BroadcastStream::new(rx),
        })
    }
}

/// Inscrição num canal do [`MemoryStore`].
pub struct MemorySubscriber {
    channel: String,
    stream: BroadcastStream<String>,
}

#[async_trait]
impl Subscriber for MemorySubscriber {
    async fn next_message(&mut self) -> StoreResult<String> {
        match self.stream.next().await {
            Some(Ok(message)) => Ok(message),
            // Mensagens perdidas ainda significam "a fila mudou"
            Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                debug!("subscriber atrasado em {n} mensagens no canal {}", self.channel);
                Ok(format!("lagged:{n}"))
            }
            None => Err(StoreError::SubscriptionClosed(self.channel.clone())),
        }
    }
}
