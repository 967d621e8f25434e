use tracing::debug;

use kamikaze_common::{CHANGE_MESSAGE, KamikazeError, KamikazeResult, unix_now};
use kamikaze_storage::{EntryStore, Package};

use crate::snapshot::{PriorityOrder, decode_entries};

/// Coloca um pacote na fila e notifica o serviço.
///
/// Sem `ttl` o pacote nunca expira.
pub async fn push<S: EntryStore>(
    store: &S,
    key: &str,
    payload: &str,
    ttl: Option<f64>,
    priority: f64,
) -> KamikazeResult<Package> {
    if priority.is_nan() {
        return Err(KamikazeError::InvalidInput("prioridade não pode ser NaN".into()));
    }
    let package = match ttl {
        Some(ttl) if !ttl.is_finite() => {
            return Err(KamikazeError::InvalidInput(format!("ttl inválido: {ttl}")));
        }
        Some(ttl) => Package::with_ttl(payload, ttl, priority, unix_now()),
        None => Package::new(payload, None, priority),
    };

    store.add(key, package.score(), package.raw_entry()).await?;
    store.publish(key, CHANGE_MESSAGE).await?;
    debug!("pacote inserido: {package}");
    Ok(package)
}

/// Remove todos os pacotes com o payload dado. Retorna quantos foram removidos.
pub async fn remove<S: EntryStore>(store: &S, key: &str, payload: &str) -> KamikazeResult<usize> {
    let matching: Vec<String> = queued_packages(store, key)
        .await?
        .into_iter()
        .filter(|p| p.payload() == payload)
        .map(|p| p.raw_entry().to_string())
        .collect();

    if matching.is_empty() {
        return Ok(0);
    }

    debug!("removendo os pacotes: {matching:?}");
    let removed = store.remove(key, &matching).await?;
    store.publish(key, CHANGE_MESSAGE).await?;
    Ok(removed)
}

/// Conteúdo da fila na ordem de varredura do serviço.
pub async fn list<S: EntryStore>(
    store: &S,
    key: &str,
    order: PriorityOrder,
) -> KamikazeResult<Vec<Package>> {
    let mut packages = queued_packages(store, key).await?;
    order.sort(&mut packages);
    Ok(packages)
}

async fn queued_packages<S: EntryStore>(store: &S, key: &str) -> KamikazeResult<Vec<Package>> {
    let entries = store.scan(key).await?;
    Ok(decode_entries(entries)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kamikaze_common::DEFAULT_KEY;
    use kamikaze_storage::{MemoryStore, Subscriber};

    #[tokio::test]
    async fn push_writes_entry_and_notifies() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(DEFAULT_KEY).await.unwrap();

        let before = unix_now();
        let package = push(&store, DEFAULT_KEY, "saucepans", Some(10.0), 22.0)
            .await
            .unwrap();

        let expire = package.expire_time().unwrap();
        assert!(expire >= before + 10.0 && expire <= unix_now() + 10.0);
        assert_eq!(
            store.scan(DEFAULT_KEY).await.unwrap(),
            vec![(package.raw_entry().to_string(), 22.0)]
        );
        assert_eq!(sub.next_message().await.unwrap(), CHANGE_MESSAGE);
    }

    #[tokio::test]
    async fn push_without_ttl_never_expires() {
        let store = MemoryStore::new();
        let package = push(&store, DEFAULT_KEY, "forever", None, 1.0).await.unwrap();
        assert_eq!(package.raw_entry(), ":forever");
    }

    #[tokio::test]
    async fn push_rejects_bad_numbers() {
        let store = MemoryStore::new();
        assert!(push(&store, DEFAULT_KEY, "x", Some(f64::NAN), 1.0).await.is_err());
        assert!(push(&store, DEFAULT_KEY, "x", Some(1.0), f64::NAN).await.is_err());
        assert!(store.is_empty(DEFAULT_KEY));
    }

    #[tokio::test]
    async fn remove_deletes_every_match() {
        let store = MemoryStore::new();
        store.add(DEFAULT_KEY, 1.0, "10:cactus").await.unwrap();
        store.add(DEFAULT_KEY, 2.0, ":cactus").await.unwrap();
        store.add(DEFAULT_KEY, 3.0, "10:chairs").await.unwrap();
        let mut sub = store.subscribe(DEFAULT_KEY).await.unwrap();

        assert_eq!(remove(&store, DEFAULT_KEY, "cactus").await.unwrap(), 2);
        assert_eq!(
            store.scan(DEFAULT_KEY).await.unwrap(),
            vec![("10:chairs".to_string(), 3.0)]
        );
        assert_eq!(sub.next_message().await.unwrap(), CHANGE_MESSAGE);
    }

    #[tokio::test]
    async fn remove_without_match_does_not_notify() {
        let store = MemoryStore::new();
        store.add(DEFAULT_KEY, 1.0, "10:cactus").await.unwrap();
        let mut sub = store.subscribe(DEFAULT_KEY).await.unwrap();

        assert_eq!(remove(&store, DEFAULT_KEY, "chairs").await.unwrap(), 0);
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            sub.next_message(),
        )
        .await;
        assert!(pending.is_err());
        assert_eq!(store.len(DEFAULT_KEY), 1);
    }

    #[tokio::test]
    async fn list_follows_priority_order() {
        let store = MemoryStore::new();
        store.add(DEFAULT_KEY, 2.0, ":b").await.unwrap();
        store.add(DEFAULT_KEY, 1.0, ":a").await.unwrap();
        store.add(DEFAULT_KEY, 3.0, ":c").await.unwrap();

        let lowest = list(&store, DEFAULT_KEY, PriorityOrder::LowestScoreFirst).await.unwrap();
        let highest = list(&store, DEFAULT_KEY, PriorityOrder::HighestScoreFirst).await.unwrap();

        let payloads = |ps: &[Package]| ps.iter().map(|p| p.payload().to_string()).collect::<Vec<_>>();
        assert_eq!(payloads(&lowest), vec!["a", "b", "c"]);
        assert_eq!(payloads(&highest), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn list_surfaces_corrupt_entries() {
        let store = MemoryStore::new();
        store.add(DEFAULT_KEY, 1.0, "garbage").await.unwrap();
        assert!(matches!(
            list(&store, DEFAULT_KEY, PriorityOrder::default()).await,
            Err(KamikazeError::Package(_))
        ));
    }
}
