use async_trait::async_trait;

use kamikaze_common::StoreResult;

/// Sorted set + canal pub/sub onde a fila vive.
///
/// Só primitivas de leitura/escrita e notificação; toda a regra de negócio
/// fica no serviço.
#[async_trait]
pub trait EntryStore: Send + Sync {
    type Subscriber: Subscriber;

    /// Todas as entradas do sorted set como pares (membro, score).
    async fn scan(&self, key: &str) -> StoreResult<Vec<(String, f64)>>;

    /// Adiciona (ou atualiza o score de) um membro.
    async fn add(&self, key: &str, score: f64, member: &str) -> StoreResult<()>;

    /// Remove membros por valor exato. Retorna quantos existiam.
    async fn remove(&self, key: &str, members: &[String]) -> StoreResult<usize>;

    /// Publica no canal. Retorna o número de subscribers que receberam.
    async fn publish(&self, channel: &str, message: &str) -> StoreResult<usize>;

    /// Abre uma inscrição exclusiva no canal.
    async fn subscribe(&self, channel: &str) -> StoreResult<Self::Subscriber>;
}

/// Inscrição ativa num canal.
#[async_trait]
pub trait Subscriber: Send {
    /// Aguarda a próxima publicação.
    ///
    /// Deve ser cancel-safe: o loop descarta esta future quando o timeout
    /// vence primeiro.
    async fn next_message(&mut self) -> StoreResult<String>;
}
