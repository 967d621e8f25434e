use tokio::sync::broadcast;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info};

use kamikaze_common::{DEFAULT_KEY, INITIAL_TIMEOUT, KamikazeResult, unix_now};
use kamikaze_storage::{EntryStore, Package, Subscriber};

use crate::consumer::{Consumer, ConsumerArgs, ConsumerInvoker};
use crate::snapshot::{PriorityOrder, QueueSnapshot, evaluate, time_until_expiry};

/// Configuração do loop de notificação.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Nome do sorted set e do canal de notificações.
    pub key: String,
    /// Timeout da primeira espera, para ler a fila logo ao iniciar.
    pub initial_timeout: Duration,
    /// Limite de espera quando nenhum pacote vivo expira. `None` espera só
    /// por notificações.
    pub idle_timeout: Option<Duration>,
    pub priority: PriorityOrder,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            initial_timeout: INITIAL_TIMEOUT,
            idle_timeout: None,
            priority: PriorityOrder::default(),
        }
    }
}

/// O que acordou o loop.
#[derive(Debug, Clone, PartialEq)]
enum Wake {
    Notified(String),
    Timeout,
}

/// Loop que observa a fila, remove expirados e mantém o consumer apontado
/// para o sobrevivente corrente.
pub struct NotificationService<S: EntryStore> {
    store: S,
    config: ServiceConfig,
    invoker: ConsumerInvoker,
    passes: u64,
}

impl<S: EntryStore> NotificationService<S> {
    pub fn new(store: S, consumer: Consumer, args: ConsumerArgs, config: ServiceConfig) -> Self {
        Self {
            store,
            config,
            invoker: ConsumerInvoker::new(consumer, args),
            passes: 0,
        }
    }

    #[cfg(test)]
    fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    fn passes(&self) -> u64 {
        self.passes
    }

    /// Roda até o shutdown ou até uma falha fatal do store.
    pub async fn run(mut self, shutdown: &mut broadcast::Receiver<()>) -> KamikazeResult<()> {
        info!("inscrevendo na chave \"{}\"", self.config.key);
        let mut subscriber = self.store.subscribe(&self.config.key).await?;
        let mut timeout = Some(self.config.initial_timeout);

        loop {
            debug!("aguardando publicação com timeout de {timeout:?}");
            let wake = tokio::select! {
                result = subscriber.next_message() => Wake::Notified(result?),
                _ = sleep_for(timeout) => Wake::Timeout,
                _ = shutdown.recv() => {
                    info!("shutdown recebido, encerrando serviço");
                    self.invoker.cancel();
                    return Ok(());
                }
            };

            match wake {
                Wake::Notified(msg) => debug!("notificado de nova mensagem: {msg}"),
                Wake::Timeout => debug!("timeout após {timeout:?}"),
            }

            timeout = match self.reconcile().await {
                Ok(next) => next,
                Err(e) if e.is_fatal() => {
                    error!("falha fatal no store: {e}");
                    self.invoker.cancel();
                    return Err(e);
                }
                Err(e) => {
                    error!("passe de reconciliação abortado: {e}");
                    self.config.idle_timeout
                }
            };
        }
    }

    /// Executa um passe agora. Retorna o timeout da próxima espera.
    pub async fn reconcile(&mut self) -> KamikazeResult<Option<Duration>> {
        self.reconcile_at(unix_now()).await
    }

    /// Executa um passe como se o instante atual fosse `now`.
    pub async fn reconcile_at(&mut self, now: f64) -> KamikazeResult<Option<Duration>> {
        // Cancelar o consumer corrente o quanto antes
        self.invoker.cancel();

        let snapshot = self.snapshot(now).await?;
        self.remove_expired(&snapshot.expired).await;

        // Expirações além de Duration::MAX contam como "sem expiração"
        let timeout = time_until_expiry(snapshot.survivor.as_ref(), now)
            .and_then(|ttl| Duration::try_from_secs_f64(ttl.max(0.0)).ok())
            .or(self.config.idle_timeout);

        self.passes += 1;
        debug!(
            "passe {}: sobrevivente {:?}, próximo timeout {timeout:?}",
            self.passes,
            snapshot.survivor.as_ref().map(Package::payload)
        );
        self.invoker.start(snapshot.survivor);
        Ok(timeout)
    }

    async fn snapshot(&self, now: f64) -> KamikazeResult<QueueSnapshot> {
        let entries = self.store.scan(&self.config.key).await?;
        Ok(evaluate(entries, now, self.config.priority)?)
    }

    /// Remove expirados em lote. Falhas só são registradas; o próximo passe
    /// vai encontrá-los expirados de novo.
    async fn remove_expired(&self, packages: &[Package]) {
        if packages.is_empty() {
            return;
        }

        let listed = packages
            .iter()
            .map(Package::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        info!("removendo pacotes de \"{}\": [{listed}]", self.config.key);

        let members: Vec<String> = packages.iter().map(|p| p.raw_entry().to_string()).collect();
        if let Err(e) = self.store.remove(&self.config.key, &members).await {
            error!("falha ao remover pacotes expirados: {e}");
        }
    }
}

async fn sleep_for(timeout: Option<Duration>) {
    match timeout {
        Some(d) => sleep(d).await,
        None => std::future::pending().await,
    }
}
