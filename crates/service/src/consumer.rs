use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use kamikaze_common::ConsumerError;
use kamikaze_storage::Package;

/// Argumentos nomeados repassados sem alteração a cada invocação.
pub type ConsumerArgs = Map<String, Value>;

/// Consumer que roda até o fim dentro do passe de reconciliação.
///
/// `None` significa "fila vazia", não um erro.
pub trait SyncConsumer: Send + Sync {
    fn consume(&self, package: Option<&Package>, args: &ConsumerArgs) -> Result<(), ConsumerError>;
}

/// Consumer executado como task própria e cancelável.
///
/// O cancelamento descarta a future no próximo ponto de suspensão, então
/// implementações devem ceder com frequência.
#[async_trait]
pub trait AsyncConsumer: Send + Sync {
    async fn consume(&self, package: Option<&Package>, args: &ConsumerArgs)
    -> Result<(), ConsumerError>;
}

/// Capacidade do consumer, escolhida na inicialização.
#[derive(Clone)]
pub enum Consumer {
    Sync(Arc<dyn SyncConsumer>),
    Async(Arc<dyn AsyncConsumer>),
}

impl Consumer {
    pub fn sync(consumer: impl SyncConsumer + 'static) -> Self {
        Consumer::Sync(Arc::new(consumer))
    }

    pub fn cancellable(consumer: impl AsyncConsumer + 'static) -> Self {
        Consumer::Async(Arc::new(consumer))
    }
}

/// Mantém no máximo uma invocação "corrente" do consumer.
pub struct ConsumerInvoker {
    consumer: Consumer,
    args: Arc<ConsumerArgs>,
    current: Option<JoinHandle<()>>,
}

impl ConsumerInvoker {
    pub fn new(consumer: Consumer, args: ConsumerArgs) -> Self {
        Self {
            consumer,
            args: Arc::new(args),
            current: None,
        }
    }

    /// Pede o cancelamento da task corrente sem esperar que termine.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take()
            && !handle.is_finished()
        {
            debug!("cancelando consumer em execução");
            handle.abort();
        }
    }

    /// Inicia uma nova invocação, substituindo a anterior.
    pub fn start(&mut self, package: Option<Package>) {
        self.cancel();

        match &self.consumer {
            Consumer::Sync(consumer) => {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    consumer.consume(package.as_ref(), &self.args)
                }));
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("consumer falhou: {e}"),
                    Err(panic) => warn!("consumer entrou em pânico: {}", panic_message(&*panic)),
                }
            }
            Consumer::Async(consumer) => {
                let consumer = consumer.clone();
                let args = self.args.clone();
                self.current = Some(tokio::spawn(async move {
                    if let Err(e) = consumer.consume(package.as_ref(), &args).await {
                        warn!("consumer falhou: {e}");
                    }
                }));
            }
        }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ConsumerInvoker {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "pânico sem mensagem".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Duration, sleep};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Option<String>>>,
    }

    impl SyncConsumer for Arc<Recorder> {
        fn consume(&self, package: Option<&Package>, _: &ConsumerArgs) -> Result<(), ConsumerError> {
            self.seen
                .lock()
                .unwrap()
                .push(package.map(|p| p.payload().to_string()));
            Ok(())
        }
    }

    struct Panicking;

    impl SyncConsumer for Panicking {
        fn consume(&self, _: Option<&Package>, _: &ConsumerArgs) -> Result<(), ConsumerError> {
            panic!("boom");
        }
    }

    /// Conta quantas invocações terminaram e quantas foram canceladas.
    #[derive(Default)]
    struct Slow {
        finished: AtomicUsize,
        cancelled: Arc<AtomicUsize>,
    }

    struct CancelGuard(Option<Arc<AtomicUsize>>);

    impl Drop for CancelGuard {
        fn drop(&mut self) {
            if let Some(counter) = self.0.take() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl AsyncConsumer for Arc<Slow> {
        async fn consume(&self, _: Option<&Package>, args: &ConsumerArgs) -> Result<(), ConsumerError> {
            let mut guard = CancelGuard(Some(self.cancelled.clone()));
            let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(0);
            sleep(Duration::from_millis(ms)).await;
            guard.0 = None;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn args(ms: u64) -> ConsumerArgs {
        let mut args = ConsumerArgs::new();
        args.insert("ms".into(), Value::from(ms));
        args
    }

    #[test]
    fn sync_consumer_runs_inline() {
        let recorder = Arc::new(Recorder::default());
        let mut invoker = ConsumerInvoker::new(Consumer::sync(recorder.clone()), ConsumerArgs::new());

        invoker.start(Some(Package::new("red", None, 3.0)));
        invoker.start(None);

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![Some("red".to_string()), None]
        );
        assert!(!invoker.is_running());
    }

    #[test]
    fn sync_consumer_panic_is_contained() {
        let mut invoker = ConsumerInvoker::new(Consumer::sync(Panicking), ConsumerArgs::new());
        invoker.start(None);
        invoker.start(None);
    }

    #[tokio::test]
    async fn starting_again_cancels_the_running_task() {
        let slow = Arc::new(Slow::default());
        let mut invoker = ConsumerInvoker::new(Consumer::cancellable(slow.clone()), args(5_000));

        invoker.start(Some(Package::new("red", None, 3.0)));
        sleep(Duration::from_millis(20)).await;
        assert!(invoker.is_running());

        invoker.start(Some(Package::new("red", None, 3.0)));
        sleep(Duration::from_millis(20)).await;

        assert_eq!(slow.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(slow.finished.load(Ordering::SeqCst), 0);
        assert!(invoker.is_running());

        invoker.cancel();
        sleep(Duration::from_millis(20)).await;
        assert_eq!(slow.cancelled.load(Ordering::SeqCst), 2);
        assert!(!invoker.is_running());
    }

    #[tokio::test]
    async fn finished_task_is_not_cancelled() {
        let slow = Arc::new(Slow::default());
        let mut invoker = ConsumerInvoker::new(Consumer::cancellable(slow.clone()), args(0));

        invoker.start(None);
        sleep(Duration::from_millis(20)).await;
        invoker.cancel();

        assert_eq!(slow.finished.load(Ordering::SeqCst), 1);
        assert_eq!(slow.cancelled.load(Ordering::SeqCst), 0);
    }
}
