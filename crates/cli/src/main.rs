mod output;

use std::io::IsTerminal;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kamikaze_common::{DEFAULT_HOST, DEFAULT_KEY, DEFAULT_PORT, unix_now};
use kamikaze_service::{
    BUILTIN_CONSUMERS, ConsumerArgs, NotificationService, PriorityOrder, ServiceConfig,
    builtin_consumer, operations,
};
use kamikaze_storage::RedisStore;

#[derive(Parser, Debug)]
#[command(name = "kamikaze", about = "Kamikaze: fila de prioridade de pacotes com prazo de validade")]
struct Args {
    /// Nível de log padrão; RUST_LOG tem precedência
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
    #[arg(long, env = "KAMIKAZE_REDIS_HOST", default_value = DEFAULT_HOST, global = true)]
    redis_host: String,
    #[arg(long, env = "KAMIKAZE_REDIS_PORT", default_value_t = DEFAULT_PORT, global = true)]
    redis_port: u16,
    /// Sorted set e canal de notificações
    #[arg(long, env = "KAMIKAZE_KEY", default_value = DEFAULT_KEY, global = true)]
    key: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Roda o serviço de notificação até receber ctrl-c
    Service {
        /// Consumer embutido: log, sleep ou exec
        #[arg(long)]
        consumer: String,
        /// Objeto JSON repassado ao consumer a cada invocação
        #[arg(long, value_name = "JSON", default_value = "{}")]
        consumer_args: String,
        /// Espera máxima quando nenhum pacote vivo expira
        #[arg(long, value_name = "SECS")]
        idle_timeout: Option<f64>,
        #[arg(long, default_value = "lowest")]
        priority: PriorityOrder,
    },
    /// Coloca um pacote na fila
    Push {
        payload: String,
        /// Segundos até expirar; sem ttl o pacote não expira
        #[arg(long, value_name = "SECS")]
        ttl: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        priority: f64,
    },
    /// Remove todos os pacotes com o payload dado
    Remove { payload: String },
    /// Lista a fila na ordem de prioridade
    List {
        #[arg(long, default_value = "lowest")]
        priority: PriorityOrder,
    },
    /// Mostra a versão
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_level.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Cmd::Service {
            ref consumer,
            ref consumer_args,
            idle_timeout,
            priority,
        } => {
            let consumer_args = parse_consumer_args(consumer_args)?;
            let idle_timeout = idle_timeout
                .map(Duration::try_from_secs_f64)
                .transpose()
                .context("--idle-timeout inválido")?;
            let config = ServiceConfig {
                key: args.key.clone(),
                idle_timeout,
                priority,
                ..ServiceConfig::default()
            };
            run_service(&args, consumer, consumer_args, config).await?;
        }
        Cmd::Push {
            ref payload,
            ttl,
            priority,
        } => {
            let store = connect(&args).await?;
            let package = operations::push(&store, &args.key, payload, ttl, priority).await?;
            info!("inserido {package}");
        }
        Cmd::Remove { ref payload } => {
            let store = connect(&args).await?;
            let removed = operations::remove(&store, &args.key, payload).await?;
            info!("{removed} pacote(s) removido(s)");
        }
        Cmd::List { priority } => {
            let store = connect(&args).await?;
            let packages = operations::list(&store, &args.key, priority).await?;
            if packages.is_empty() {
                info!("a fila está vazia");
            }
            let rows = output::package_rows(&packages, unix_now());
            print!("{}", output::render_table(&rows, std::io::stdout().is_terminal()));
        }
        Cmd::Version => println!("kamikaze {}", env!("CARGO_PKG_VERSION")),
    }

    Ok(())
}

async fn connect(args: &Args) -> anyhow::Result<RedisStore> {
    RedisStore::connect(&args.redis_host, args.redis_port)
        .await
        .with_context(|| format!("falha ao conectar a {}:{}", args.redis_host, args.redis_port))
}

async fn run_service(
    args: &Args,
    consumer: &str,
    consumer_args: ConsumerArgs,
    config: ServiceConfig,
) -> anyhow::Result<()> {
    let consumer = builtin_consumer(consumer, &consumer_args)
        .with_context(|| format!("consumers disponíveis: {}", BUILTIN_CONSUMERS.join(", ")))?;
    let store = connect(args).await?;
    info!(
        "serviço iniciado em {} (chave \"{}\", prioridade {})",
        store.addr(),
        config.key,
        config.priority
    );

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal recebido");
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                // Segurar o sender: fechar o canal também encerraria o serviço
                error!("não foi possível escutar ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        }
    });

    NotificationService::new(store, consumer, consumer_args, config)
        .run(&mut shutdown_rx)
        .await?;
    Ok(())
}

fn parse_consumer_args(raw: &str) -> anyhow::Result<ConsumerArgs> {
    match serde_json::from_str(raw).context("--consumer-args não é JSON válido")? {
        Value::Object(map) => Ok(map),
        other => bail!("--consumer-args deve ser um objeto JSON, recebido {other}"),
    }
}
