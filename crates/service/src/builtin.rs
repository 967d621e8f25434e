use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::{Duration, sleep};
use tracing::info;

use kamikaze_common::ConsumerError;
use kamikaze_storage::Package;

use crate::consumer::{AsyncConsumer, Consumer, ConsumerArgs, SyncConsumer};

pub const BUILTIN_CONSUMERS: &[&str] = &["log", "sleep", "exec"];

const DEFAULT_SLEEP_SECS: u64 = 5;

/// Resolve um consumer embutido pelo nome, validando os argumentos.
pub fn builtin_consumer(name: &str, args: &ConsumerArgs) -> Result<Consumer, ConsumerError> {
    match name {
        "log" => Ok(Consumer::sync(LogConsumer)),
        "sleep" => {
            sleep_secs(args)?;
            Ok(Consumer::cancellable(SleepConsumer))
        }
        "exec" => {
            exec_argv(args)?;
            Ok(Consumer::cancellable(ExecConsumer))
        }
        other => Err(ConsumerError::Unknown(other.to_string())),
    }
}

/// Só registra o pacote corrente.
pub struct LogConsumer;

impl SyncConsumer for LogConsumer {
    fn consume(&self, package: Option<&Package>, _args: &ConsumerArgs) -> Result<(), ConsumerError> {
        match package {
            Some(p) => info!("consumindo {}", p.payload()),
            None => info!("a fila está vazia"),
        }
        Ok(())
    }
}

/// Registra o pacote e "trabalha" por `sleep_time` segundos, um segundo por vez.
pub struct SleepConsumer;

#[async_trait]
impl AsyncConsumer for SleepConsumer {
    async fn consume(&self, package: Option<&Package>, args: &ConsumerArgs) -> Result<(), ConsumerError> {
        match package {
            Some(p) => info!("consumindo {}", p.payload()),
            None => info!("a fila está vazia"),
        }

        for i in 1..=sleep_secs(args)? {
            info!("dormindo {i}");
            sleep(Duration::from_secs(1)).await;
        }

        info!("consumo concluído");
        Ok(())
    }
}

/// Executa um programa externo por pacote; o processo é morto se a
/// invocação for cancelada.
///
/// `command` é o argv; o payload vai como último argumento e os detalhes do
/// pacote em variáveis `KAMIKAZE_*`.
pub struct ExecConsumer;

#[async_trait]
impl AsyncConsumer for ExecConsumer {
    async fn consume(&self, package: Option<&Package>, args: &ConsumerArgs) -> Result<(), ConsumerError> {
        let argv = exec_argv(args)?;
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match package {
            Some(p) => {
                cmd.arg(p.payload())
                    .env("KAMIKAZE_PAYLOAD", p.payload())
                    .env("KAMIKAZE_SCORE", p.score().to_string())
                    .env(
                        "KAMIKAZE_EXPIRE_TIME",
                        p.expire_time().map(|t| t.to_string()).unwrap_or_default(),
                    );
            }
            None => {
                cmd.env("KAMIKAZE_EMPTY", "1");
            }
        }

        let status = cmd
            .status()
            .await
            .map_err(|e| ConsumerError::Failed(format!("{}: {e}", argv[0])))?;
        if status.success() {
            Ok(())
        } else {
            Err(ConsumerError::Failed(format!("{} terminou com {status}", argv[0])))
        }
    }
}

fn sleep_secs(args: &ConsumerArgs) -> Result<u64, ConsumerError> {
    match args.get("sleep_time") {
        None => Ok(DEFAULT_SLEEP_SECS),
        Some(value) => value.as_u64().ok_or_else(|| {
            ConsumerError::InvalidArgument(format!(
                "sleep_time deve ser inteiro não negativo, recebido {value}"
            ))
        }),
    }
}

fn exec_argv(args: &ConsumerArgs) -> Result<Vec<String>, ConsumerError> {
    let invalid = || {
        ConsumerError::InvalidArgument(
            "command deve ser uma lista não vazia de strings".into(),
        )
    };

    let list = args.get("command").and_then(Value::as_array).ok_or_else(invalid)?;
    let argv = list
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(invalid)?;
    if argv.is_empty() {
        return Err(invalid());
    }
    Ok(argv)
}
