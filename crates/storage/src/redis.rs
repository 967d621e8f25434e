use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info};

use kamikaze_common::{ProtocolError, SCAN_COUNT, StoreError, StoreResult};
use kamikaze_protocol::{Command, Frame, PushMessage, ScanPage};

use crate::connection::Connection;
use crate::store::{EntryStore, Subscriber};

/// Cliente Redis (RESP2) usado como backend da fila.
///
/// Comandos passam por uma única conexão serializada; cada inscrição abre a
/// sua própria conexão, já que uma conexão em modo subscribe não aceita
/// outros comandos.
pub struct RedisStore {
    addr: String,
    conn: Mutex<Connection>,
}

impl RedisStore {
    pub async fn connect(host: &str, port: u16) -> StoreResult<Self> {
        let addr = format!("{host}:{port}");
        info!("conectando a {addr}");
        let conn = Connection::connect(&addr).await?;
        Ok(Self {
            addr,
            conn: Mutex::new(conn),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn ping(&self) -> StoreResult<()> {
        match self.request(&Command::Ping).await? {
            Frame::Simple(s) if s == "PONG" => Ok(()),
            other => Err(unexpected("PING", &other)),
        }
    }

    /// Envia um comando e aguarda a resposta. Erros RESP viram `StoreError::Server`.
    async fn request(&self, cmd: &Command) -> StoreResult<Frame> {
        let mut conn = self.conn.lock().await;
        conn.write_frame(&cmd.to_frame()).await?;
        match conn.read_frame().await? {
            Some(Frame::Error(msg)) => Err(StoreError::Server(msg)),
            Some(frame) => Ok(frame),
            None => Err(StoreError::ConnectionClosed),
        }
    }

    async fn request_integer(&self, name: &str, cmd: &Command) -> StoreResult<i64> {
        match self.request(cmd).await? {
            Frame::Integer(n) => Ok(n),
            other => Err(unexpected(name, &other)),
        }
    }
}

#[async_trait]
impl EntryStore for RedisStore {
    type Subscriber = RedisSubscriber;

    async fn scan(&self, key: &str) -> StoreResult<Vec<(String, f64)>> {
        let mut entries = Vec::new();
        // ZSCAN pode repetir um membro entre páginas
        let mut seen = HashSet::new();
        let mut cursor = 0;

        loop {
            let cmd = Command::ZScan {
                key: key.to_string(),
                cursor,
                count: Some(SCAN_COUNT),
            };
            let page = ScanPage::from_frame(self.request(&cmd).await?)?;
            for (member, score) in page.entries {
                if seen.insert(member.clone()) {
                    entries.push((member, score));
                }
            }
            if page.cursor == 0 {
                break;
            }
            cursor = page.cursor;
        }

        debug!("ZSCAN {key}: {} entradas", entries.len());
        Ok(entries)
    }

    async fn add(&self, key: &str, score: f64, member: &str) -> StoreResult<()> {
        let cmd = Command::ZAdd {
            key: key.to_string(),
            score,
            member: member.to_string(),
        };
        self.request_integer("ZADD", &cmd).await?;
        Ok(())
    }

    async fn remove(&self, key: &str, members: &[String]) -> StoreResult<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let cmd = Command::ZRem {
            key: key.to_string(),
            members: members.to_vec(),
        };
        let n = self.request_integer("ZREM", &cmd).await?;
        Ok(n.max(0) as usize)
    }

    async fn publish(&self, channel: &str, message: &str) -> StoreResult<usize> {
        let cmd = Command::Publish {
            channel: channel.to_string(),
            message: Bytes::from(message.to_string()),
        };
        let n = self.request_integer("PUBLISH", &cmd).await?;
        Ok(n.max(0) as usize)
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<RedisSubscriber> {
        info!("inscrevendo no canal \"{channel}\"");
        let mut conn = Connection::connect(&self.addr).await?;
        conn.write_frame(&Command::Subscribe(vec![channel.to_string()]).to_frame())
            .await?;

        // Aguardar confirmação: ["subscribe", canal, n]
        match conn.read_frame().await? {
            Some(Frame::Error(msg)) => return Err(StoreError::Server(msg)),
            Some(frame) => match PushMessage::from_frame(frame)? {
                PushMessage::Subscribed { channel: ch, .. } if ch == channel => {}
                other => {
                    return Err(ProtocolError::UnexpectedReply(format!(
                        "confirmação de SUBSCRIBE esperada, recebido {other:?}"
                    ))
                    .into());
                }
            },
            None => return Err(StoreError::ConnectionClosed),
        }

        Ok(RedisSubscriber {
            channel: channel.to_string(),
            conn,
        })
    }
}

/// Conexão dedicada em modo subscribe.
pub struct RedisSubscriber {
    channel: String,
    conn: Connection,
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    async fn next_message(&mut self) -> StoreResult<String> {
        loop {
            let frame = match self.conn.read_frame().await? {
                Some(frame) => frame,
                None => return Err(StoreError::SubscriptionClosed(self.channel.clone())),
            };
            match PushMessage::from_frame(frame)? {
                PushMessage::Message { channel, payload } if channel == self.channel => {
                    return Ok(payload);
                }
                other => debug!("ignorando push no modo subscribe: {other:?}"),
            }
        }
    }
}

fn unexpected(name: &str, frame: &Frame) -> StoreError {
    ProtocolError::UnexpectedReply(format!("{name}: {frame:?}")).into()
}
