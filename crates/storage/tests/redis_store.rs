use tokio::net::TcpListener;
use tokio::time::{Duration, timeout};

use kamikaze_common::{CHANGE_MESSAGE, DEFAULT_KEY, StoreError};
use kamikaze_protocol::{Command, Frame, PushMessage, ScanPage};
use kamikaze_storage::{Connection, EntryStore, MemoryStore, RedisStore, Subscriber};

/// Servidor RESP mínimo sobre um [`MemoryStore`], com o suficiente para o cliente.
///
/// As páginas do ZSCAN repetem o último membro da página anterior, como o
/// Redis pode fazer durante um rehash.
async fn start_server() -> (u16, MemoryStore) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let store = MemoryStore::new();

    let db = store.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::spawn(serve(Connection::new(socket), db.clone()));
        }
    });

    (port, store)
}

async fn serve(mut conn: Connection, db: MemoryStore) {
    while let Ok(Some(frame)) = conn.read_frame().await {
        let reply = match Command::from_frame(frame) {
            Ok(Command::Ping) => Frame::Simple("PONG".into()),
            Ok(Command::ZAdd { key, .. }) if key == "readonly" => {
                Frame::Error("READONLY You can't write against a read only replica.".into())
            }
            Ok(Command::ZAdd { key, score, member }) => {
                db.add(&key, score, &member).await.unwrap();
                Frame::Integer(1)
            }
            Ok(Command::ZRem { key, members }) => {
                Frame::Integer(db.remove(&key, &members).await.unwrap() as i64)
            }
            Ok(Command::ZScan { key, cursor, count }) => {
                let entries = db.scan(&key).await.unwrap();
                let start = cursor as usize;
                let end = (start + count.unwrap_or(10)).min(entries.len());
                let next = if end >= entries.len() { 0 } else { end as u64 };
                ScanPage {
                    cursor: next,
                    entries: entries[start.saturating_sub(1)..end].to_vec(),
                }
                .to_frame()
            }
            Ok(Command::Publish { channel, message }) => {
                let message = String::from_utf8_lossy(&message);
                Frame::Integer(db.publish(&channel, &message).await.unwrap() as i64)
            }
            Ok(Command::Subscribe(channels)) => {
                let channel = channels[0].clone();
                let mut sub = db.subscribe(&channel).await.unwrap();
                let ack = PushMessage::Subscribed {
                    channel: channel.clone(),
                    count: 1,
                };
                if conn.write_frame(&ack.to_frame()).await.is_err() {
                    return;
                }
                while let Ok(payload) = sub.next_message().await {
                    let msg = PushMessage::Message {
                        channel: channel.clone(),
                        payload,
                    };
                    if conn.write_frame(&msg.to_frame()).await.is_err() {
                        return;
                    }
                }
                return;
            }
            Err(e) => Frame::Error(format!("ERR {e}")),
        };

        if conn.write_frame(&reply).await.is_err() {
            return;
        }
    }
}

#[tokio::test]
async fn ping_pong() {
    let (port, _) = start_server().await;
    let store = RedisStore::connect("127.0.0.1", port).await.unwrap();

    store.ping().await.unwrap();
    assert_eq!(store.addr(), format!("127.0.0.1:{port}"));
}

#[tokio::test]
async fn add_then_scan() {
    let (port, db) = start_server().await;
    let store = RedisStore::connect("127.0.0.1", port).await.unwrap();

    store.add(DEFAULT_KEY, 3.0, "21.0:red").await.unwrap();
    store.add(DEFAULT_KEY, 1.0, "12.0:yellow").await.unwrap();
    store.add(DEFAULT_KEY, f64::INFINITY, ":forever").await.unwrap();

    assert_eq!(db.len(DEFAULT_KEY), 3);
    assert_eq!(
        store.scan(DEFAULT_KEY).await.unwrap(),
        vec![
            ("12.0:yellow".to_string(), 1.0),
            ("21.0:red".to_string(), 3.0),
            (":forever".to_string(), f64::INFINITY),
        ]
    );
}

#[tokio::test]
async fn scan_follows_cursor_and_drops_duplicates() {
    let (port, db) = start_server().await;
    for i in 0..250 {
        db.add(DEFAULT_KEY, i as f64, &format!(":package-{i}")).await.unwrap();
    }
    let store = RedisStore::connect("127.0.0.1", port).await.unwrap();

    let entries = store.scan(DEFAULT_KEY).await.unwrap();

    assert_eq!(entries.len(), 250);
    assert_eq!(entries[0], (":package-0".to_string(), 0.0));
    assert_eq!(entries[249], (":package-249".to_string(), 249.0));
}

#[tokio::test]
async fn scan_of_missing_key_is_empty() {
    let (port, _) = start_server().await;
    let store = RedisStore::connect("127.0.0.1", port).await.unwrap();

    assert!(store.scan("nothing-here").await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_counts_existing_members() {
    let (port, db) = start_server().await;
    db.add(DEFAULT_KEY, 1.0, "10.0:cactus").await.unwrap();
    db.add(DEFAULT_KEY, 2.0, "10.0:chairs").await.unwrap();
    let store = RedisStore::connect("127.0.0.1", port).await.unwrap();

    let removed = store
        .remove(DEFAULT_KEY, &["10.0:cactus".to_string(), "10.0:ghost".to_string()])
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert_eq!(store.remove(DEFAULT_KEY, &[]).await.unwrap(), 0);
    assert_eq!(db.len(DEFAULT_KEY), 1);
}

#[tokio::test]
async fn publish_reaches_subscriber() {
    let (port, _) = start_server().await;
    let store = RedisStore::connect("127.0.0.1", port).await.unwrap();
    let mut sub = store.subscribe(DEFAULT_KEY).await.unwrap();

    assert_eq!(store.publish(DEFAULT_KEY, CHANGE_MESSAGE).await.unwrap(), 1);
    assert_eq!(store.publish("other", CHANGE_MESSAGE).await.unwrap(), 0);

    let msg = timeout(Duration::from_secs(1), sub.next_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg, CHANGE_MESSAGE);
}

#[tokio::test]
async fn next_message_survives_cancellation() {
    let (port, _) = start_server().await;
    let store = RedisStore::connect("127.0.0.1", port).await.unwrap();
    let mut sub = store.subscribe(DEFAULT_KEY).await.unwrap();

    // Timeout descarta a future sem perder a próxima mensagem
    assert!(timeout(Duration::from_millis(20), sub.next_message()).await.is_err());

    store.publish(DEFAULT_KEY, "after-timeout").await.unwrap();
    let msg = timeout(Duration::from_secs(1), sub.next_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg, "after-timeout");
}

#[tokio::test]
async fn server_error_is_reported() {
    let (port, _) = start_server().await;
    let store = RedisStore::connect("127.0.0.1", port).await.unwrap();

    match store.add("readonly", 1.0, ":x").await {
        Err(StoreError::Server(msg)) => assert!(msg.starts_with("READONLY")),
        other => panic!("esperado erro do servidor, recebido {other:?}"),
    }

    // A conexão continua utilizável depois de um erro
    store.ping().await.unwrap();
}

#[tokio::test]
async fn connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    assert!(matches!(
        RedisStore::connect("127.0.0.1", port).await,
        Err(StoreError::Io(_))
    ));
}
