//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - A minimal HTTP stub standing in for the sentence endpoint
//! - In-memory SQLite pools with the `t_poem` table
//! - Helpers to read stored poems back

#![allow(dead_code)]

use poemcron_shared::config::{DbConfig, HttpConfig};
use poemcron_shared::db::pool::connect;
use poemcron_shared::models::poem::NormalizedPoem;
use sqlx::AnyPool;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Body of the reference response
pub const MOON_BODY: &str = r#"{"data":{"content":"明月几时有","origin":{"title":"水调歌头","dynasty":"宋","author":"苏轼","content":["明月几时有","把酒问青天"],"translate":null},"matchTags":["月","思乡"]}}"#;

/// Schema of the poem table as deployed
pub const POEM_SCHEMA: &str = r#"
    CREATE TABLE t_poem (
        "title" TEXT NOT NULL,
        "dynasty" TEXT NOT NULL,
        "author" TEXT NOT NULL,
        "content" TEXT NOT NULL,
        "all" TEXT NOT NULL,
        "translate" TEXT NOT NULL,
        "tag" TEXT NOT NULL
    )
"#;

/// Running HTTP stub
pub struct Stub {
    /// URL to point the fetcher at
    pub url: String,

    /// Raw request heads, one per request served
    pub requests: mpsc::UnboundedReceiver<String>,
}

impl Stub {
    /// HTTP settings pointing at this stub
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            endpoint: self.url.clone(),
            timeout_seconds: 5,
        }
    }
}

/// Serves `body` with `status` (e.g. "200 OK") to every request
pub async fn spawn_stub(status: &'static str, body: &'static str) -> Stub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };

            let tx = tx.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let n = match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    head.extend_from_slice(&buf[..n]);
                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let _ = tx.send(String::from_utf8_lossy(&head).into_owned());

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Stub {
        url: format!("http://{}/sentence", addr),
        requests: rx,
    }
}

/// In-memory SQLite connection settings
pub fn memory_db_config() -> DbConfig {
    DbConfig {
        ip_addr: "localhost".to_string(),
        port: "0".to_string(),
        driver: "sqlite".to_string(),
        user: String::new(),
        pass: String::new(),
        name: ":memory:".to_string(),
        max_connections: 1,
        connect_timeout_seconds: 5,
    }
}

/// Opens an in-memory pool and creates the table with `schema`
pub async fn memory_pool(schema: &str) -> AnyPool {
    let pool = connect(&memory_db_config()).await.unwrap();
    sqlx::query(schema).execute(&pool).await.unwrap();
    pool
}

/// Reads every stored poem back, in insertion order
pub async fn stored_poems(pool: &AnyPool) -> Vec<NormalizedPoem> {
    let rows: Vec<(String, String, String, String, String, String, String)> = sqlx::query_as(
        r#"SELECT "title", "dynasty", "author", "content", "all", "translate", "tag" FROM t_poem ORDER BY rowid"#,
    )
    .fetch_all(pool)
    .await
    .unwrap();

    rows.into_iter()
        .map(|(title, dynasty, author, content, all, translate, tag)| NormalizedPoem {
            title,
            dynasty,
            author,
            content,
            all,
            translate,
            tag,
        })
        .collect()
}
