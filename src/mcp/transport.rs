//! Newline-delimited JSON-RPC over stdio or TCP.

use crate::mcp::server::McpServer;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Serves requests read line by line from `reader` until EOF.
///
/// Every request runs on its own task; replies go through a single writer
/// task so lines are never interleaved.
pub async fn serve_lines<R, W>(server: Arc<McpServer>, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(line) = rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut requests = JoinSet::new();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        let server = Arc::clone(&server);
        let tx = tx.clone();
        requests.spawn(async move {
            if let Some(reply) = server.handle_line(&line).await
                && tx.send(reply).is_err()
            {
                debug!("Output closed before reply was sent");
            }
        });
        // Reap finished requests so the set does not grow without bound.
        while requests.try_join_next().is_some() {}
    }

    while requests.join_next().await.is_some() {}
    drop(tx);

    writer_task
        .await
        .context("Writer task panicked")?
        .context("Failed to write response")
}

pub async fn serve_stdio(server: Arc<McpServer>) -> Result<()> {
    info!("Serving MCP over stdio");
    let stdin = BufReader::new(tokio::io::stdin());
    serve_lines(server, stdin, tokio::io::stdout()).await?;
    info!("Input closed, shutting down");
    Ok(())
}

/// Accepts connections forever, one task per connection.
pub async fn serve_tcp(server: Arc<McpServer>, host: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    info!("Serving MCP on {}", listener.local_addr()?);
    accept_loop(server, listener).await
}

pub async fn accept_loop(server: Arc<McpServer>, listener: TcpListener) -> Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };
        debug!(%peer, "Connection opened");
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let (read_half, write_half) = stream.into_split();
            match serve_lines(server, BufReader::new(read_half), write_half).await {
                Ok(()) => debug!(%peer, "Connection closed"),
                Err(e) => warn!(%peer, "Connection failed: {:#}", e),
            }
        });
    }
}
