//! Message loop that drives one panel over a line-delimited JSON stream.
//!
//! One task owns the panel. Inbound lines and host completions are both
//! handled on it, so panel state needs no locking. Host queries and reveals
//! run on the blocking pool and report back through a channel in whatever
//! order they finish.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::host::{Host, IncomingCall};
use crate::model::{Location, NodeId};
use crate::presenter::{Effect, Inbound, MessageLevel, Outbound, Panel};

enum Completion<I> {
    Incoming(NodeId, Result<Vec<IncomingCall<I>>>),
    RevealFailed(Location, anyhow::Error),
}

/// Run `panel` until the surface closes it or the inbound stream ends.
pub async fn run_panel<H, P, R, W>(host: Arc<H>, mut panel: P, reader: R, mut writer: W) -> Result<()>
where
    H: Host,
    P: Panel<Item = H::Item>,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Completion<H::Item>>();
    let mut lines = reader.lines();

    tracing::info!(title = panel.title(), "panel opened");

    loop {
        let effects = tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read surface message")? else {
                    tracing::debug!("surface stream closed");
                    panel.dispose();
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Inbound>(&line) {
                    Ok(msg) => panel.on_message(msg),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring malformed surface message");
                        continue;
                    }
                }
            }
            Some(done) = rx.recv() => match done {
                Completion::Incoming(parent, result) => panel.on_incoming_calls(parent, result),
                Completion::RevealFailed(location, e) => {
                    tracing::warn!(uri = %location.uri, error = %format!("{e:#}"), "reveal failed");
                    let msg = Outbound::ShowMessage {
                        level: MessageLevel::Error,
                        message: format!("Cannot open {}: {e:#}", location.uri),
                    };
                    post(&mut writer, &msg).await?;
                    continue;
                }
            },
        };

        for effect in effects {
            match effect {
                Effect::Post(msg) => post(&mut writer, &msg).await?,
                Effect::QueryIncoming { parent, item } => {
                    let host = Arc::clone(&host);
                    let tx = tx.clone();
                    tokio::task::spawn_blocking(move || {
                        let result = host.provide_incoming_calls(&item);
                        // The loop is gone once the panel is disposed; the result is dropped.
                        let _ = tx.send(Completion::Incoming(parent, result));
                    });
                }
                Effect::Reveal(location) => {
                    let host = Arc::clone(&host);
                    let tx = tx.clone();
                    tokio::task::spawn_blocking(move || {
                        if let Err(e) = host.reveal_location(&location) {
                            let _ = tx.send(Completion::RevealFailed(location, e));
                        }
                    });
                }
            }
        }

        if panel.is_disposed() {
            break;
        }
    }

    tracing::info!(title = panel.title(), "panel disposed");
    Ok(())
}

async fn post<W: AsyncWrite + Unpin>(writer: &mut W, msg: &Outbound) -> Result<()> {
    let mut line = serde_json::to_string(msg).context("Failed to encode surface message")?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .context("Failed to write surface message")?;
    writer.flush().await.context("Failed to flush surface message")?;
    Ok(())
}
