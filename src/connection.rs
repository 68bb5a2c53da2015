// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connection I/O: accepts TCP connections and drives each one's
//! line-framed read/write loop, grounded on the source's split-halves
//! connection task pattern (owned read/write halves, a cancellation
//! token per connection, `tokio::select!` between cancellation and
//! I/O). The hub's shared state is serialized behind a single
//! `tokio::sync::Mutex` rather than the source's internal event loop —
//! a deliberate adaptation to an async-task-per-connection transport
//! (see DESIGN.md).

use std::{net::SocketAddr, sync::Arc};

use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::Mutex,
    time::{self, Duration},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    error::DisconnectReason,
    hub::HubController,
    models::{
        command::Command,
        status::{Status, StatusCode},
    },
};

/// How often a connection checks for commands the hub queued on its
/// behalf as a result of other connections' traffic.
const OUTBOUND_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Maximum line length accepted before the line is considered
/// malformed regardless of what `Config::network::max_line_length`
/// allows, guarding against an unbounded read into memory.
const READ_BUFFER_HEADROOM: usize = 4096;

pub async fn run(bind_addr: SocketAddr, hub: Arc<Mutex<HubController>>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "listening");
    let cancel = CancellationToken::new();

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            },
        };
        let hub = hub.clone();
        let token = cancel.child_token();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, hub, token).await {
                warn!(%peer, %err, "connection task ended with error");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    hub: Arc<Mutex<HubController>>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    stream.set_nodelay(true).ok();
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let max_line_length = hub.lock().await.config().network.max_line_length;
    let sid = {
        let mut guard = hub.lock().await;
        match guard.accept() {
            Ok(sid) => sid,
            Err(_) => {
                let status = Status::from_config(StatusCode::HubFull, guard.config()).to_command();
                drop(guard);
                write_command(&mut writer, &status).await.ok();
                return Ok(());
            },
        }
    };
    info!(sid = %sid, "connection accepted");

    let mut line = Vec::with_capacity(256);
    loop {
        line.clear();
        let read_result = tokio::select! {
            _ = cancel.cancelled() => {
                break;
            },
            _ = time::sleep(OUTBOUND_POLL_INTERVAL) => {
                let outbound = hub.lock().await.drain_outbound(sid);
                for command in &outbound {
                    write_command(&mut writer, command).await?;
                }
                continue;
            },
            result = read_line_capped(&mut reader, &mut line, max_line_length + READ_BUFFER_HEADROOM) => result,
        };

        let Some(n) = read_result? else {
            hub.lock().await.disconnect(sid, DisconnectReason::ClientClosed);
            break;
        };
        if n == 0 {
            hub.lock().await.disconnect(sid, DisconnectReason::ClientClosed);
            break;
        }
        while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
            line.pop();
        }

        let result = hub.lock().await.handle_line(sid, &line);
        for command in &result.outbound {
            write_command(&mut writer, command).await?;
        }
        if let Some(reason) = result.disconnect {
            hub.lock().await.disconnect(sid, reason);
            break;
        }
    }

    Ok(())
}

/// Reads one `\n`-terminated line, refusing to grow the buffer past
/// `cap` bytes. Returns `Ok(None)` on a clean EOF with no bytes read.
async fn read_line_capped(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    line: &mut Vec<u8>,
    cap: usize,
) -> anyhow::Result<Option<usize>> {
    use tokio::io::AsyncBufReadExt;

    let mut total = 0usize;
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(if total == 0 { None } else { Some(total) });
        }
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..=pos]);
            total += pos + 1;
            reader.consume(pos + 1);
            return Ok(Some(total));
        }
        let take = buf.len().min(cap.saturating_sub(line.len()).max(1));
        line.extend_from_slice(&buf[..take]);
        total += take;
        reader.consume(take);
        if line.len() >= cap {
            return Ok(Some(total));
        }
    }
}

async fn write_command(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    command: &Command,
) -> anyhow::Result<()> {
    writer.write_all(&command.to_bytes()).await?;
    writer.write_all(b"\n").await?;
    Ok(())
}
