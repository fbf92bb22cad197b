//! Forward local TCP connections through a SOCKS5 tunnel.
//!
//! Each connection accepted on the local listener gets its own tunnel
//! to the same target, and bytes are copied both ways until both sides
//! are done.

use futures::future::FutureExt;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use futures::task::SpawnExt;
use std::io::Result as IoResult;
use tracing::{debug, info, warn};

use tunsocks_client::{ConnectTarget, Socks5Connector};
use tunsocks_rtcompat::{Runtime, TcpListener};

use anyhow::{Context, Result};

/// Size of the buffer each relay direction reads into.
const RELAY_CHUNK: usize = 4096;

/// Handle one connection accepted from `local`: open a tunnel to
/// `target` with `connector`, and start relaying bytes between the two.
///
/// Each direction runs as its own task on `runtime`, so a failure in
/// one never waits on the other.
async fn forward_conn<R, S>(
    runtime: &R,
    connector: Socks5Connector<R>,
    local: S,
    target: ConnectTarget,
) -> Result<()>
where
    R: Runtime,
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let tunnel = connector
        .connect_stream(target.clone())
        .await
        .with_context(|| format!("Couldn't open tunnel to {}", target))?;
    info!("Tunnel to {} is open.", target);

    let (local_r, local_w) = local.split();
    let (tunnel_r, tunnel_w) = tunnel.split();
    let outbound = format!("to {}", target);
    let inbound = format!("from {}", target);
    runtime.spawn(relay(local_r, tunnel_w).map(move |r| relay_done(&outbound, r)))?;
    runtime.spawn(relay(tunnel_r, local_w).map(move |r| relay_done(&inbound, r)))?;
    Ok(())
}

/// Log how one direction of a forwarded connection ended.
fn relay_done(direction: &str, result: IoResult<()>) {
    match result {
        Ok(()) => debug!("Finished relaying {}", direction),
        Err(e) => warn!("Error relaying {}: {}", direction, e),
    }
}

/// Copy bytes from `reader` to `writer` until `reader` reaches EOF.
///
/// Every chunk is flushed as soon as it's written, so interactive
/// traffic isn't held back.  At EOF the writer is closed, passing the
/// half-close along.
async fn relay<R, W>(mut reader: R, mut writer: W) -> IoResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0_u8; RELAY_CHUNK];
    loop {
        let n = reader.read(&mut buf[..]).await?;
        if n == 0 {
            return writer.close().await;
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
    }
}

/// Accept connections on `listener` forever, forwarding each one to
/// `target` through `connector`.
pub(crate) async fn run_forwarder<R: Runtime>(
    runtime: R,
    connector: Socks5Connector<R>,
    listener: R::TcpListener,
    target: ConnectTarget,
) -> Result<()> {
    info!(
        "Forwarding connections on {} to {} through SOCKS proxy at {}",
        listener.local_addr()?,
        target,
        connector.proxy_addr()
    );

    loop {
        let (stream, addr) = listener
            .accept()
            .await
            .context("Failed to receive incoming stream")?;
        debug!("Accepted connection from {}", addr);
        let rt = runtime.clone();
        let connector = connector.clone();
        let target = target.clone();
        runtime.spawn(async move {
            if let Err(e) = forward_conn(&rt, connector, stream, target).await {
                warn!("Connection from {} failed: {:#}", addr, e);
            }
        })?;
    }
}
