//! Server Lifecycle (C11): bind, serve, and graceful shutdown with a hard
//! deadline (spec §4.11). Grounded on the teacher's
//! `start_http_server()`/`shutdown_signal()` pair in `startup.rs`.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use socket2::{Domain, Socket, TcpKeepalive, Type};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Keep-alive for accepted connections, per spec §4.11.
const KEEP_ALIVE: Duration = Duration::from_secs(30);
/// Hard deadline for draining in-flight requests once shutdown begins.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// Binds `addr` with `SO_KEEPALIVE` enabled and a 30-second idle time, then
/// serves `app` until SIGINT/SIGTERM, waiting up to `SHUTDOWN_DEADLINE` for
/// in-flight requests to finish before returning.
pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = bind_with_keepalive(addr)?;
    tracing::info!(%addr, keep_alive_secs = KEEP_ALIVE.as_secs(), "listening");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_DEADLINE, server).await {
        Ok(Ok(Ok(()))) => {
            tracing::info!("server shutdown complete");
            Ok(())
        }
        Ok(Ok(Err(e))) => Err(e.into()),
        Ok(Err(join_err)) => Err(join_err.into()),
        Err(_) => {
            tracing::warn!("graceful shutdown deadline of {:?} exceeded, forcing exit", SHUTDOWN_DEADLINE);
            Err(anyhow::anyhow!("graceful shutdown timed out after {:?}", SHUTDOWN_DEADLINE))
        }
    }
}

fn bind_with_keepalive(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(KEEP_ALIVE))?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    Ok(TcpListener::from_std(socket.into())?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
}
