//! Listener setup and the hyper accept loop.

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use hyper::{
    Body, Request, Server,
    service::{make_service_fn, service_fn},
};
use tokio::net::TcpListener;

use crate::{
    errors::StartupError, sys_config::core::ServerConfig, sys_statichost::handlers::handler_request,
};

const BIND_RETRY: Duration = Duration::from_secs(30);

/// Bind `addr`, retrying with a fixed backoff until it succeeds.
pub async fn bind_with_retry(addr: SocketAddr) -> std::net::TcpListener {
    loop {
        match TcpListener::bind(addr).await.and_then(|ln| ln.into_std()) {
            Ok(ln) => return ln,
            Err(e) => {
                log::warn!("listen on {addr} failed: {e}; retry in {BIND_RETRY:?}");
                tokio::time::sleep(BIND_RETRY).await;
            }
        }
    }
}

/// Serve `config` on `addr` until Ctrl-C.
pub async fn run_server(addr: SocketAddr, config: Arc<ServerConfig>) -> Result<(), StartupError> {
    let listener = bind_with_retry(addr).await;
    serve(listener, config, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: std::net::TcpListener,
    config: Arc<ServerConfig>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), StartupError> {
    let local = listener
        .local_addr()
        .map_err(|e| StartupError::IoError("reading listener address".into(), e))?;

    let make_svc = make_service_fn(move |_conn| {
        let config = config.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let config = config.clone();
                async move { Ok::<_, Infallible>(handler_request(req, &config).await) }
            }))
        }
    });

    log::info!("started up server on {local}");
    Server::from_tcp(listener)?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown)
        .await?;
    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("installing Ctrl-C handler: {e}");
        std::future::pending::<()>().await;
    }
}
