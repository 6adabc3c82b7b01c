use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::api::routes;
use crate::backend::Backend;
use crate::config::SharedConfig;

#[derive(Clone)]
pub(super) struct AppState {
    pub config: SharedConfig,
    pub backend: Arc<Backend>,
    pub started: Instant,
}

pub fn new(
    config: SharedConfig,
    backend: Arc<Backend>,
    bind_addr: SocketAddr,
) -> impl Future<Output = hyper::Result<()>> {
    axum::Server::bind(&bind_addr).serve(
        routes::new(AppState {
            config,
            backend,
            started: Instant::now(),
        })
        .into_make_service(),
    )
}
