use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nmcdns::backend::NameSource;
use nmcdns::namecoin;
use nmcdns::{Backend, Config, SharedConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut args = std::env::args();
    let program_name = args.next().unwrap_or("nmcdns".to_string());
    let mut config_file = None;
    let mut dump_zone = false;
    for arg in args {
        if arg == "--dump-zone" {
            dump_zone = true;
        } else {
            config_file = Some(arg);
        }
    }

    let config = config_init(&program_name, config_file)?;
    let source: Arc<dyn NameSource> = Arc::new(namecoin::Client::from_config(&config)?);

    if dump_zone {
        let mut stdout = std::io::stdout().lock();
        nmcdns::dump::dump_zone(&source, &config.anchor, &mut stdout).await?;
        return Ok(());
    }

    let backend = Arc::new(Backend::new(config.clone(), source));
    if !backend.is_ready() {
        tracing::warn!("starting with the readiness gate closed; lookups fail until it opens");
    }

    tracing::info!("DNS listening on UDP {}", &config.dns_udp_bind_addr);
    tracing::info!("DNS listening on TCP {}", &config.dns_tcp_bind_addr);
    let dns_server = nmcdns::dns::server::new(config.clone(), backend.clone()).await?;
    let dns_handle = tokio::spawn(dns_server.block_until_done());

    let api_handle = match config.api_bind_addr {
        Some(bind_addr) => {
            tracing::info!("status console listening on {bind_addr}");
            Some(tokio::spawn(nmcdns::api::server::new(
                config.clone(),
                backend.clone(),
                bind_addr,
            )))
        }
        None => None,
    };

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        Ok(dns_res) = dns_handle => {
            dns_res?;
        }
        Ok(api_res) = wait_api(api_handle) => {
            api_res?;
        }
    }
    tracing::info!("goodbye");
    Ok(())
}

async fn wait_api(
    handle: Option<tokio::task::JoinHandle<hyper::Result<()>>>,
) -> Result<hyper::Result<()>, tokio::task::JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nmcdns=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!(
            "usage: {program_name} /path/to/config.json [--dump-zone]"
        )),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file)?;
            tracing::debug!("loaded config from {config_file}");
            Ok(Arc::new(config))
        }
    }
}
