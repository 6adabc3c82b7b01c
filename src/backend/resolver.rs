//! Gateway to the upstream name database.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// The upstream source of name data, e.g. a JSON-RPC connection to a
/// blockchain daemon.
///
/// The isolation tag is an opaque partition identifier (e.g. a per-stream
/// circuit); sources whose transport cannot partition requests may ignore
/// it.
#[async_trait]
pub trait NameSource: Send + Sync {
    /// Fetches the raw JSON value stored at `key` (e.g. `d/example`).
    async fn name_show(&self, key: &str, isolation: &str) -> Result<String, Error>;

    /// Lists up to `count` `(name, value)` pairs starting at `start`,
    /// in name order. Used only for zone dumps.
    async fn name_scan(&self, start: &str, count: u32) -> Result<Vec<(String, String)>, Error>;
}

/// Wraps a [`NameSource`] with the fake-names table and the deadline
/// guard.
pub(crate) struct Resolver {
    source: Arc<dyn NameSource>,
    fake_names: HashMap<String, String>,
    deadline: Duration,
}

/// Fake-table sentinel for a name that must not resolve.
const FAKE_NX: &str = "NX";

impl Resolver {
    pub(crate) fn new(
        source: Arc<dyn NameSource>,
        fake_names: HashMap<String, String>,
        deadline: Duration,
    ) -> Self {
        Self {
            source,
            fake_names,
            deadline,
        }
    }

    /// Resolves `key` to its raw JSON value.
    ///
    /// The upstream call runs in a background task and is raced against
    /// the deadline and the cancellation token. On deadline or
    /// cancellation the task is orphaned, not awaited; its eventual result
    /// is discarded.
    pub(crate) async fn resolve(
        &self,
        key: &str,
        isolation: &str,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        if let Some(fake) = self.fake_names.get(key) {
            if fake == FAKE_NX {
                return Err(Error::NoSuchDomain);
            }
            return Ok(fake.clone());
        }

        let source = Arc::clone(&self.source);
        let key = key.to_owned();
        let isolation = isolation.to_owned();
        let call = tokio::spawn(async move { source.name_show(&key, &isolation).await });

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = timeout(self.deadline, call) => match outcome {
                Err(_) => Err(Error::Timeout),
                Ok(Err(join_error)) => Err(Error::Upstream(join_error.to_string())),
                Ok(Ok(result)) => result,
            },
        }
    }

    pub(crate) fn source(&self) -> &Arc<dyn NameSource> {
        &self.source
    }
}
