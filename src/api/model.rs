use serde::Serialize;

/// Body of `GET /info`.
#[derive(Serialize, Debug, Clone)]
pub(super) struct ServerInfo {
    pub version: &'static str,
    pub anchor: String,
    pub ready: bool,
    pub cache_entries: usize,
    pub uptime_secs: u64,
}

/// Body of `GET /lookup`: synthesized records in presentation form.
#[derive(Serialize, Debug, Clone, Default)]
pub(super) struct LookupResult {
    pub name: String,
    pub records: Vec<String>,
}
