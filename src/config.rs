//! Server configuration, loaded from a JSON file at startup.

use crate::error::Error;
use crate::names;
use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_proto::rr::Name;

pub type SharedConfig = Arc<Config>;

/// Runtime configuration. Read-only after construction.
#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// The floating TLD label served by this instance.
    #[serde(default = "default_anchor")]
    pub anchor: String,

    /// FQDNs advertised as the NS set at the apex. When empty, the
    /// synthetic `this.x--nmc.<root>` host is advertised instead and the
    /// meta zone answers for it.
    #[serde(default)]
    pub canonical_nameservers: Vec<String>,

    /// Public IPv4 of this server, used for the synthetic meta-zone A
    /// record when no canonical nameservers are configured.
    #[serde(default)]
    pub self_ip: Option<Ipv4Addr>,

    /// SOA MBOX, as `user@host` or an already-encoded DNS name.
    #[serde(default)]
    pub hostmaster: Option<String>,

    /// Extra A/AAAA records emitted at the apex.
    #[serde(default)]
    pub vanity_ips: Vec<IpAddr>,

    /// Bound on each isolation tag's LRU of parsed values.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Deadline for a single upstream call.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_upstream_timeout", rename = "upstream_timeout_ms")]
    pub upstream_timeout: Duration,

    /// Map of blockchain keys (`d/x`) to raw JSON values, or the sentinel
    /// `"NX"` for a name that should not resolve. Used for testing; lookups
    /// hit this table before the upstream.
    #[serde(default)]
    pub fake_names: HashMap<String, String>,

    /// Initial state of the readiness gate. Leave true unless a startup
    /// synchronizer flips the gate once it completes.
    #[serde(default = "default_true")]
    pub start_ready: bool,

    /// URL of the upstream JSON-RPC interface, e.g. `http://127.0.0.1:8336`.
    #[serde(default)]
    pub rpc_address: Option<String>,
    #[serde(default)]
    pub rpc_username: String,
    #[serde(default)]
    pub rpc_password: String,

    pub dns_udp_bind_addr: SocketAddr,
    pub dns_tcp_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_dns_tcp_timeout", rename = "dns_tcp_timeout_s")]
    pub dns_tcp_timeout: Duration,

    /// Bind address of the read-only status console; disabled when absent.
    #[serde(default)]
    pub api_bind_addr: Option<SocketAddr>,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_api_timeout", rename = "api_timeout_s")]
    pub api_timeout: Duration,
}

fn default_anchor() -> String {
    "bit".to_owned()
}

fn default_cache_max_entries() -> usize {
    100
}

fn default_upstream_timeout() -> Duration {
    Duration::from_millis(1500)
}

fn default_dns_tcp_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJson`] for malformed JSON, [`Error::Io`] if
    /// the path can't be read, and [`Error::Config`] when a value fails
    /// validation (bad anchor label, unusable hostmaster, invalid
    /// nameserver name).
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.validate()?;
        Ok(conf)
    }

    fn validate(&self) -> Result<(), Error> {
        if !names::is_owner_label(&self.anchor) {
            return Err(Error::Config(format!(
                "anchor is not a valid label: {:?}",
                self.anchor
            )));
        }
        for ns in &self.canonical_nameservers {
            if !names::is_host_name(ns) {
                return Err(Error::Config(format!(
                    "canonical nameserver is not a valid host name: {ns:?}"
                )));
            }
        }
        // Reject a bad hostmaster at startup rather than at SOA synthesis.
        self.soa_mbox()?;
        Ok(())
    }

    /// The normalized SOA MBOX name. `user@host` becomes `user.host.` with
    /// dots in the user part escaped; a plain host name is used as-is; no
    /// hostmaster yields the root name.
    pub fn soa_mbox(&self) -> Result<Name, Error> {
        let raw = match &self.hostmaster {
            None => return Ok(Name::root()),
            Some(raw) => raw,
        };
        let mbox = match raw.split_once('@') {
            Some((user, host)) => {
                if user.is_empty() || !names::is_host_name(host) {
                    return Err(Error::Config(format!("unusable hostmaster: {raw:?}")));
                }
                let user = user.replace('.', "\\.");
                Cow::Owned(format!("{}.{}", user, names::absname(host)))
            }
            None => {
                if !names::is_host_name(raw) {
                    return Err(Error::Config(format!("unusable hostmaster: {raw:?}")));
                }
                Cow::Owned(names::absname(raw))
            }
        };
        Name::from_str(&mbox).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(hostmaster: Option<&str>) -> Config {
        let mut conf: Config = serde_json::from_value(serde_json::json!({
            "dns_udp_bind_addr": "127.0.0.1:5353",
            "dns_tcp_bind_addr": "127.0.0.1:5353",
        }))
        .unwrap();
        conf.hostmaster = hostmaster.map(str::to_owned);
        conf
    }

    #[test]
    fn defaults() {
        let conf = base_config(None);
        assert_eq!(conf.anchor, "bit");
        assert_eq!(conf.cache_max_entries, 100);
        assert_eq!(conf.upstream_timeout, Duration::from_millis(1500));
        assert!(conf.start_ready);
        assert!(conf.canonical_nameservers.is_empty());
        conf.validate().unwrap();
    }

    #[test]
    fn hostmaster_email_normalization() {
        let conf = base_config(Some("hostmaster@example.com"));
        let mbox = conf.soa_mbox().unwrap();
        assert_eq!(mbox, Name::from_ascii("hostmaster.example.com.").unwrap());
        assert!(mbox.is_fqdn());
    }

    #[test]
    fn hostmaster_plain_host() {
        let conf = base_config(Some("hostmaster.example.com"));
        assert_eq!(
            conf.soa_mbox().unwrap(),
            Name::from_ascii("hostmaster.example.com.").unwrap()
        );
    }

    #[test]
    fn hostmaster_dotted_user_is_escaped() {
        let conf = base_config(Some("host.master@example.com"));
        let mbox = conf.soa_mbox().unwrap();
        // the escaped dot keeps the user part a single label
        assert_eq!(mbox.num_labels(), 3);
    }

    #[test]
    fn hostmaster_missing_defaults_to_root() {
        let conf = base_config(None);
        assert_eq!(conf.soa_mbox().unwrap(), Name::root());
    }

    #[test]
    fn hostmaster_rejects_garbage() {
        assert!(base_config(Some("@@")).validate().is_err());
        assert!(base_config(Some("not valid")).validate().is_err());
    }

    #[test]
    fn rejects_bad_anchor() {
        let mut conf = base_config(None);
        conf.anchor = "not.a.label".to_owned();
        assert!(conf.validate().is_err());
    }

    #[test]
    fn rejects_bad_nameserver() {
        let mut conf = base_config(None);
        conf.canonical_nameservers = vec!["-bad-.example.".to_owned()];
        assert!(conf.validate().is_err());
    }
}
