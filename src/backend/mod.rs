//! The zone engine: an abstract zone file over the blockchain name
//! database.
//!
//! An incoming query name is decomposed around the floating anchor label
//! and dispatched: the anchor itself gets apex records (SOA, NS set,
//! vanity addresses), the synthetic `x--nmc` meta zone self-references the
//! server when no canonical nameservers are configured, and everything
//! else resolves through the cache and the upstream into a [`Value`] tree
//! that is walked down to the queried node and synthesized into records.
//!
//! [`Backend::lookup`] is safe to call from many tasks concurrently; the
//! cache mutex is the only shared mutable state and is never held across
//! an upstream call.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use trust_dns_proto::rr::rdata::{A, AAAA, NS, SOA};
use trust_dns_proto::rr::{Name, RData, Record};

use crate::config::SharedConfig;
use crate::domain::synth::DEFAULT_TTL;
use crate::domain::{parse_value, ErrorSink, Value, ValueResolver};
use crate::error::Error;
use crate::names::{self, QnameParts};

mod cache;
pub mod resolver;

pub use resolver::NameSource;

use cache::ValueCache;
use resolver::Resolver;

/// Basename of the synthetic meta zone used for self-reference when no
/// canonical nameserver is configured. The label cannot be registered
/// (double hyphens outside `xn--` fail basename validation), so it never
/// shadows a real name.
const META_BASENAME: &str = "x--nmc";

/// Label under the meta zone that resolves to the server itself.
const META_SELF_LABEL: &str = "this";

/// TTL of apex and meta-zone records.
const APEX_TTL: u32 = 86400;

/// Serves lookups for one floating anchor.
pub struct Backend {
    cfg: SharedConfig,
    resolver: Resolver,
    cache: ValueCache,
    ready: AtomicBool,
}

impl Backend {
    pub fn new(cfg: SharedConfig, source: Arc<dyn NameSource>) -> Self {
        let resolver = Resolver::new(source, cfg.fake_names.clone(), cfg.upstream_timeout);
        let cache = ValueCache::new(cfg.cache_max_entries);
        let ready = AtomicBool::new(cfg.start_ready);
        Self {
            cfg,
            resolver,
            cache,
            ready,
        }
    }

    /// Whether the readiness gate is open. Lookups fail fast with
    /// [`Error::NotReady`] until it is.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Number of parsed values currently cached.
    pub fn cache_entries(&self) -> usize {
        self.cache.len()
    }

    /// The upstream source, for callers that walk the whole zone.
    pub fn source(&self) -> &Arc<dyn NameSource> {
        self.resolver.source()
    }

    /// Resolves a query name into records. See [`Backend::lookup_with_cancel`].
    pub async fn lookup(&self, qname: &str, isolation: &str) -> Result<Vec<Record>, Error> {
        self.lookup_with_cancel(qname, isolation, &CancellationToken::new())
            .await
    }

    /// Resolves a query name into records, aborting at the next upstream
    /// call once `cancel` fires.
    ///
    /// The returned list may mix authoritative content with delegation
    /// records; section assignment is the transport's concern. A name that
    /// exists but yields no records resolves to an empty list.
    pub async fn lookup_with_cancel(
        &self,
        qname: &str,
        isolation: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, Error> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }

        let qname = qname.to_lowercase();
        let parts = names::split_by_floating_anchor(&qname, &self.cfg.anchor)?;
        debug!(
            sub = %parts.subname,
            base = %parts.basename,
            root = %parts.rootname,
            "decomposed query name"
        );

        if parts.subname.is_empty() && parts.basename.is_empty() {
            return self.apex_records(&parts.rootname);
        }
        if parts.basename == META_BASENAME && self.cfg.canonical_nameservers.is_empty() {
            return self.meta_records(&parts);
        }

        match self.user_records(&parts, isolation, cancel).await {
            Err(Error::NoResults) => Ok(Vec::new()),
            other => other,
        }
    }

    /// SOA, NS set and vanity addresses at the zone apex.
    fn apex_records(&self, rootname: &str) -> Result<Vec<Record>, Error> {
        let owner = Name::from_ascii(names::absname(rootname))?;

        let mut ns_names = self.cfg.canonical_nameservers.clone();
        if ns_names.is_empty() {
            ns_names.push(format!("{META_SELF_LABEL}.{META_BASENAME}.{rootname}"));
        }

        let primary = Name::from_ascii(names::absname(&ns_names[0]))?;
        let soa = SOA::new(primary, self.cfg.soa_mbox()?, 1, 600, 600, 7200, 600);
        let mut out = vec![Record::from_rdata(owner.clone(), APEX_TTL, RData::SOA(soa))];

        for ns in &ns_names {
            let target = Name::from_ascii(names::absname(ns))?;
            out.push(Record::from_rdata(owner.clone(), APEX_TTL, RData::NS(NS(target))));
        }
        for ip in &self.cfg.vanity_ips {
            let rdata = match ip {
                IpAddr::V4(v4) => RData::A(A(*v4)),
                IpAddr::V6(v6) => RData::AAAA(AAAA(*v6)),
            };
            out.push(Record::from_rdata(owner.clone(), DEFAULT_TTL, rdata));
        }
        Ok(out)
    }

    /// The synthetic meta zone: only `this.x--nmc.<root>` resolves, to the
    /// configured self IP.
    fn meta_records(&self, parts: &QnameParts) -> Result<Vec<Record>, Error> {
        let Some(self_ip) = self.cfg.self_ip else {
            return Err(Error::Config(
                "self_ip must be configured to serve the meta zone".to_owned(),
            ));
        };
        if parts.subname != META_SELF_LABEL {
            return Ok(Vec::new());
        }
        let owner = Name::from_ascii(format!(
            "{}.{}.{}.",
            META_SELF_LABEL, parts.basename, parts.rootname
        ))?;
        Ok(vec![Record::from_rdata(
            owner,
            APEX_TTL,
            RData::A(A(self_ip)),
        )])
    }

    async fn user_records(
        &self,
        parts: &QnameParts,
        isolation: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, Error> {
        // an unregistrable basename can't exist upstream
        let key = names::basename_to_key(&parts.basename).map_err(|_| Error::NoSuchDomain)?;
        let value = self.entry(&key, isolation, cancel).await?;

        let (node, walked) = walk(&value, &parts.subname)?;
        let apex = format!("{}.{}", parts.basename, parts.rootname);
        let owner = if walked.is_empty() {
            apex.clone()
        } else {
            let mut labels: Vec<&str> = walked;
            labels.reverse();
            format!("{}.{}", labels.join("."), apex)
        };

        let rrs = node.rrs(&names::absname(&owner), &names::absname(&apex))?;
        if rrs.is_empty() {
            return Err(Error::NoResults);
        }
        Ok(rrs)
    }

    /// Cache-through fetch and parse of one blockchain entry.
    async fn entry(
        &self,
        key: &str,
        isolation: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<Value>, Error> {
        if let Some(hit) = self.cache.get(isolation, key) {
            return Ok(hit);
        }

        let raw = self.resolver.resolve(key, isolation, cancel).await?;
        debug!(key, "upstream query succeeded");

        let mut sink = ErrorSink::new();
        let imports = ImportResolver {
            resolver: &self.resolver,
            isolation,
            cancel,
        };
        let value = parse_value(key, &raw, &imports, &mut sink).await?;
        for issue in sink.issues() {
            if issue.warning {
                debug!(key, "{}", issue.message);
            } else {
                warn!(key, "{}", issue.message);
            }
        }

        let value = Arc::new(value);
        self.cache.insert(isolation, key, Arc::clone(&value));
        Ok(value)
    }
}

/// Descends `root` through the labels of `subname` (deepest label last in
/// the walk), substituting the wildcard entry where a label is missing.
/// Stops early at a delegation. Returns the reached node and the labels
/// consumed, in walk order.
fn walk<'v, 's>(root: &'v Value, subname: &'s str) -> Result<(&'v Value, Vec<&'s str>), Error> {
    let mut node = root;
    let mut remaining = subname;
    let mut walked = Vec::new();
    while !remaining.is_empty() {
        if !node.ns.is_empty() {
            // delegation cut: no authoritative content below this node
            break;
        }
        let (head, rest) = names::split_head(remaining);
        let Some(child) = node.map.get(head).or_else(|| node.map.get("*")) else {
            return Err(Error::NoSuchDomain);
        };
        walked.push(head);
        node = child;
        remaining = rest;
    }
    Ok((node, walked))
}

/// Adapter feeding `import`/`delegate` fetches through the resolver with
/// the query's isolation tag and cancellation token.
struct ImportResolver<'a> {
    resolver: &'a Resolver,
    isolation: &'a str,
    cancel: &'a CancellationToken,
}

#[async_trait]
impl ValueResolver for ImportResolver<'_> {
    async fn raw_value(&self, key: &str) -> Result<String, Error> {
        self.resolver.resolve(key, self.isolation, self.cancel).await
    }
}
