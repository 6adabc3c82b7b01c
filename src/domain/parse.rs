//! Conversion of raw blockchain JSON into a [`Value`] tree.
//!
//! The converter is deliberately forgiving: malformed subfields are
//! reported through an [`ErrorSink`] and skipped, and parsing continues so
//! that partially bad zone data still resolves. Only an unparseable
//! top-level document aborts.
//!
//! `import` and `delegate` statements pull in other names through a
//! [`ValueResolver`]; recursion through them is bounded by
//! [`MERGE_DEPTH_LIMIT`] and de-duplicated by key so cycles terminate, and
//! recursion through `map` is bounded by [`DEPTH_LIMIT`].

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value as Json};
use trust_dns_proto::rr::dnssec::DigestType;

use crate::certdehydrate::DehydratedCertificate;
use crate::domain::{DsEntry, MxEntry, SrvEntry, TlsaEntry, Value};
use crate::error::Error;
use crate::names;

/// Bound on recursion through `map`.
pub const DEPTH_LIMIT: usize = 16;
/// Bound on recursion through `import`/`delegate`.
pub const MERGE_DEPTH_LIMIT: usize = 4;

/// Upper bound on the wire size of a single TXT record.
const TXT_RECORD_MAX: usize = 65535;
/// Upper bound on a single TXT character-string segment.
const TXT_SEGMENT_MAX: usize = 255;

/// Supplies the raw JSON stored at a blockchain key (e.g. `d/x`), for
/// resolving `import` and `delegate` statements.
#[async_trait]
pub trait ValueResolver: Send + Sync {
    async fn raw_value(&self, key: &str) -> Result<String, Error>;
}

/// A resolver that refuses every import.
pub struct NoResolver;

#[async_trait]
impl ValueResolver for NoResolver {
    async fn raw_value(&self, _key: &str) -> Result<String, Error> {
        Err(Error::Upstream("import resolution not supported".to_owned()))
    }
}

/// A single problem encountered while converting a value.
#[derive(Debug, Clone)]
pub struct ParseIssue {
    pub message: String,
    pub warning: bool,
}

/// Collects per-field conversion problems without aborting the parse.
#[derive(Debug, Default)]
pub struct ErrorSink {
    issues: Vec<ParseIssue>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.issues.push(ParseIssue {
            message: message.into(),
            warning: false,
        });
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.issues.push(ParseIssue {
            message: message.into(),
            warning: true,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }
}

/// Converts the JSON stored at `key` into a [`Value`].
///
/// Returns the best-effort value for every parseable document; problems in
/// individual fields land in `sink`. Fails only when the top-level document
/// is not a JSON object.
pub async fn parse_value(
    key: &str,
    json: &str,
    resolver: &dyn ValueResolver,
    sink: &mut ErrorSink,
) -> Result<Value, Error> {
    let obj: Map<String, Json> = serde_json::from_str(json).map_err(Error::ValueParse)?;

    let mut merged = HashSet::new();
    merged.insert(key.to_owned());

    let mut value = Value::default();
    let mut parser = Parser { resolver, sink };
    parser
        .parse_object(&obj, &mut value, 0, 0, "", &mut merged)
        .await;
    value.is_top_level = true;
    Ok(value)
}

struct Parser<'a> {
    resolver: &'a dyn ValueResolver,
    sink: &'a mut ErrorSink,
}

impl<'a> Parser<'a> {
    /// Parses one JSON object into `out`. When `subdomain` is nonempty the
    /// object is parsed into a scratch value and only the selected subtree
    /// is copied out (the `[key, subpath]` import form).
    fn parse_object<'b>(
        &'b mut self,
        obj: &'b Map<String, Json>,
        out: &'b mut Value,
        depth: usize,
        merge_depth: usize,
        subdomain: &'b str,
        merged: &'b mut HashSet<String>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'b>> {
        Box::pin(async move {
            if depth > DEPTH_LIMIT {
                self.sink.error("depth limit exceeded");
                return;
            }

            if subdomain.is_empty() {
                self.parse_into(obj, out, depth, merge_depth, merged).await;
                return;
            }

            // The [key, subpath] import form: parse into a scratch value,
            // then copy the selected subtree out.
            let mut scratch = Value::default();
            let delegated = self
                .parse_into(obj, &mut scratch, depth, merge_depth, merged)
                .await;
            if delegated {
                return;
            }
            match scratch.find_subname(subdomain) {
                Ok(sub) => *out = sub.clone(),
                Err(err) => self.sink.error(format!(
                    "couldn't find subdomain by name in import or delegate item: {err}"
                )),
            }
        })
    }

    /// Parses every recognized field of `obj` into `v`. Returns true iff a
    /// delegate statement replaced the value wholesale.
    async fn parse_into(
        &mut self,
        obj: &Map<String, Json>,
        v: &mut Value,
        depth: usize,
        merge_depth: usize,
        merged: &mut HashSet<String>,
    ) -> bool {
        // A successful delegate replaces the value wholesale.
        if self
            .parse_import(obj.get("delegate"), v, depth, merge_depth, merged)
            .await
        {
            return true;
        }
        self.parse_import(obj.get("import"), v, depth, merge_depth, merged)
            .await;

        self.parse_ip(obj.get("ip"), v, false);
        self.parse_ip(obj.get("ip6"), v, true);
        self.parse_ns(obj.get("ns"), obj.get("dns"), v);
        self.parse_alias(obj.get("alias"), v);
        self.parse_translate(obj.get("translate"), v);
        self.parse_hostmaster(obj.get("email"), v);
        self.parse_ds(obj.get("ds"), v);
        self.parse_txt(obj.get("txt"), v);
        self.parse_service(obj.get("service"), v);
        self.parse_srv(obj.get("srv"), v);
        self.parse_mx(obj.get("mx"), v);
        self.parse_tlsa_legacy(obj.get("tlsa"), v);
        self.parse_tls(obj.get("tls"), v);
        self.parse_map(obj.get("map"), v, depth, merge_depth).await;
        v.promote_empty_label();
        false
    }

    /// Handles both `import` and `delegate` (they differ only in what the
    /// caller does with the result). Returns true iff at least one target
    /// merged successfully.
    async fn parse_import(
        &mut self,
        src: Option<&Json>,
        v: &mut Value,
        depth: usize,
        merge_depth: usize,
        merged: &mut HashSet<String>,
    ) -> bool {
        let Some(src) = src else { return false };

        // Normalize the accepted shapes to a list of [key, subpath?] pairs:
        // "d/x"               -> [["d/x"]]
        // ["d/x", "sub"]      -> [["d/x", "sub"]]
        // [["d/x"], ["d/y"]]  -> itself
        let single;
        let src = match src {
            Json::String(_) => {
                single = Json::Array(vec![src.clone()]);
                &single
            }
            _ => src,
        };
        let Json::Array(items) = src else {
            self.sink.error("unknown import/delegate field format");
            return false;
        };
        let wrapped;
        let pairs: &[Json] = if items.iter().all(Json::is_string) {
            wrapped = [Json::Array(items.clone())];
            &wrapped
        } else if items.iter().all(Json::is_array) {
            items
        } else {
            self.sink.error("unknown import/delegate field format");
            return false;
        };

        let mut succeeded = false;
        for pair in pairs {
            let Json::Array(pair) = pair else { continue };
            if pair.is_empty() || pair.len() > 2 {
                continue;
            }
            let Some(key) = pair[0].as_str() else {
                continue;
            };
            let subpath = pair.get(1).and_then(Json::as_str).unwrap_or("");

            if !merged.insert(key.to_owned()) {
                // already merged; treat re-entry as a no-op to end cycles
                continue;
            }

            let raw = match self.resolver.raw_value(key).await {
                Ok(raw) => raw,
                Err(err) => {
                    self.sink
                        .warning(format!("couldn't resolve {key:?} for merging: {err}"));
                    continue;
                }
            };
            if self
                .parse_merge(&raw, v, depth, merge_depth + 1, subpath, merged)
                .await
            {
                succeeded = true;
            }
        }
        succeeded
    }

    async fn parse_merge(
        &mut self,
        raw: &str,
        v: &mut Value,
        depth: usize,
        merge_depth: usize,
        subdomain: &str,
        merged: &mut HashSet<String>,
    ) -> bool {
        if merge_depth > MERGE_DEPTH_LIMIT {
            self.sink.error("merge depth limit exceeded");
            return false;
        }
        let obj: Map<String, Json> = match serde_json::from_str(raw) {
            Ok(obj) => obj,
            Err(err) => {
                self.sink
                    .error(format!("couldn't parse JSON to be merged: {err}"));
                return false;
            }
        };
        self.parse_object(&obj, v, depth, merge_depth, subdomain, merged)
            .await;
        true
    }

    fn parse_ip(&mut self, field: Option<&Json>, v: &mut Value, ipv6: bool) {
        let Some(field) = field else { return };
        if ipv6 {
            v.ip6.clear();
        } else {
            v.ip.clear();
        }
        match field {
            Json::Array(items) => {
                for item in items {
                    if let Some(s) = item.as_str() {
                        self.add_ip(s, v, ipv6);
                    }
                }
            }
            Json::String(s) => self.add_ip(s, v, ipv6),
            _ => {}
        }
    }

    fn add_ip(&mut self, s: &str, v: &mut Value, ipv6: bool) {
        if ipv6 {
            match s.parse() {
                Ok(ip) => v.ip6.push(ip),
                Err(_) => self.sink.error(format!("malformed IPv6 address: {s}")),
            }
        } else {
            match s.parse() {
                Ok(ip) => v.ip.push(ip),
                Err(_) => self.sink.error(format!("malformed IP address: {s}")),
            }
        }
    }

    fn parse_ns(&mut self, ns: Option<&Json>, dns: Option<&Json>, v: &mut Value) {
        // "dns" is an alias for "ns" and takes precedence
        let Some(field) = dns.or(ns) else { return };
        v.ns.clear();
        let mut seen = HashSet::new();
        let mut add = |s: &str, v: &mut Value| {
            if seen.insert(s.to_owned()) {
                v.ns.push(s.to_owned());
            }
        };
        match field {
            Json::Array(items) => {
                for item in items {
                    if let Some(s) = item.as_str() {
                        add(s, v);
                    }
                }
            }
            Json::String(s) => add(s, v),
            _ => self.sink.error("unknown NS field format"),
        }
    }

    fn parse_alias(&mut self, field: Option<&Json>, v: &mut Value) {
        let Some(field) = field else { return };
        match field.as_str() {
            Some(s) => v.alias = Some(s.to_owned()),
            None => self.sink.error("unknown alias field format"),
        }
    }

    fn parse_translate(&mut self, field: Option<&Json>, v: &mut Value) {
        let Some(field) = field else { return };
        match field.as_str() {
            Some(s) => v.translate = Some(s.to_owned()),
            None => self.sink.error("unknown translate field format"),
        }
    }

    fn parse_hostmaster(&mut self, field: Option<&Json>, v: &mut Value) {
        let Some(field) = field else { return };
        match field.as_str() {
            Some(s) if names::is_email(s) => v.hostmaster = Some(s.to_owned()),
            Some(_) => self.sink.error("malformed e-mail address in email field"),
            None => self.sink.error("unknown email field format"),
        }
    }

    fn parse_ds(&mut self, field: Option<&Json>, v: &mut Value) {
        let Some(field) = field else { return };
        v.ds.clear();
        let Json::Array(items) = field else {
            self.sink.error("malformed DS field format");
            return;
        };
        for item in items {
            let Json::Array(ds) = item else {
                self.sink.error("DS item must be an array");
                continue;
            };
            if ds.len() < 4 {
                self.sink.error("DS item must have four items");
                continue;
            }
            let Some(key_tag) = ds[0].as_f64() else {
                self.sink
                    .error("first item in DS value must be an integer (key tag)");
                continue;
            };
            let Some(algorithm) = ds[1].as_f64() else {
                self.sink
                    .error("second item in DS value must be an integer (algorithm)");
                continue;
            };
            let Some(digest_type) = ds[2].as_f64() else {
                self.sink
                    .error("third item in DS value must be an integer (digest type)");
                continue;
            };
            let Some(digest_b64) = ds[3].as_str() else {
                self.sink
                    .error("fourth item in DS value must be a string (digest)");
                continue;
            };
            let digest = match BASE64.decode(digest_b64) {
                Ok(digest) => digest,
                Err(err) => {
                    self.sink
                        .error(format!("fourth item in DS value must be valid base64: {err}"));
                    continue;
                }
            };
            if DigestType::from_u8(digest_type as u8).is_err() {
                self.sink
                    .error(format!("unknown DS digest type: {digest_type}"));
                continue;
            }
            v.ds.push(DsEntry {
                key_tag: key_tag as u16,
                algorithm: algorithm as u8,
                digest_type: digest_type as u8,
                digest,
            });
        }
    }

    fn parse_txt(&mut self, field: Option<&Json>, v: &mut Value) {
        let Some(field) = field else { return };
        v.txt.clear();
        match field {
            Json::Array(items) => {
                for item in items {
                    match item {
                        Json::Array(segments) => {
                            let record: Vec<String> = segments
                                .iter()
                                .filter_map(Json::as_str)
                                .filter(|s| s.len() <= TXT_SEGMENT_MAX)
                                .map(str::to_owned)
                                .collect();
                            if !record.is_empty() {
                                v.txt.push(record);
                            }
                        }
                        Json::String(s) => v.txt.push(segmentize_txt(s)),
                        _ => {
                            self.sink.error("malformed TXT value");
                            return;
                        }
                    }
                }
            }
            Json::String(s) => v.txt.push(segmentize_txt(s)),
            _ => {
                self.sink.error("malformed TXT value");
                return;
            }
        }

        // Keep each record's wire size within bounds by dropping trailing
        // segments.
        for record in &mut v.txt {
            while record.iter().map(|s| s.len() + 1).sum::<usize>() > TXT_RECORD_MAX {
                record.pop();
            }
        }
    }

    /// Legacy six-item service form:
    /// `[app, transport, priority, weight, port, target]`.
    fn parse_service(&mut self, field: Option<&Json>, v: &mut Value) {
        let Some(field) = field else { return };
        let Json::Array(items) = field else {
            self.sink.error("malformed service value");
            return;
        };
        let mut fresh: Vec<SrvEntry> = Vec::new();
        for item in items {
            let Json::Array(svc) = item else {
                self.sink.error("malformed service value");
                continue;
            };
            if svc.len() < 6 {
                self.sink.error("malformed service value: must have six items");
                continue;
            }
            let app = svc[0].as_str().filter(|s| names::is_service_name(s));
            let Some(app) = app else {
                self.sink.error(
                    "malformed service value: first item must be a string (application protocol)",
                );
                continue;
            };
            let transport = svc[1].as_str().filter(|s| names::is_service_name(s));
            let Some(transport) = transport else {
                self.sink.error(
                    "malformed service value: second item must be a string (transport protocol)",
                );
                continue;
            };
            let Some(priority) = svc[2].as_f64() else {
                self.sink
                    .error("malformed service value: third item must be an integer (priority)");
                continue;
            };
            let Some(weight) = svc[3].as_f64() else {
                self.sink
                    .error("malformed service value: fourth item must be an integer (weight)");
                continue;
            };
            let Some(port) = svc[4].as_f64() else {
                self.sink
                    .error("malformed service value: fifth item must be an integer (port number)");
                continue;
            };
            let Some(target) = svc[5].as_str() else {
                self.sink
                    .error("malformed service value: sixth item must be a string (target)");
                continue;
            };
            fresh.push(SrvEntry {
                prefix: format!("_{app}._{transport}"),
                priority: priority as u16,
                weight: weight as u16,
                port: port as u16,
                target: target.to_owned(),
            });
        }
        merge_srv(v, fresh);
    }

    /// Four-item SRV form for values sitting on `_app._transport` map
    /// nodes: `[priority, weight, port, target]`.
    fn parse_srv(&mut self, field: Option<&Json>, v: &mut Value) {
        let Some(field) = field else { return };
        let Json::Array(items) = field else {
            self.sink.error("malformed srv value");
            return;
        };
        let mut fresh: Vec<SrvEntry> = Vec::new();
        for item in items {
            let Json::Array(srv) = item else {
                self.sink.error("malformed srv value");
                continue;
            };
            if srv.len() < 4 {
                self.sink.error("malformed srv value: must have four items");
                continue;
            }
            let (Some(priority), Some(weight), Some(port)) =
                (srv[0].as_f64(), srv[1].as_f64(), srv[2].as_f64())
            else {
                self.sink
                    .error("malformed srv value: first three items must be integers");
                continue;
            };
            let Some(target) = srv[3].as_str() else {
                self.sink
                    .error("malformed srv value: fourth item must be a string (target)");
                continue;
            };
            fresh.push(SrvEntry {
                prefix: String::new(),
                priority: priority as u16,
                weight: weight as u16,
                port: port as u16,
                target: target.to_owned(),
            });
        }
        merge_srv(v, fresh);
    }

    fn parse_mx(&mut self, field: Option<&Json>, v: &mut Value) {
        let Some(field) = field else { return };
        v.mx.clear();
        let Json::Array(items) = field else {
            self.sink.error("malformed MX value");
            return;
        };
        for item in items {
            let Json::Array(mx) = item else {
                self.sink.error("malformed MX value");
                continue;
            };
            if mx.len() < 2 {
                self.sink.error("malformed MX value");
                continue;
            }
            let preference = mx[0].as_f64().filter(|p| *p >= 0.0);
            let Some(preference) = preference else {
                self.sink.error("malformed MX value");
                continue;
            };
            let Some(exchange) = mx[1].as_str() else {
                self.sink.error("malformed MX value");
                continue;
            };
            v.mx.push(MxEntry {
                preference: preference as u16,
                exchange: exchange.to_owned(),
            });
        }
    }

    /// Legacy six-item TLSA form:
    /// `[port, transport, usage, selector, match, certB64]`.
    fn parse_tlsa_legacy(&mut self, field: Option<&Json>, v: &mut Value) {
        let Some(field) = field else { return };
        v.tlsa.clear();
        let Json::Array(items) = field else {
            self.sink.error("malformed TLSA field format");
            return;
        };
        for item in items {
            let Json::Array(tlsa) = item else {
                self.sink.error("TLSA item must be an array");
                continue;
            };
            if tlsa.len() < 6 {
                self.sink.error("TLSA item must have six items");
                continue;
            }
            let port = match tlsa[0].as_str() {
                Some(s) => s.to_owned(),
                None => match tlsa[0].as_f64() {
                    Some(n) => format!("{}", n as i64),
                    None => {
                        self.sink.error(
                            "first item in TLSA value must be an integer or string (port number)",
                        );
                        continue;
                    }
                },
            };
            let Some(transport) = tlsa[1].as_str() else {
                self.sink
                    .error("second item in TLSA value must be a string (transport protocol name)");
                continue;
            };
            let (Some(usage), Some(selector), Some(matching)) =
                (tlsa[2].as_f64(), tlsa[3].as_f64(), tlsa[4].as_f64())
            else {
                self.sink
                    .error("TLSA usage, selector and match type must be integers");
                continue;
            };
            let Some(cert_b64) = tlsa[5].as_str() else {
                self.sink
                    .error("sixth item in TLSA value must be a string (certificate)");
                continue;
            };
            let cert_data = match BASE64.decode(cert_b64) {
                Ok(data) => data,
                Err(err) => {
                    self.sink
                        .error(format!("TLSA certificate must be valid base64: {err}"));
                    continue;
                }
            };
            if port.len() > 62 || transport.len() > 62 {
                self.sink
                    .error("application and transport names must not exceed 62 characters");
                continue;
            }
            v.tlsa.push(TlsaEntry {
                prefix: format!("_{port}._{transport}"),
                usage: usage as u8,
                selector: selector as u8,
                matching: matching as u8,
                cert_data,
            });
        }
    }

    /// Current TLSA form for values on `_port._transport` map nodes: each
    /// item is a four-item DANE tuple, or a `{"dane": [...]}` /
    /// `{"d8": [...]}` tagged object.
    fn parse_tls(&mut self, field: Option<&Json>, v: &mut Value) {
        let Some(field) = field else { return };
        v.tlsa.clear();
        v.tlsa_generated.clear();
        let Json::Array(items) = field else {
            self.sink.error("malformed TLSA field format");
            return;
        };
        for item in items {
            let tagged: Map<String, Json>;
            let obj = match item {
                Json::Array(_) => {
                    tagged = [("dane".to_owned(), item.clone())].into_iter().collect();
                    &tagged
                }
                Json::Object(obj) => obj,
                _ => {
                    self.sink.error("unknown TLSA item format");
                    continue;
                }
            };

            if let Some(dehydrated) = obj.get("d8") {
                match self.parse_tls_dehydrated(dehydrated, v) {
                    Ok(()) => continue,
                    Err(err) => self.sink.error(err),
                }
            }
            if let Some(dane) = obj.get("dane") {
                match Self::parse_tls_dane(dane, v) {
                    Ok(()) => continue,
                    Err(err) => self.sink.error(err),
                }
            }
            self.sink.error("unknown TLSA item format");
        }
    }

    fn parse_tls_dehydrated(&mut self, item: &Json, v: &mut Value) -> Result<(), String> {
        let dehydrated = DehydratedCertificate::parse(item)
            .map_err(|err| format!("error parsing dehydrated certificate: {err}"))?;
        let template = dehydrated
            .rehydrate()
            .map_err(|err| format!("error rehydrating certificate: {err}"))?;
        v.tlsa_generated.push(template);
        Ok(())
    }

    fn parse_tls_dane(item: &Json, v: &mut Value) -> Result<(), String> {
        let Json::Array(tlsa) = item else {
            return Err("TLSA item must be an array".to_owned());
        };
        if tlsa.len() < 4 {
            return Err("TLSA item must have four items".to_owned());
        }
        let (Some(usage), Some(selector), Some(matching)) =
            (tlsa[0].as_f64(), tlsa[1].as_f64(), tlsa[2].as_f64())
        else {
            return Err("TLSA usage, selector and match type must be integers".to_owned());
        };
        let Some(cert_b64) = tlsa[3].as_str() else {
            return Err("fourth item in TLSA value must be a string (certificate)".to_owned());
        };
        let cert_data = BASE64
            .decode(cert_b64)
            .map_err(|err| format!("TLSA certificate must be valid base64: {err}"))?;
        v.tlsa.push(TlsaEntry {
            prefix: String::new(),
            usage: usage as u8,
            selector: selector as u8,
            matching: matching as u8,
            cert_data,
        });
        Ok(())
    }

    async fn parse_map(
        &mut self,
        field: Option<&Json>,
        v: &mut Value,
        depth: usize,
        merge_depth: usize,
    ) {
        let Some(field) = field else { return };
        let Json::Object(entries) = field else {
            self.sink.error("couldn't unmarshal map");
            return;
        };
        for (label, entry) in entries {
            let mut child = Value::default();
            match entry {
                Json::String(ip) => {
                    // deprecated shorthand: "map": {"x": "1.2.3.4"}
                    self.sink
                        .warning(format!("deprecated bare IP map entry at {label:?}"));
                    self.add_map_ip(ip, &mut child);
                }
                Json::Object(obj) => {
                    let mut merged = HashSet::new();
                    self.parse_object(obj, &mut child, depth + 1, merge_depth, "", &mut merged)
                        .await;
                }
                _ => {
                    self.sink.error("couldn't unmarshal map");
                    continue;
                }
            }
            v.map.insert(label.clone(), child);
        }
    }

    fn add_map_ip(&mut self, s: &str, child: &mut Value) {
        match s.parse::<std::net::IpAddr>() {
            Ok(std::net::IpAddr::V4(ip)) => child.ip.push(ip),
            Ok(std::net::IpAddr::V6(ip)) => child.ip6.push(ip),
            Err(_) => self.sink.error(format!("malformed IP address: {s}")),
        }
    }
}

/// Replaces `v.srv` entries whose prefix reappears in `fresh`, keeping
/// previously merged entries for untouched prefixes.
fn merge_srv(v: &mut Value, fresh: Vec<SrvEntry>) {
    let used: HashSet<&str> = fresh.iter().map(|e| e.prefix.as_str()).collect();
    let mut kept: Vec<SrvEntry> = v
        .srv
        .drain(..)
        .filter(|e| !used.contains(e.prefix.as_str()))
        .collect();
    v.srv = fresh;
    v.srv.append(&mut kept);
}

/// Splits a string into TXT segments of at most 255 octets whose
/// concatenation is the input. Splits happen on character boundaries.
pub fn segmentize_txt(txt: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = txt;
    while rest.len() > TXT_SEGMENT_MAX {
        let mut cut = TXT_SEGMENT_MAX;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.push(rest[..cut].to_owned());
        rest = &rest[cut..];
    }
    out.push(rest.to_owned());
    out
}
