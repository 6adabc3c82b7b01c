//! The parsed record tree for a single blockchain name.
//!
//! A [`Value`] is produced by [`parse::parse_value`] and is immutable
//! afterwards; the zone engine walks its `map` and the synthesizer in
//! [`synth`] turns nodes into resource records.
//!
//! Names held in a `Value` (NS targets, `alias`, `translate`, MX exchanges,
//! SRV targets) are not necessarily fully qualified. They stay relative
//! until synthesis, where they are qualified against the query name and the
//! zone apex; `is_top_level` records which qualification rule applies.
//! The empty string is a meaningful `alias`/`translate` target (it means
//! "the apex"), which is why both are options rather than sentinel strings.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::certdehydrate::Rehydrated;

pub mod parse;
pub mod synth;

pub use parse::{parse_value, ErrorSink, ParseIssue, ValueResolver};

/// A DS RRset member: `(key_tag, algorithm, digest_type, digest)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsEntry {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

/// An MX entry. The exchange is a relative host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxEntry {
    pub preference: u16,
    pub exchange: String,
}

/// An SRV entry. `prefix` is the `_app._transport` owner prefix, or empty
/// when the value already sits on an underscore-labelled map node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvEntry {
    pub prefix: String,
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// A raw (DANE passthrough) TLSA entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsaEntry {
    pub prefix: String,
    pub usage: u8,
    pub selector: u8,
    pub matching: u8,
    pub cert_data: Vec<u8>,
}

/// A parsed node of the record tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Value {
    pub ip: Vec<Ipv4Addr>,
    pub ip6: Vec<Ipv6Addr>,
    /// Delegation targets. Non-empty `ns` cuts the zone at this node.
    pub ns: Vec<String>,
    /// CNAME target. `Some("")` is valid and means the apex.
    pub alias: Option<String>,
    /// DNAME target. `Some("")` is valid and means the apex.
    pub translate: Option<String>,
    pub ds: Vec<DsEntry>,
    /// TXT records; each record is a list of segments of at most 255
    /// octets.
    pub txt: Vec<Vec<String>>,
    pub mx: Vec<MxEntry>,
    pub srv: Vec<SrvEntry>,
    pub tlsa: Vec<TlsaEntry>,
    /// Rehydrated certificate templates awaiting a fill at synthesis time.
    pub tlsa_generated: Vec<Rehydrated>,
    /// SOA MBOX e-mail, if the value carries one.
    pub hostmaster: Option<String>,
    /// Subdomain tree. Keys may be owner labels, `*`, or (transiently
    /// during parsing) the empty string.
    pub map: BTreeMap<String, Value>,
    /// Set on the root value returned from parsing; selects the
    /// relative-name qualification rule.
    pub is_top_level: bool,
}

impl Value {
    /// Hoists fields of the `""` map child onto this node, then drops the
    /// child. A field already present here wins. If the map would otherwise
    /// be empty, the child's map takes its place.
    pub(crate) fn promote_empty_label(&mut self) {
        let Some(child) = self.map.remove("") else {
            return;
        };
        if self.ip.is_empty() {
            self.ip = child.ip;
        }
        if self.ip6.is_empty() {
            self.ip6 = child.ip6;
        }
        if self.ns.is_empty() {
            self.ns = child.ns;
        }
        if self.alias.is_none() {
            self.alias = child.alias;
        }
        if self.translate.is_none() {
            self.translate = child.translate;
        }
        if self.ds.is_empty() {
            self.ds = child.ds;
        }
        if self.txt.is_empty() {
            self.txt = child.txt;
        }
        if self.mx.is_empty() {
            self.mx = child.mx;
        }
        if self.srv.is_empty() {
            self.srv = child.srv;
        }
        if self.tlsa.is_empty() {
            self.tlsa = child.tlsa;
        }
        if self.tlsa_generated.is_empty() {
            self.tlsa_generated = child.tlsa_generated;
        }
        if self.hostmaster.is_none() {
            self.hostmaster = child.hostmaster;
        }
        if self.map.is_empty() {
            self.map = child.map;
        }
    }

    /// Resolves a dotted relative subdomain inside this value's map, for
    /// `import`/`delegate` subpath selection.
    pub(crate) fn find_subname(&self, subdomain: &str) -> Result<&Value, String> {
        if subdomain.is_empty() {
            return Ok(self);
        }
        if subdomain.ends_with('.') {
            return Err("a subdomain name should not be fully qualified".to_owned());
        }
        let (head, rest) = crate::names::split_head(subdomain);
        match self.map.get(head) {
            Some(sub) => sub.find_subname(rest),
            None => Err(format!("subdomain part not found: {head}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ip(ip: [u8; 4]) -> Value {
        Value {
            ip: vec![Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3])],
            ..Value::default()
        }
    }

    #[test]
    fn empty_label_promotion_copies_absent_fields() {
        let mut child = with_ip([1, 2, 3, 4]);
        child.txt = vec![vec!["hello".to_owned()]];
        child.alias = Some("x".to_owned());
        let mut v = Value::default();
        v.alias = Some("local".to_owned());
        v.map.insert(String::new(), child);

        v.promote_empty_label();
        assert_eq!(v.ip, vec![Ipv4Addr::new(1, 2, 3, 4)]);
        assert_eq!(v.txt, vec![vec!["hello".to_owned()]]);
        // a present field is not overwritten
        assert_eq!(v.alias.as_deref(), Some("local"));
        assert!(!v.map.contains_key(""));
    }

    #[test]
    fn empty_label_promotion_takes_child_map() {
        let mut child = Value::default();
        child.map.insert("www".to_owned(), with_ip([1, 2, 3, 4]));
        let mut v = Value::default();
        v.map.insert(String::new(), child);

        v.promote_empty_label();
        assert!(v.map.contains_key("www"));
    }

    #[test]
    fn empty_label_promotion_keeps_sibling_map() {
        let mut child = Value::default();
        child.map.insert("inner".to_owned(), Value::default());
        let mut v = Value::default();
        v.map.insert(String::new(), child);
        v.map.insert("www".to_owned(), with_ip([1, 2, 3, 4]));

        v.promote_empty_label();
        // sibling entries survive; the child's map is dropped
        assert!(v.map.contains_key("www"));
        assert!(!v.map.contains_key("inner"));
    }

    #[test]
    fn find_subname_walks_the_map() {
        let mut inner = Value::default();
        inner.map.insert("a".to_owned(), with_ip([1, 2, 3, 4]));
        let mut v = Value::default();
        v.map.insert("b".to_owned(), inner);

        assert!(v.find_subname("").is_ok());
        let found = v.find_subname("a.b").unwrap();
        assert_eq!(found.ip.len(), 1);
        assert!(v.find_subname("missing.b").is_err());
        assert!(v.find_subname("a.b.").is_err());
    }
}
