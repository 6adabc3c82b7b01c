//! Resource-record synthesis from a [`Value`] node.
//!
//! Emission order and mutual exclusion at a single node: DS always comes
//! first; a non-empty `ns` set makes the node a delegation and suppresses
//! everything else; otherwise DNAME beats CNAME beats the leaf types
//! (A/AAAA/TXT/MX). SRV and TLSA belong to synthetic underscore-prefixed
//! sub-owners, so CNAME and DNAME do not suppress them.
//!
//! Relative targets are qualified here against the query name and the zone
//! apex; targets that fail host validation are dropped silently so that
//! partially bad zone data still serves.

use tracing::debug;
use trust_dns_proto::rr::dnssec::rdata::{DNSSECRData, DS};
use trust_dns_proto::rr::dnssec::{Algorithm, DigestType};
use trust_dns_proto::rr::rdata::tlsa::{CertUsage, Matching, Selector};
use trust_dns_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, NULL, SRV, TLSA, TXT};
use trust_dns_proto::rr::{Name, RData, Record};
use trust_dns_proto::serialize::binary::BinEncodable;

use crate::domain::Value;
use crate::error::Error;
use crate::names;

/// TTL applied to all synthesized records.
pub const DEFAULT_TTL: u32 = 600;

/// DNAME is not among the rdata types trust-dns models; its records are
/// carried as `RData::Unknown` with the uncompressed target name as rdata.
pub const DNAME_TYPE: u16 = 39;

impl Value {
    /// Synthesizes the records of this node, owned by `suffix`, with
    /// relative targets qualified against `suffix` and `apex_suffix`.
    pub fn rrs(&self, suffix: &str, apex_suffix: &str) -> Result<Vec<Record>, Error> {
        let mut out = Vec::new();
        self.append_rrs(&mut out, suffix, apex_suffix)?;
        Ok(out)
    }

    /// Synthesizes this node and its whole subtree, extending the owner by
    /// each map label. Delegations cut the walk: nothing below a node with
    /// an `ns` set is emitted. Labels that are not valid owner labels (and
    /// not `*`) are skipped.
    pub fn rrs_recursive(&self, suffix: &str, apex_suffix: &str) -> Result<Vec<Record>, Error> {
        let mut out = Vec::new();
        self.append_rrs_recursive(&mut out, suffix, apex_suffix)?;
        Ok(out)
    }

    fn append_rrs_recursive(
        &self,
        out: &mut Vec<Record>,
        suffix: &str,
        apex_suffix: &str,
    ) -> Result<(), Error> {
        self.append_rrs(out, suffix, apex_suffix)?;
        if !self.ns.is_empty() {
            return Ok(());
        }
        for (label, child) in &self.map {
            if label.is_empty() || (label != "*" && !names::is_owner_label(label)) {
                continue;
            }
            let _ = child.append_rrs_recursive(out, &format!("{label}.{suffix}"), apex_suffix);
        }
        Ok(())
    }

    fn append_rrs(
        &self,
        out: &mut Vec<Record>,
        suffix: &str,
        apex_suffix: &str,
    ) -> Result<(), Error> {
        let suffix = names::absname(&suffix.to_lowercase());
        let apex_suffix = names::absname(&apex_suffix.to_lowercase());
        let owner = Name::from_ascii(&suffix)?;

        self.append_ds(out, &owner);
        if !self.ns.is_empty() {
            // The node is a delegation; only NS (and DS above) may appear.
            self.append_ns(out, &owner, &suffix, &apex_suffix);
            return Ok(());
        }
        if self.translate.is_some() {
            self.append_translate(out, &owner, &suffix, &apex_suffix);
        } else if self.alias.is_some() {
            self.append_alias(out, &owner, &suffix, &apex_suffix);
        } else {
            self.append_ips(out, &owner);
            self.append_ip6s(out, &owner);
            self.append_txts(out, &owner);
            self.append_mxs(out, &owner, &suffix, &apex_suffix);
        }
        self.append_srvs(out, &owner, &suffix, &apex_suffix);
        self.append_tlsa(out, &owner, &suffix);
        Ok(())
    }

    fn append_ds(&self, out: &mut Vec<Record>, owner: &Name) {
        for ds in &self.ds {
            let Ok(digest_type) = DigestType::from_u8(ds.digest_type) else {
                continue;
            };
            let rdata = DS::new(
                ds.key_tag,
                Algorithm::from_u8(ds.algorithm),
                digest_type,
                ds.digest.clone(),
            );
            out.push(Record::from_rdata(
                owner.clone(),
                DEFAULT_TTL,
                RData::DNSSEC(DNSSECRData::DS(rdata)),
            ));
        }
    }

    fn append_ns(&self, out: &mut Vec<Record>, owner: &Name, suffix: &str, apex_suffix: &str) {
        for target in &self.ns {
            let Some(target) = self.qualify(target, suffix, apex_suffix) else {
                continue;
            };
            let Ok(target) = Name::from_ascii(&target) else {
                continue;
            };
            out.push(Record::from_rdata(
                owner.clone(),
                DEFAULT_TTL,
                RData::NS(NS(target)),
            ));
        }
    }

    fn append_translate(
        &self,
        out: &mut Vec<Record>,
        owner: &Name,
        suffix: &str,
        apex_suffix: &str,
    ) {
        let Some(translate) = &self.translate else {
            return;
        };
        let Some(target) = self.qualify(translate, suffix, apex_suffix) else {
            return;
        };
        let Ok(target) = Name::from_ascii(&target) else {
            return;
        };
        let Ok(wire) = target.to_bytes() else {
            return;
        };
        out.push(Record::from_rdata(
            owner.clone(),
            DEFAULT_TTL,
            RData::Unknown {
                code: DNAME_TYPE,
                rdata: NULL::with(wire),
            },
        ));
    }

    fn append_alias(&self, out: &mut Vec<Record>, owner: &Name, suffix: &str, apex_suffix: &str) {
        let Some(alias) = &self.alias else {
            return;
        };
        let Some(target) = self.qualify(alias, suffix, apex_suffix) else {
            return;
        };
        let Ok(target) = Name::from_ascii(&target) else {
            return;
        };
        out.push(Record::from_rdata(
            owner.clone(),
            DEFAULT_TTL,
            RData::CNAME(CNAME(target)),
        ));
    }

    fn append_ips(&self, out: &mut Vec<Record>, owner: &Name) {
        for ip in &self.ip {
            out.push(Record::from_rdata(owner.clone(), DEFAULT_TTL, RData::A(A(*ip))));
        }
    }

    fn append_ip6s(&self, out: &mut Vec<Record>, owner: &Name) {
        for ip in &self.ip6 {
            out.push(Record::from_rdata(
                owner.clone(),
                DEFAULT_TTL,
                RData::AAAA(AAAA(*ip)),
            ));
        }
    }

    fn append_txts(&self, out: &mut Vec<Record>, owner: &Name) {
        for txt in &self.txt {
            out.push(Record::from_rdata(
                owner.clone(),
                DEFAULT_TTL,
                RData::TXT(TXT::new(txt.clone())),
            ));
        }
    }

    fn append_mxs(&self, out: &mut Vec<Record>, owner: &Name, suffix: &str, apex_suffix: &str) {
        for mx in &self.mx {
            let Some(exchange) = self.qualify(&mx.exchange, suffix, apex_suffix) else {
                continue;
            };
            let Ok(exchange) = Name::from_ascii(&exchange) else {
                continue;
            };
            out.push(Record::from_rdata(
                owner.clone(),
                DEFAULT_TTL,
                RData::MX(MX::new(mx.preference, exchange)),
            ));
        }
    }

    fn append_srvs(&self, out: &mut Vec<Record>, owner: &Name, suffix: &str, apex_suffix: &str) {
        for srv in &self.srv {
            let Some(srv_owner) = prefixed_owner(owner, &srv.prefix, suffix) else {
                continue;
            };
            let Some(target) = self.qualify(&srv.target, suffix, apex_suffix) else {
                continue;
            };
            let Ok(target) = Name::from_ascii(&target) else {
                continue;
            };
            out.push(Record::from_rdata(
                srv_owner,
                DEFAULT_TTL,
                RData::SRV(SRV::new(srv.priority, srv.weight, srv.port, target)),
            ));
        }
    }

    fn append_tlsa(&self, out: &mut Vec<Record>, owner: &Name, suffix: &str) {
        for tlsa in &self.tlsa {
            let Some(tlsa_owner) = prefixed_owner(owner, &tlsa.prefix, suffix) else {
                continue;
            };
            out.push(Record::from_rdata(
                tlsa_owner,
                DEFAULT_TTL,
                RData::TLSA(TLSA::new(
                    CertUsage::from(tlsa.usage),
                    Selector::from(tlsa.selector),
                    Matching::from(tlsa.matching),
                    tlsa.cert_data.clone(),
                )),
            ));
        }

        for template in &self.tlsa_generated {
            // Derive the certificate host from the owner by stripping the
            // leading underscore labels (_port._transport).
            let mut host = suffix;
            for _ in 0..2 {
                let (tail, rest) = names::split_tail(host);
                if tail.starts_with('_') {
                    host = rest;
                } else {
                    break;
                }
            }
            if !host.ends_with('.') {
                continue;
            }
            let host = host.trim_end_matches('.');
            if host.is_empty() {
                continue;
            }
            let der = match template.fill(host) {
                Ok(der) => der,
                Err(err) => {
                    debug!("cannot fill rehydrated certificate for {host}: {err}");
                    continue;
                }
            };
            out.push(Record::from_rdata(
                owner.clone(),
                DEFAULT_TTL,
                RData::TLSA(TLSA::new(
                    CertUsage::from(3),
                    Selector::from(0),
                    Matching::from(0),
                    der,
                )),
            ));
        }
    }

    /// Applies the relative-name qualification rules and host-validates the
    /// result. Returns None for names that must be dropped.
    fn qualify(&self, name: &str, suffix: &str, apex_suffix: &str) -> Option<String> {
        let name = name.to_lowercase();
        let qualified = if name.ends_with('.') {
            name
        } else {
            let suffix = if self.is_top_level {
                suffix
            } else {
                names::split_tail(suffix).1
            };
            if name.is_empty() {
                suffix.to_owned()
            } else if name == "@" {
                apex_suffix.to_owned()
            } else if let Some(stripped) = name.strip_suffix(".@") {
                format!("{stripped}.{apex_suffix}")
            } else {
                format!("{name}.{suffix}")
            }
        };
        names::is_host_name(&qualified).then_some(qualified)
    }
}

/// Owner name for a prefixed (SRV/TLSA) record: `<prefix>.<suffix>`, or the
/// node's own owner when the value already sits on the prefixed node.
fn prefixed_owner(owner: &Name, prefix: &str, suffix: &str) -> Option<Name> {
    if prefix.is_empty() {
        return Some(owner.clone());
    }
    Name::from_ascii(format!("{prefix}.{suffix}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse::{parse_value, ErrorSink, NoResolver};
    use trust_dns_proto::rr::RecordType;

    async fn value_of(json: &str) -> Value {
        let mut sink = ErrorSink::new();
        parse_value("d/example", json, &NoResolver, &mut sink)
            .await
            .unwrap()
    }

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    #[tokio::test]
    async fn single_a_record() {
        let v = value_of(r#"{"ip":"1.2.3.4"}"#).await;
        let rrs = v.rrs("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        let rr = &rrs[0];
        assert_eq!(*rr.name(), name("example.bit."));
        assert_eq!(rr.ttl(), 600);
        assert_eq!(rr.record_type(), RecordType::A);
        assert_eq!(*rr.data().unwrap(), RData::A("1.2.3.4".parse().unwrap()));
    }

    #[tokio::test]
    async fn ns_records_qualify_and_delegate() {
        let v = value_of(r#"{"ns":["a","b"],"ip":"1.2.3.4","txt":"hidden"}"#).await;
        let rrs = v.rrs("example.bit.", "example.bit.").unwrap();
        // delegation suppresses the leaf types entirely
        assert_eq!(rrs.len(), 2);
        for rr in &rrs {
            assert_eq!(rr.record_type(), RecordType::NS);
            assert_eq!(*rr.name(), name("example.bit."));
        }
        let targets: Vec<String> = rrs
            .iter()
            .map(|rr| match rr.data().unwrap() {
                RData::NS(n) => n.to_ascii(),
                other => panic!("unexpected rdata {other:?}"),
            })
            .collect();
        assert_eq!(targets, vec!["a.example.bit.", "b.example.bit."]);
    }

    #[tokio::test]
    async fn subtree_walk_emits_map_children() {
        let v = value_of(r#"{"map":{"www":{"ip":"1.2.3.4"}}}"#).await;
        let rrs = v.rrs_recursive("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        assert_eq!(*rrs[0].name(), name("www.example.bit."));
        assert_eq!(rrs[0].record_type(), RecordType::A);
    }

    #[tokio::test]
    async fn ds_first_and_preserved_through_delegation() {
        let v = value_of(
            r#"{"ns":["ns1.example.com."],
                "ds":[[12345,8,2,"4tPJFvbe6scylOgmj7WIUESoM/xUWViPSpGEz8QaV2Y="]]}"#,
        )
        .await;
        let rrs = v.rrs("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 2);
        assert_eq!(rrs[0].record_type(), RecordType::DS);
        assert_eq!(rrs[1].record_type(), RecordType::NS);
        match rrs[0].data().unwrap() {
            RData::DNSSEC(DNSSECRData::DS(ds)) => {
                assert_eq!(ds.key_tag(), 12345);
                assert_eq!(ds.algorithm(), Algorithm::RSASHA256);
                assert_eq!(ds.digest_type(), DigestType::SHA256);
                assert_eq!(
                    hex::encode_upper(ds.digest()),
                    "E2D3C916F6DEEAC73294E8268FB5885044A833FC5459588F4A9184CFC41A5766"
                );
            }
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[tokio::test]
    async fn cname_suppresses_leaf_types_but_not_srv() {
        let v = value_of(
            r#"{"alias":"target.example.com.","ip":"1.2.3.4",
                "service":[["http","tcp",0,0,80,"www.example.com."]]}"#,
        )
        .await;
        let rrs = v.rrs("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 2);
        assert_eq!(rrs[0].record_type(), RecordType::CNAME);
        assert_eq!(rrs[1].record_type(), RecordType::SRV);
        assert_eq!(*rrs[1].name(), name("_http._tcp.example.bit."));
    }

    #[tokio::test]
    async fn dname_beats_cname_and_uses_unknown_rdata() {
        let v = value_of(r#"{"translate":"other.example.com.","alias":"ignored."}"#).await;
        let rrs = v.rrs("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        assert_eq!(rrs[0].record_type(), RecordType::Unknown(DNAME_TYPE));
        match rrs[0].data().unwrap() {
            RData::Unknown { code, rdata } => {
                assert_eq!(*code, DNAME_TYPE);
                let expected = name("other.example.com.").to_bytes().unwrap();
                assert_eq!(rdata.anything(), &expected[..]);
            }
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_alias_points_at_parent_for_subnodes() {
        let v = value_of(r#"{"map":{"www":{"alias":""}}}"#).await;
        let rrs = v.rrs_recursive("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        match rrs[0].data().unwrap() {
            RData::CNAME(target) => assert_eq!(target.to_ascii(), "example.bit."),
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[tokio::test]
    async fn at_sign_qualifies_to_apex() {
        let v = value_of(r#"{"map":{"a":{"map":{"b":{"alias":"@"}}}}}"#).await;
        let rrs = v.rrs_recursive("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        assert_eq!(*rrs[0].name(), name("b.a.example.bit."));
        match rrs[0].data().unwrap() {
            RData::CNAME(target) => assert_eq!(target.to_ascii(), "example.bit."),
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[tokio::test]
    async fn dot_at_suffix_replaces_with_apex() {
        let v = value_of(r#"{"map":{"www":{"alias":"mail.@"}}}"#).await;
        let rrs = v.rrs_recursive("example.bit.", "example.bit.").unwrap();
        match rrs[0].data().unwrap() {
            RData::CNAME(target) => assert_eq!(target.to_ascii(), "mail.example.bit."),
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_targets_are_dropped_silently() {
        let v = value_of(r#"{"ns":["ok.example.com.","-bad-"]}"#).await;
        let rrs = v.rrs("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
    }

    #[tokio::test]
    async fn wildcard_and_invalid_labels_in_recursion() {
        let v = value_of(
            r#"{"map":{"*":{"ip":"1.2.3.4"},"Bad Label":{"ip":"5.6.7.8"}}}"#,
        )
        .await;
        let rrs = v.rrs_recursive("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        assert_eq!(*rrs[0].name(), name("*.example.bit."));
    }

    #[tokio::test]
    async fn delegation_cuts_the_subtree() {
        let v = value_of(
            r#"{"map":{"sub":{"ns":["ns1.example.com."],
                "map":{"below":{"ip":"1.2.3.4"}}}}}"#,
        )
        .await;
        let rrs = v.rrs_recursive("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        assert_eq!(rrs[0].record_type(), RecordType::NS);
        assert_eq!(*rrs[0].name(), name("sub.example.bit."));
    }

    #[tokio::test]
    async fn txt_record_synthesis() {
        let v = value_of(r#"{"txt":[["seg1","seg2"]]}"#).await;
        let rrs = v.rrs("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        match rrs[0].data().unwrap() {
            RData::TXT(txt) => {
                let segs: Vec<&[u8]> = txt.iter().map(|b| &b[..]).collect();
                assert_eq!(segs, vec![b"seg1".as_slice(), b"seg2".as_slice()]);
            }
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[tokio::test]
    async fn mx_qualifies_relative_exchange() {
        let v = value_of(r#"{"mx":[[10,"mail"]]}"#).await;
        let rrs = v.rrs("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        match rrs[0].data().unwrap() {
            RData::MX(mx) => {
                assert_eq!(mx.preference(), 10);
                assert_eq!(mx.exchange().to_ascii(), "mail.example.bit.");
            }
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[tokio::test]
    async fn dane_tlsa_passthrough() {
        let v = value_of(r#"{"tls":[[3,0,1,"MTIzNA=="]]}"#).await;
        let rrs = v.rrs("_443._tcp.example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        assert_eq!(*rrs[0].name(), name("_443._tcp.example.bit."));
        match rrs[0].data().unwrap() {
            RData::TLSA(tlsa) => {
                assert_eq!(tlsa.cert_usage(), CertUsage::from(3));
                assert_eq!(tlsa.matching(), Matching::from(1));
                assert_eq!(tlsa.cert_data(), b"1234");
            }
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[tokio::test]
    async fn dehydrated_tlsa_is_rehydrated_and_filled() {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;

        let mut spki = vec![
            0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
        ];
        spki.extend([0xab; 32]);
        let json = serde_json::json!({
            "tls": [{"d8": [1, BASE64.encode(&spki), 5_000_000, 5_100_000, 16,
                            BASE64.encode([0x5a; 64])]}]
        })
        .to_string();

        let v = value_of(&json).await;
        assert_eq!(v.tlsa_generated.len(), 1);
        let rrs = v.rrs("_443._tcp.example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        assert_eq!(*rrs[0].name(), name("_443._tcp.example.bit."));
        match rrs[0].data().unwrap() {
            RData::TLSA(tlsa) => {
                assert_eq!(tlsa.cert_usage(), CertUsage::from(3));
                assert_eq!(tlsa.selector(), Selector::from(0));
                assert_eq!(tlsa.matching(), Matching::from(0));
                // the payload is a DER certificate bound to example.bit
                assert_eq!(tlsa.cert_data()[0], 0x30);
                let expected = crate::certdehydrate::DehydratedCertificate {
                    pubkey_b64: BASE64.encode(&spki),
                    not_before_scaled: 5_000_000,
                    not_after_scaled: 5_100_000,
                    signature_algorithm: 16,
                    signature_b64: BASE64.encode([0x5a; 64]),
                };
                assert_eq!(
                    tlsa.cert_data(),
                    expected
                        .rehydrate()
                        .unwrap()
                        .fill("example.bit")
                        .unwrap()
                        .as_slice()
                );
            }
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[tokio::test]
    async fn legacy_tlsa_owner_prefix() {
        let v = value_of(r#"{"tlsa":[[443,"tcp",3,0,0,"MTIzNA=="]]}"#).await;
        let rrs = v.rrs("example.bit.", "example.bit.").unwrap();
        assert_eq!(rrs.len(), 1);
        assert_eq!(*rrs[0].name(), name("_443._tcp.example.bit."));
    }
}
