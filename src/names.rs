//! Name handling: label validation profiles, owner-name splits, the
//! floating-anchor decomposition, and the blockchain key codec.
//!
//! All validation operates on ASCII names that have already been folded to
//! lower case. Three label profiles exist:
//!
//! - *owner labels* may contain underscores anywhere (`_443`, `_tcp`);
//! - *domain labels* are registrable blockchain basenames;
//! - *host labels* name machines (NS/MX/SRV/CNAME targets) and therefore
//!   forbid leading/trailing `-`/`_`, with the final label of a host name
//!   required to start with a letter so it can never be mistaken for an IP
//!   literal.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Error;

/// Maximum length of a full name in presentation form.
const MAX_NAME_LEN: usize = 255;
/// Maximum length of a single label.
const MAX_LABEL_LEN: usize = 63;

/// The prefix under which domain names are registered in the blockchain.
const DOMAIN_NAMESPACE: &str = "d/";

lazy_static! {
    static ref OWNER_LABEL_RE: Regex =
        Regex::new(r"^(?:[a-z0-9_]|[a-z0-9_][a-z0-9_-]{0,61}[a-z0-9_])$").unwrap();
    static ref DOMAIN_LABEL_RE: Regex =
        Regex::new(r"^(?:xn--)?(?:[a-z0-9]+-)*[a-z0-9]+$").unwrap();
    static ref HOST_LABEL_RE: Regex =
        Regex::new(r"^(?:[a-z0-9]|[a-z0-9][a-z0-9_-]{0,61}[a-z0-9])$").unwrap();
}

/// Returns true iff `label` is acceptable as an owner label (a key of a
/// `map`, or a label of a synthesized owner name).
pub fn is_owner_label(label: &str) -> bool {
    label.len() <= MAX_LABEL_LEN && OWNER_LABEL_RE.is_match(label)
}

/// Returns true iff `label` is a valid blockchain basename.
pub fn is_domain_label(label: &str) -> bool {
    label.len() <= MAX_LABEL_LEN && DOMAIN_LABEL_RE.is_match(label)
}

/// Returns true iff `label` can appear inside a host name. `final_label`
/// selects the stricter rule for the rightmost label.
fn is_host_label(label: &str, final_label: bool) -> bool {
    if label.len() > MAX_LABEL_LEN || !HOST_LABEL_RE.is_match(label) {
        return false;
    }
    // The final label must not look like part of an IP literal.
    !final_label || label.starts_with(|c: char| c.is_ascii_alphabetic())
}

/// Validates a host name (an NS/MX/SRV/CNAME target). A single trailing dot
/// is permitted. The root name `.` is not a host.
pub fn is_host_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    let last = labels.len() - 1;
    labels
        .iter()
        .enumerate()
        .all(|(i, label)| is_host_label(label, i == last))
}

/// Validates a service (application or transport protocol) name used to
/// build `_app._transport` owner prefixes.
pub fn is_service_name(name: &str) -> bool {
    // 62 leaves room for the leading underscore within the label bound.
    !name.is_empty() && name.len() <= 62 && is_owner_label(name)
}

/// Loosely validates an e-mail address: exactly one `@` with a nonempty
/// local part and a host-name domain.
pub fn is_email(addr: &str) -> bool {
    match addr.split_once('@') {
        Some((user, host)) => !user.is_empty() && !user.contains('@') && is_host_name(host),
        None => false,
    }
}

/// Appends the trailing dot a fully qualified name requires, if absent.
pub fn absname(name: &str) -> String {
    if name.is_empty() {
        return ".".to_owned();
    }
    if name.ends_with('.') {
        return name.to_owned();
    }
    format!("{name}.")
}

/// Splits `a.b.c` into the head `c` and the rest `a.b`. A single trailing
/// dot is ignored; a single label has an empty rest.
pub fn split_head(name: &str) -> (&str, &str) {
    let name = name.strip_suffix('.').unwrap_or(name);
    match name.rsplit_once('.') {
        Some((rest, head)) => (head, rest),
        None => (name, ""),
    }
}

/// Splits `a.b.c` into the tail `a` and the rest `b.c`. Unlike
/// [`split_head`], a trailing dot is preserved in the rest so that dropping
/// the deepest label of a fully qualified name yields a fully qualified
/// name.
pub fn split_tail(name: &str) -> (&str, &str) {
    match name.split_once('.') {
        Some((tail, rest)) => (tail, rest),
        None => (name, ""),
    }
}

/// The decomposition of a query name around the floating anchor label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QnameParts {
    /// Labels to the left of the basename, e.g. `a.b.c`. Empty at and one
    /// level below the anchor.
    pub subname: String,
    /// The blockchain-registered label, e.g. `d` for `d.bit.`. Empty at the
    /// anchor itself.
    pub basename: String,
    /// The anchor label and everything to its right, e.g. `bit.x.y.z`.
    pub rootname: String,
}

/// Scans the labels of `qname` from the right for the first occurrence of
/// `anchor` and splits around it. Fails with [`Error::NotInZone`] when the
/// anchor does not appear.
pub fn split_by_floating_anchor(qname: &str, anchor: &str) -> Result<QnameParts, Error> {
    let qname = qname.trim_end_matches('.');
    let parts: Vec<&str> = qname.split('.').collect();

    if parts.len() < 2 {
        if parts[0] != anchor {
            return Err(Error::NotInZone);
        }
        return Ok(QnameParts {
            subname: String::new(),
            basename: String::new(),
            rootname: qname.to_owned(),
        });
    }

    for i in (0..parts.len()).rev() {
        if parts[i] != anchor {
            continue;
        }
        if i == 0 {
            // The anchor is the deepest label: something like bit.x.y.z.
            return Ok(QnameParts {
                subname: String::new(),
                basename: String::new(),
                rootname: qname.to_owned(),
            });
        }
        return Ok(QnameParts {
            subname: parts[..i - 1].join("."),
            basename: parts[i - 1].to_owned(),
            rootname: parts[i..].join("."),
        });
    }

    Err(Error::NotInZone)
}

/// Maps a basename to its blockchain key: `example` becomes `d/example`.
pub fn basename_to_key(basename: &str) -> Result<String, Error> {
    if !is_domain_label(basename) {
        return Err(Error::InvalidName(basename.to_owned()));
    }
    Ok(format!("{DOMAIN_NAMESPACE}{basename}"))
}

/// Strips the `d/` namespace from a blockchain key and validates the
/// remaining basename.
pub fn key_to_basename(key: &str) -> Result<&str, Error> {
    let basename = key
        .strip_prefix(DOMAIN_NAMESPACE)
        .ok_or_else(|| Error::InvalidName(key.to_owned()))?;
    if !is_domain_label(basename) {
        return Err(Error::InvalidName(key.to_owned()));
    }
    Ok(basename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_labels() {
        for ok in ["a", "_", "_443", "_tcp", "foo-bar", "x9", "a_b"] {
            assert!(is_owner_label(ok), "{ok}");
        }
        assert!(!is_owner_label("_x._y"));
        assert!(!is_owner_label(""));
        assert!(!is_owner_label("-a"));
        assert!(!is_owner_label("a-"));
        assert!(!is_owner_label("Ab"));
        assert!(!is_owner_label(&"a".repeat(64)));
        assert!(is_owner_label(&"a".repeat(63)));
    }

    #[test]
    fn domain_labels() {
        assert!(is_domain_label("example"));
        assert!(is_domain_label("ex-ample"));
        assert!(is_domain_label("xn--nxasmq6b"));
        assert!(is_domain_label("a1-b2-c3"));
        assert!(!is_domain_label(""));
        assert!(!is_domain_label("_example"));
        assert!(!is_domain_label("-example"));
        assert!(!is_domain_label("example-"));
        assert!(!is_domain_label("ex--ample"));
        assert!(!is_domain_label("Example"));
    }

    #[test]
    fn host_names() {
        assert!(is_host_name("ns1.example.com"));
        assert!(is_host_name("ns1.example.com."));
        assert!(is_host_name("a.b"));
        assert!(is_host_name("this.x--nmc.bit."));
        // all-numeric final label would collide with IP literals
        assert!(!is_host_name("1.2.3.4"));
        assert!(!is_host_name("mail.127"));
        assert!(!is_host_name("_sip.example.com"));
        assert!(!is_host_name("-a.example.com"));
        assert!(!is_host_name(""));
        assert!(!is_host_name("."));
    }

    #[test]
    fn emails() {
        assert!(is_email("hostmaster@example.com"));
        assert!(is_email("a.b@example.com"));
        assert!(!is_email("example.com"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("a@b@c.com"));
    }

    #[test]
    fn head_and_tail_splits() {
        assert_eq!(split_head("a.b.c."), ("c", "a.b"));
        assert_eq!(split_head("a.b.c"), ("c", "a.b"));
        assert_eq!(split_head("c"), ("c", ""));
        assert_eq!(split_tail("a.b.c"), ("a", "b.c"));
        assert_eq!(split_tail("a.b.c."), ("a", "b.c."));
        assert_eq!(split_tail("bit."), ("bit", ""));
        assert_eq!(split_tail("a"), ("a", ""));
    }

    fn parts(sub: &str, base: &str, root: &str) -> QnameParts {
        QnameParts {
            subname: sub.to_owned(),
            basename: base.to_owned(),
            rootname: root.to_owned(),
        }
    }

    #[test]
    fn floating_anchor_split() {
        assert!(matches!(
            split_by_floating_anchor("anything.invalid.", "bit"),
            Err(Error::NotInZone)
        ));
        assert_eq!(
            split_by_floating_anchor("bit.", "bit").unwrap(),
            parts("", "", "bit")
        );
        assert_eq!(
            split_by_floating_anchor("d.bit.", "bit").unwrap(),
            parts("", "d", "bit")
        );
        assert_eq!(
            split_by_floating_anchor("c.d.bit.", "bit").unwrap(),
            parts("c", "d", "bit")
        );
        assert_eq!(
            split_by_floating_anchor("a.b.c.d.bit.", "bit").unwrap(),
            parts("a.b.c", "d", "bit")
        );
        assert_eq!(
            split_by_floating_anchor("d.bit.x.y.z.", "bit").unwrap(),
            parts("", "d", "bit.x.y.z")
        );
        assert_eq!(
            split_by_floating_anchor("a.b.c.d.bit.x.y.z.", "bit").unwrap(),
            parts("a.b.c", "d", "bit.x.y.z")
        );
        assert_eq!(
            split_by_floating_anchor("bit.x.y.z.", "bit").unwrap(),
            parts("", "", "bit.x.y.z")
        );
    }

    #[test]
    fn floating_anchor_round_trip() {
        // join(sub, base, root) must split back into the same tuple
        let cases = [
            ("", "example", "bit"),
            ("www", "example", "bit"),
            ("a.b.c", "example", "bit.example.com"),
            ("", "", "bit"),
        ];
        for (sub, base, root) in cases {
            let joined = [sub, base, root]
                .iter()
                .filter(|p| !p.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(".");
            let got = split_by_floating_anchor(&format!("{joined}."), "bit").unwrap();
            assert_eq!(got, parts(sub, base, root), "{joined}");
        }
    }

    #[test]
    fn key_codec_round_trip() {
        for base in ["example", "xn--nxasmq6b", "a-b-c"] {
            let key = basename_to_key(base).unwrap();
            assert_eq!(key, format!("d/{base}"));
            assert_eq!(key_to_basename(&key).unwrap(), base);
        }
        assert!(basename_to_key("_bad").is_err());
        assert!(basename_to_key("").is_err());
        assert!(key_to_basename("dd/example").is_err());
        assert!(key_to_basename("d/UPPER").is_err());
        assert!(key_to_basename("example").is_err());
    }

    #[test]
    fn absnames() {
        assert_eq!(absname(""), ".");
        assert_eq!(absname("bit"), "bit.");
        assert_eq!(absname("bit."), "bit.");
    }
}
