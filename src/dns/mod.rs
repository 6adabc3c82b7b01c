//! DNS transport: serves [`Backend`][crate::backend::Backend] lookups over
//! UDP and TCP.
//!
//! The handler is intentionally thin. It lower-cases and decomposes
//! nothing itself; it hands the query name to the backend, maps the error
//! taxonomy onto response codes (`NotInZone` → REFUSED, `NoSuchDomain` →
//! NXDOMAIN, operational failures → SERVFAIL), and assigns the synthesized
//! records to message sections. Wildcard expansion happens in the backend
//! walk; CNAME-chain following and DNSSEC signing are left to downstream
//! resolvers.

mod handlers;
pub mod server;

pub use server::new;
