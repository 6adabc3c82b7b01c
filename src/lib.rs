//! nmcdns
//!
//! An authoritative DNS server that projects the Namecoin `.bit` namespace
//! into DNS. Queries for names under a configurable *floating anchor*
//! label (conventionally `bit`, served wherever it appears in a query
//! name) are resolved by fetching the corresponding `d/` entry from the
//! blockchain over JSON-RPC, parsing its JSON value into a record tree,
//! and synthesizing standard resource records: A, AAAA, NS, CNAME, DNAME,
//! MX, SRV, TXT, DS and TLSA, including TLSA certificates rehydrated from
//! dehydrated tuples stored on chain.
//!
//! The resolution pipeline lives in [`backend`] (query decomposition,
//! caching, upstream gateway), [`domain`] (value parsing with
//! `import`/`delegate` merging, record synthesis) and [`certdehydrate`]
//! (deterministic X.509 reconstruction). [`dns`] and [`api`] are thin
//! transport and console layers over [`Backend::lookup`].
#![warn(clippy::pedantic)]

pub mod api;
pub mod backend;
pub mod certdehydrate;
pub mod config;
pub mod dns;
pub mod domain;
pub mod dump;
pub mod error;
pub mod names;
pub mod namecoin;

pub use backend::{Backend, NameSource};
pub use config::{Config, SharedConfig};
pub use error::Error;
