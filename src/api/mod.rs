//! Read-only HTTP status console.
//!
//! # Endpoints
//!
//! ## `/healthcheck` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the
//!   service is operational.
//!
//! ## `/info` (GET)
//!
//!   Returns server metadata:
//!
//!   ```json
//!   {"version":"0.4.0","anchor":"bit","ready":true,
//!    "cache_entries":12,"uptime_secs":3600}
//!   ```
//!
//! ## `/lookup` (GET)
//!
//!   Debug resolution of a single name through the same pipeline the DNS
//!   transport uses, e.g. `GET /lookup?name=example.bit.`:
//!
//!   ```json
//!   {"name":"example.bit.","records":["example.bit. 600 IN A 1.2.3.4"]}
//!   ```
//!
//!   Resolution failures map to HTTP statuses: names outside or absent
//!   from the zone give 404, a closed readiness gate gives 503, an
//!   upstream deadline gives 504.
//!
//! The console binds only when `api_bind_addr` is configured. It performs
//! no authentication and must not be exposed publicly.

mod api_error;
mod model;
mod routes;
pub mod server;

pub use server::new;
