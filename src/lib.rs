//! Privilege-separated route installation for VPN endpoints.
//!
//! The privileged service ([`service`]) listens for requests naming a
//! certificate DN and an interface, looks the DN up in its own
//! [`routes::authz::AuthorizationTable`], and replaces the kernel routes to
//! every network that DN is allowed. Callers never supply routes. The
//! unprivileged side lives in [`client`].

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod routes;
pub mod service;
