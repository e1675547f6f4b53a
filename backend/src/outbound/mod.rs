//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed stores using Diesel ORM
//! - **moonraker**: printer status polling and print-file download over HTTP
//! - **spoolman**: filament inventory reads and writes over HTTP
//! - **metrics**: Prometheus-backed reconciliation counters (feature-gated)
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

mod http_support;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod moonraker;
pub mod persistence;
pub mod spoolman;
