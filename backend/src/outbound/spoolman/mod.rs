//! Spoolman outbound adapter.
//!
//! Implements the `InventoryService` port against the Spoolman REST API.

mod dto;
mod http_client;

pub use http_client::SpoolmanInventory;
