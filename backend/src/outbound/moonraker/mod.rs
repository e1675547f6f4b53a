//! Moonraker outbound adapter.
//!
//! Implements the `DeviceStatusSource` port against the Moonraker API that
//! Klipper printers expose.

mod dto;
mod http_source;

pub use http_source::MoonrakerStatusSource;
