//! Inbound adapters: the REST API under [`http`] and the live status stream
//! under [`ws`]. Both translate requests into calls on domain ports.

pub mod http;
pub mod ws;
