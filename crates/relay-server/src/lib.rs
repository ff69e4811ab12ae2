//! Relay server crate: the v2 HTTP surface and event ingestion pipeline.

pub mod relay_server;
