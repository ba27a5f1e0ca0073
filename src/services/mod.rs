//! Relay components and the upstream client they share.

pub mod media_relay;
pub mod post_composer;
pub mod temp_upload;
pub mod upstream_client;
