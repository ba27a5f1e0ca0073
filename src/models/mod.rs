//! Wire types exchanged with the compose UI and the upstream publishing API.
//!
//! Nothing here is persisted; every type lives for a single request.

pub mod account;
pub mod history;
pub mod link;
pub mod post;
