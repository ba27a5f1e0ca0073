//! Linked social accounts, projected from the upstream `/user` profile.

use serde::{Deserialize, Serialize};

/// A platform the user has linked, as shown by the UI.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LinkedAccount {
    /// Platform identifier, e.g. `facebook` or `linkedin`.
    #[serde(rename = "name")]
    pub platform: String,

    /// Public profile URL; empty when upstream does not report one.
    #[serde(rename = "profileUrl")]
    pub profile_url: String,
}

/// Response body of `GET /api/user-accounts`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccounts {
    pub active_social_accounts: Vec<LinkedAccount>,
}

/// The part of the upstream user profile the relay reads. Every other field
/// of the upstream response is ignored.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamUser {
    #[serde(default)]
    pub active_social_accounts: Vec<String>,
    #[serde(default)]
    pub display_names: Vec<UpstreamDisplayName>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamDisplayName {
    pub platform: String,
    #[serde(default)]
    pub profile_url: Option<String>,
}

impl UpstreamUser {
    /// One entry per active platform, in upstream order.
    pub fn linked_accounts(&self) -> Vec<LinkedAccount> {
        self.active_social_accounts
            .iter()
            .map(|platform| LinkedAccount {
                platform: platform.clone(),
                profile_url: self
                    .display_names
                    .iter()
                    .find(|entry| &entry.platform == platform)
                    .and_then(|entry| entry.profile_url.clone())
                    .unwrap_or_default(),
            })
            .collect()
    }
}
