//! Account-linking handshake exchanged with `/profiles/generateJWT`.

use serde::{Deserialize, Serialize};

/// Request for a signed link URL. `verify` is always sent as `true`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateJwtRequest<'a> {
    pub domain: &'a str,
    pub private_key: &'a str,
    pub profile_key: &'a str,
    pub verify: bool,
}

/// Upstream reply; only the URL is used.
#[derive(Deserialize, Debug)]
pub struct GenerateJwtResponse {
    pub url: String,
}

/// Response body of `GET /api/generate-jwt`.
#[derive(Serialize, Debug)]
pub struct HandshakeUrl {
    pub url: String,
}
