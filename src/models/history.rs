use serde::{Deserialize, Serialize};

/// Optional filters accepted by `GET /api/post-history` and forwarded to
/// upstream `/history` as-is.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_records: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_days: Option<u32>,
}
