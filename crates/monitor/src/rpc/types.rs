// Shapes returned by the ledger daemon's local API. Only the fields the
// reporter consumes are modelled; everything else is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsReply {
    pub public_key: String,
    #[serde(default)]
    pub blocks: BlockCounts,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BlockCounts {
    #[serde(default)]
    pub local: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerReply {
    pub public_key: String,
    #[serde(default)]
    pub listeners: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
