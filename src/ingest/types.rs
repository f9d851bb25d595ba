// src/ingest/types.rs
use serde::Deserialize;

use crate::error::FetchError;

/// Channel message identifier (Discord snowflake). Monotonically increasing,
/// so plain integer order is publication order.
pub type MessageId = u64;

/// One message as the channel transport delivers it. Immutable once fetched.
/// Unknown fields are ignored at the edge; absent `content`/`embeds` keys
/// deserialize to empty defaults rather than failing the whole page.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawMessage {
    #[serde(deserialize_with = "snowflake")]
    pub id: MessageId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EmbedField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EmbedFooter {
    pub text: Option<String>,
}

/// Snowflakes arrive as JSON strings on the wire.
fn snowflake<'de, D>(d: D) -> Result<MessageId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    raw.parse::<MessageId>().map_err(serde::de::Error::custom)
}

/// Something that can page through channel messages newer than a given id.
///
/// Contract: the returned set is sorted ascending by id. `after = None`
/// returns the newest existing messages (used once to seed the cursor).
#[async_trait::async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_after(
        &self,
        after: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, FetchError>;

    fn name(&self) -> &'static str;
}
