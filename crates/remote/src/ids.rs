use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::ensure;

use super::error::{InvalidIdSnafu, RemoteError, RemoteResult};

/// Opaque conversation identifier assigned by the remote store.
///
/// The store may emit ids as JSON strings or integers; both decode to the same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn parse(raw: &str) -> RemoteResult<Self> {
        let trimmed = raw.trim();
        ensure!(
            !trimmed.is_empty() && !trimmed.contains('/'),
            InvalidIdSnafu {
                stage: "parse-conversation-id",
                raw: raw.to_string(),
            }
        );
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl FromStr for ConversationId {
    type Err = RemoteError;

    fn from_str(raw: &str) -> RemoteResult<Self> {
        Self::parse(raw)
    }
}

impl Serialize for ConversationId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Number(u64),
            Text(String),
        }

        let raw = match WireId::deserialize(deserializer)? {
            WireId::Number(value) => value.to_string(),
            WireId::Text(value) => value,
        };
        Self::parse(&raw).map_err(D::Error::custom)
    }
}
