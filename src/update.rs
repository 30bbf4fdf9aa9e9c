//! RIS Live wire types: inbound frames, decoded BGP updates, and outbound
//! subscription requests.
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame type carrying a BGP message.
pub const FRAME_TYPE_MESSAGE: &str = "ris_message";
/// Frame type carrying a server side error report.
pub const FRAME_TYPE_ERROR: &str = "ris_error";
/// Frame type of an outbound subscription directive.
pub const FRAME_TYPE_SUBSCRIBE: &str = "ris_subscribe";

/// BGP message type tag of route updates.
pub const UPDATE_TYPE: &str = "UPDATE";

/// Envelope of every inbound frame. Only `ris_message` frames carry a
/// [RawUpdate] in `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl StreamFrame {
    pub fn is_message(&self) -> bool {
        self.frame_type == FRAME_TYPE_MESSAGE
    }

    pub fn is_error(&self) -> bool {
        self.frame_type == FRAME_TYPE_ERROR
    }
}

/// Decoded form of one BGP message from the stream.
///
/// Only lives for the duration of a single message's processing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawUpdate {
    /// BGP message type, e.g. `UPDATE`, `KEEPALIVE`
    #[serde(rename = "type", default)]
    pub msg_type: String,
    /// single announced prefix, if any
    #[serde(default)]
    pub prefix: Option<String>,
    /// AS path with the origin last; AS_SET segments are flattened in order
    #[serde(default, alias = "path", deserialize_with = "deserialize_as_path")]
    pub as_path: Vec<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_asn")]
    pub peer_asn: Option<u32>,
    /// seconds since epoch
    #[serde(default)]
    pub timestamp: Option<f64>,
    /// route collector that observed the message
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, alias = "withdrawals")]
    pub withdrawn: Vec<String>,
    #[serde(default)]
    pub announcements: Vec<Value>,
}

impl RawUpdate {
    pub fn is_update(&self) -> bool {
        self.msg_type == UPDATE_TYPE
    }

    /// Collector identifier, `unknown` when the message does not carry one.
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("unknown")
    }

    /// The AS that originated the route: the last hop of the path, falling
    /// back to the peer ASN for an empty path.
    pub fn origin_asn(&self) -> Option<u32> {
        self.as_path.last().copied().or(self.peer_asn)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PathSegment {
    Asn(AsnValue),
    Set(Vec<AsnValue>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AsnValue {
    Number(u32),
    Text(String),
}

impl AsnValue {
    fn into_asn<E: de::Error>(self) -> Result<u32, E> {
        match self {
            AsnValue::Number(n) => Ok(n),
            AsnValue::Text(s) => s
                .trim()
                .trim_start_matches("AS")
                .parse::<u32>()
                .map_err(|_| E::custom(format!("invalid ASN: {}", s))),
        }
    }
}

fn deserialize_as_path<'de, D>(deserializer: D) -> Result<Vec<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let segments = Option::<Vec<PathSegment>>::deserialize(deserializer)?.unwrap_or_default();
    let mut path = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            PathSegment::Asn(asn) => path.push(asn.into_asn()?),
            PathSegment::Set(set) => {
                for asn in set {
                    path.push(asn.into_asn()?);
                }
            }
        }
    }
    Ok(path)
}

fn deserialize_opt_asn<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<AsnValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(v) => v.into_asn().map(Some),
    }
}

/// Outbound subscription directive, one per collector.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub data: SubscribeData,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubscribeData {
    pub host: String,
    #[serde(rename = "socketOptions")]
    pub socket_options: SocketOptions,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SocketOptions {
    #[serde(rename = "includeRaw")]
    pub include_raw: bool,
}

impl SubscribeRequest {
    pub fn new(host: &str) -> Self {
        Self {
            frame_type: FRAME_TYPE_SUBSCRIBE,
            data: SubscribeData {
                host: host.to_string(),
                socket_options: SocketOptions { include_raw: false },
            },
        }
    }
}
