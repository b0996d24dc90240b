use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Envelope returned by `reddit/search/submission/`.
///
/// Records stay undecoded so that one malformed entry does not cost the whole
/// page; [`SearchResponse::len`] is what the API actually returned. A body
/// without a `data` array (an error envelope) does not decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub data: Vec<Value>,
}

impl SearchResponse {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode each record in API order.
    pub fn submissions(&self) -> impl Iterator<Item = Result<Submission, serde_json::Error>> + '_ {
        self.data.iter().map(Submission::from_value)
    }
}

/// The part of a Reddit submission the pipeline reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    /// Seconds since the Unix epoch.
    #[serde(deserialize_with = "epoch_seconds")]
    pub created_utc: i64,
}

impl Submission {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Submission::deserialize(value)
    }
}

// Pushshift has served `created_utc` as an integer, a float and a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum EpochRepr {
    Int(i64),
    Float(f64),
    Text(String),
}

fn epoch_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = match EpochRepr::deserialize(deserializer)? {
        EpochRepr::Int(v) => return Ok(v),
        EpochRepr::Float(v) => v,
        EpochRepr::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| D::Error::custom(format!("created_utc `{s}`: {e}")))?,
    };
    if !secs.is_finite() || secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return Err(D::Error::custom(format!("created_utc out of range: {secs}")));
    }
    Ok(secs.trunc() as i64)
}
