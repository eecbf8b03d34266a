pub mod receipts;
pub mod records;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::db::models::Denominations;

/// Form fields such as `mobileNo` arrive as either strings or numbers.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Amounts sent from form inputs come as numeric strings; blank or null is zero.
pub(crate) fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(0.0),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom(format!("amount out of range: {}", n))),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(0.0),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("invalid amount: {:?}", s))),
        other => Err(D::Error::custom(format!("invalid amount: {}", other))),
    }
}

/// A missing or null denominations map is an empty one.
pub(crate) fn lenient_denominations<'de, D>(deserializer: D) -> Result<Denominations, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Denominations>::deserialize(deserializer)?.unwrap_or_default())
}
