use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Denomination value (as sent by the form, e.g. `"500"`) to count.
pub type Denominations = BTreeMap<String, serde_json::Value>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: String,
    pub volunteer_name: String,
    pub donor_name: String,
    #[serde(rename = "donorPAN")]
    pub donor_pan: String,
    pub email: String,
    pub mobile_no: String,
    pub address: String,
    pub denominations: Denominations,
    pub total: f64,
    pub receipt_number: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
}
