//! Raw receipt records: stored as sent, without a number from the allocator
//! and without a rendered document.

use axum::extract::{rejection::JsonRejection, Json, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{lenient_amount, lenient_denominations, lenient_string};
use crate::db::{self, models::{Denominations, Receipt}};
use crate::error::Result;
use crate::numbering;
use crate::AppState;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRecordRequest {
    #[serde(deserialize_with = "lenient_string")]
    pub volunteer_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub donor_name: String,
    #[serde(deserialize_with = "lenient_denominations")]
    pub denominations: Denominations,
    #[serde(deserialize_with = "lenient_amount")]
    pub total: f64,
}

#[derive(Serialize)]
pub struct CreateRecordResponse {
    pub message: &'static str,
    pub receipt: Receipt,
}

pub async fn create_record(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateRecordRequest>, JsonRejection>,
) -> Result<Json<CreateRecordResponse>> {
    let Json(req) = body?;
    let now = Utc::now();
    let receipt = Receipt {
        id: Uuid::new_v4().to_string(),
        volunteer_name: req.volunteer_name,
        donor_name: req.donor_name,
        donor_pan: String::new(),
        email: String::new(),
        mobile_no: String::new(),
        address: String::new(),
        denominations: req.denominations,
        total: req.total,
        receipt_number: numbering::record_number(now),
        date: now,
        pdf_path: None,
    };

    db::insert_receipt(&state.db, &receipt).await?;
    tracing::info!("Record saved: {}", receipt.receipt_number);

    Ok(Json(CreateRecordResponse {
        message: "Receipt Generated",
        receipt,
    }))
}

pub async fn list_records(State(state): State<AppState>) -> Result<Json<Vec<Receipt>>> {
    let receipts = db::list_receipts(&state.db).await?;
    Ok(Json(receipts))
}
