use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Json, Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::services::ServeFile;
use uuid::Uuid;

use super::{lenient_amount, lenient_denominations, lenient_string};
use crate::db::{self, models::{Denominations, Receipt}};
use crate::error::{Result, ServiceError};
use crate::numbering;
use crate::render::ReceiptDocument;
use crate::AppState;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateReceiptRequest {
    #[serde(deserialize_with = "lenient_string")]
    pub volunteer_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub donor_name: String,
    #[serde(rename = "donorPAN", deserialize_with = "lenient_string")]
    pub donor_pan: String,
    #[serde(deserialize_with = "lenient_denominations")]
    pub denominations: Denominations,
    #[serde(deserialize_with = "lenient_amount")]
    pub total: f64,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub mobile_no: String,
    #[serde(deserialize_with = "lenient_string")]
    pub address: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReceiptResponse {
    pub message: &'static str,
    pub receipt: Receipt,
    pub pdf_url: String,
}

pub async fn create_receipt(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateReceiptRequest>, JsonRejection>,
) -> Result<Json<CreateReceiptResponse>> {
    let Json(req) = body?;
    let numbering_config = &state.config.numbering;
    let receipt_number =
        db::allocate_receipt_number(&state.db, &numbering_config.prefix, numbering_config.seed)
            .await?;

    let file_name = numbering::pdf_file_name(&receipt_number);
    let pdf_path = std::path::absolute(state.config.storage.receipts_dir.join(&file_name))?;
    tracing::info!("Saving PDF at: {}", pdf_path.display());

    let receipt = Receipt {
        id: Uuid::new_v4().to_string(),
        volunteer_name: req.volunteer_name,
        donor_name: req.donor_name,
        donor_pan: req.donor_pan,
        email: req.email,
        mobile_no: req.mobile_no,
        address: req.address,
        denominations: req.denominations,
        total: req.total,
        receipt_number,
        date: Utc::now(),
        pdf_path: Some(pdf_path.display().to_string()),
    };

    let document = ReceiptDocument::from_receipt(&receipt);
    state.renderer.render(&document, &pdf_path).await?;

    if let Err(e) = db::insert_receipt(&state.db, &receipt).await {
        if let Err(remove_err) = tokio::fs::remove_file(&pdf_path).await {
            tracing::warn!("Could not remove orphaned {}: {}", pdf_path.display(), remove_err);
        }
        return Err(e.into());
    }
    tracing::info!("Receipt saved successfully: {}", receipt.receipt_number);

    Ok(Json(CreateReceiptResponse {
        message: "Receipt Generated and Saved",
        pdf_url: state.config.pdf_url(&file_name),
        receipt,
    }))
}

pub async fn download_receipt(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response> {
    if !is_plain_file_name(&filename) {
        tracing::warn!("Rejected download name {:?}", filename);
        return Err(ServiceError::NotFound);
    }

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|_| ServiceError::NotFound)?;

    let path = state.config.storage.receipts_dir.join(&filename);
    let mut response = ServeFile::new(&path).try_call(request).await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(ServiceError::NotFound);
    }

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok(response.map(Body::new))
}

/// A single normal path component, so downloads stay inside the receipts directory.
fn is_plain_file_name(name: &str) -> bool {
    use std::path::Component;

    let mut components = std::path::Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    ) && !name.contains(['\\', '"'])
}
