//! Receipt document rendering.
//!
//! Two renderers produce the same receipt from a [`ReceiptDocument`]:
//! [`draw::DrawRenderer`] issues PDF drawing operations directly, while
//! [`html::HtmlRenderer`] fills an HTML template and prints it to PDF with a
//! headless browser.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, RendererKind};
use crate::db::models::Receipt;
use crate::denominations::{denomination_rows, rows_total, DenominationRow};
use crate::words::number_to_words;

pub mod draw;
pub mod html;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("template render error: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser failed: {0}")]
    Browser(String),

    #[error("rendering timed out after {0:?}")]
    Timeout(Duration),

    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Everything printed on a receipt, already formatted for display.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptDocument {
    pub receipt_number: String,
    pub formatted_date: String,
    pub formatted_time: String,
    pub volunteer_name: String,
    pub donor_name: String,
    pub donor_pan: String,
    pub email: String,
    pub mobile_no: String,
    pub address: String,
    pub rows: Vec<DenominationRow>,
    pub rows_total: u64,
    pub total: String,
    pub total_in_words: String,
}

impl ReceiptDocument {
    pub fn from_receipt(receipt: &Receipt) -> Self {
        let rows = denomination_rows(&receipt.denominations);
        let local: DateTime<Local> = receipt.date.with_timezone(&Local);

        Self {
            receipt_number: receipt.receipt_number.clone(),
            formatted_date: local.format("%d/%m/%Y").to_string(),
            formatted_time: local.format("%I:%M:%S %p").to_string(),
            volunteer_name: receipt.volunteer_name.clone(),
            donor_name: receipt.donor_name.clone(),
            donor_pan: receipt.donor_pan.clone(),
            email: receipt.email.clone(),
            mobile_no: receipt.mobile_no.clone(),
            address: receipt.address.clone(),
            rows_total: rows_total(&rows),
            rows,
            total: format_amount(receipt.total),
            total_in_words: amount_in_words(receipt.total),
        }
    }
}

/// Whole amounts print without decimals, anything else with two.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{:.0}", amount)
    } else {
        format!("{:.2}", amount)
    }
}

fn amount_in_words(amount: f64) -> String {
    let whole = if amount.is_finite() && amount > 0.0 {
        amount.trunc() as u64
    } else {
        0
    };
    number_to_words(whole)
}

#[async_trait]
pub trait ReceiptRenderer: Send + Sync {
    /// Write the receipt as a PDF at `output`.
    async fn render(&self, document: &ReceiptDocument, output: &Path) -> Result<(), RenderError>;
}

pub fn build_renderer(config: &Config) -> Result<Arc<dyn ReceiptRenderer>, RenderError> {
    let renderer: Arc<dyn ReceiptRenderer> = match config.renderer.kind {
        RendererKind::Draw => Arc::new(draw::DrawRenderer::new(&config.renderer.organization)),
        RendererKind::Html => Arc::new(html::HtmlRenderer::new(
            config.renderer.template_path.as_deref(),
            &config.renderer.browser,
            Duration::from_secs(config.renderer.timeout_secs),
            Some(config.storage.images_dir.join("logo.png")),
        )?),
    };
    Ok(renderer)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    pub(crate) fn sample_document() -> ReceiptDocument {
        let receipt = Receipt {
            id: "id-1".to_string(),
            volunteer_name: "Asha".to_string(),
            donor_name: "Ravi <Kumar>".to_string(),
            donor_pan: "ABCDE1234F".to_string(),
            email: "ravi@example.org".to_string(),
            mobile_no: "9999999999".to_string(),
            address: "12 Park Street".to_string(),
            denominations: serde_json::from_value(json!({"500": 2, "100": 3, "10": 0}))
                .expect("denominations"),
            total: 1300.0,
            receipt_number: "#NMF01/24-25/FSJB7".to_string(),
            date: Utc::now(),
            pdf_path: None,
        };
        ReceiptDocument::from_receipt(&receipt)
    }

    #[test]
    fn document_carries_rows_and_words() {
        let doc = sample_document();
        assert_eq!(doc.rows.len(), 2);
        assert_eq!(doc.rows_total, 1300);
        assert_eq!(doc.total, "1300");
        assert_eq!(doc.total_in_words, "one thousand three hundred");
    }

    #[test]
    fn amounts_format() {
        assert_eq!(format_amount(250.0), "250");
        assert_eq!(format_amount(250.5), "250.50");
        assert_eq!(amount_in_words(-4.0), "zero");
        assert_eq!(amount_in_words(19.99), "nineteen");
    }
}
