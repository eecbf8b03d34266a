use async_trait::async_trait;
use handlebars::Handlebars;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use super::{ReceiptDocument, ReceiptRenderer, RenderError};

const DEFAULT_TEMPLATE: &str = include_str!("../../templates/receipt.html");
const TEMPLATE_NAME: &str = "receipt";

/// Fills the receipt HTML template and prints it with a headless browser.
pub struct HtmlRenderer {
    templates: Handlebars<'static>,
    browser: String,
    timeout: Duration,
    logo: Option<PathBuf>,
}

#[derive(Serialize)]
struct TemplateData<'a> {
    #[serde(flatten)]
    document: &'a ReceiptDocument,
    logo_url: Option<String>,
}

impl HtmlRenderer {
    pub fn new(
        template_path: Option<&Path>,
        browser: &str,
        timeout: Duration,
        logo: Option<PathBuf>,
    ) -> Result<Self, RenderError> {
        let source = match template_path {
            Some(path) => std::fs::read_to_string(path)?,
            None => DEFAULT_TEMPLATE.to_string(),
        };

        // Handlebars escapes `{{field}}` output, so form input cannot inject markup.
        let mut templates = Handlebars::new();
        templates.register_template_string(TEMPLATE_NAME, source)?;

        Ok(Self {
            templates,
            browser: browser.to_string(),
            timeout,
            logo,
        })
    }

    pub fn render_html(&self, document: &ReceiptDocument) -> Result<String, RenderError> {
        let logo_url = self
            .logo
            .as_ref()
            .filter(|path| path.is_file())
            .and_then(|path| std::path::absolute(path).ok())
            .map(|path| format!("file://{}", path.display()));

        let data = TemplateData { document, logo_url };
        Ok(self.templates.render(TEMPLATE_NAME, &data)?)
    }
}

#[async_trait]
impl ReceiptRenderer for HtmlRenderer {
    async fn render(&self, document: &ReceiptDocument, output: &Path) -> Result<(), RenderError> {
        let html = self.render_html(document)?;

        let mut page = tempfile::Builder::new()
            .prefix("receipt-")
            .suffix(".html")
            .tempfile()?;
        page.write_all(html.as_bytes())?;
        page.flush()?;

        let output = std::path::absolute(output)?;
        tracing::debug!("Printing {} to {}", page.path().display(), output.display());

        let run = Command::new(&self.browser)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(format!("file://{}", page.path().display()))
            .kill_on_drop(true)
            .output();

        let result = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(RenderError::Browser(format!(
                "{} exited with {}: {}",
                self.browser,
                result.status,
                stderr.trim()
            )));
        }

        if !tokio::fs::try_exists(&output).await? {
            return Err(RenderError::Browser(format!(
                "{} did not write {}",
                self.browser,
                output.display()
            )));
        }

        Ok(())
    }
}
