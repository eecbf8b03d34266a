use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub numbering: NumberingConfig,
    pub renderer: RendererConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base used to build the `pdfUrl` returned to clients.
    pub public_base_url: String,
    /// Comma separated list of origins allowed by CORS.
    pub allowed_origins: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub receipts_dir: PathBuf,
    pub images_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NumberingConfig {
    pub prefix: String,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    Draw,
    Html,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    pub kind: RendererKind,
    pub template_path: Option<PathBuf>,
    pub browser: String,
    pub timeout_secs: u64,
    pub organization: String,
}

impl Config {
    /// Defaults layered under `RECEIPTS__*` environment variables,
    /// e.g. `RECEIPTS__SERVER__PORT=8080`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = Self::defaults()?
            .add_source(config::Environment::with_prefix("RECEIPTS").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// Built-in defaults only, ignoring the environment.
    pub fn with_defaults() -> Result<Self, config::ConfigError> {
        Self::defaults()?.build()?.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5001)?
            .set_default("server.public_base_url", "http://localhost:5001")?
            .set_default(
                "server.allowed_origins",
                "http://localhost:3000,http://localhost:3001",
            )?
            .set_default("storage.receipts_dir", "receipts")?
            .set_default("storage.images_dir", "public/images")?
            .set_default("database.path", "receipts.db")?
            .set_default("database.max_connections", 10)?
            .set_default("numbering.prefix", "#NMF01/24-25/FSJB")?
            .set_default("numbering.seed", 1)?
            .set_default("renderer.kind", "draw")?
            .set_default("renderer.browser", "chromium")?
            .set_default("renderer.timeout_secs", 60)?
            .set_default("renderer.organization", "Donation Receipt")
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.server
            .allowed_origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Public URL of a rendered file served from the receipts directory.
    pub fn pdf_url(&self, file_name: &str) -> String {
        format!(
            "{}/receipts/{}",
            self.server.public_base_url.trim_end_matches('/'),
            file_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> Config {
        Config::with_defaults().expect("defaults")
    }

    #[test]
    fn defaults_deserialize() {
        let config = default_config();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.numbering.prefix, "#NMF01/24-25/FSJB");
        assert_eq!(config.numbering.seed, 1);
        assert_eq!(config.renderer.kind, RendererKind::Draw);
        assert!(config.renderer.template_path.is_none());
    }

    #[test]
    fn pdf_url_joins_base_and_file() {
        let mut config = default_config();
        config.server.public_base_url = "http://example.org:5001/".to_string();
        assert_eq!(
            config.pdf_url("-NMF01-24-25-FSJB7.pdf"),
            "http://example.org:5001/receipts/-NMF01-24-25-FSJB7.pdf"
        );
    }

    #[test]
    fn allowed_origins_skips_blanks() {
        let mut config = default_config();
        config.server.allowed_origins = " http://a.test , ,http://b.test".to_string();
        assert_eq!(config.allowed_origins(), vec!["http://a.test", "http://b.test"]);
    }
}
