use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use tally_email::DEFAULT_GEMINI_MODEL;
use tally_ingest::PipelineSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    /// Bunyan-style JSON lines.
    Json,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// Expected `Authorization: Apikey <key>` value for the payment webhook.
    pub sepay_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// TOML file with pipeline settings; defaults apply when unset.
    pub settings_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let bind_addr = bind_addr
            .parse()
            .with_context(|| format!("BIND_ADDR is not a socket address: {bind_addr}"))?;

        let log_format = match var("LOG_FORMAT").as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(ServerConfig {
            database_path: var("DATABASE_PATH")
                .unwrap_or_else(|| "tally.db".to_string())
                .into(),
            bind_addr,
            sepay_api_key: var("SEPAY_API_KEY"),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            settings_path: var("TALLY_SETTINGS").map(PathBuf::from),
            log_format,
        })
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        match &self.settings_path {
            Some(path) => PipelineSettings::load(path)
                .with_context(|| format!("loading pipeline settings from {}", path.display())),
            None => Ok(PipelineSettings::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.database_path, PathBuf::from("tally.db"));
        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.sepay_api_key, None);
        assert_eq!(c.gemini_model, "gemini-2.0-flash");
        assert_eq!(c.log_format, LogFormat::Pretty);
        assert_eq!(c.pipeline_settings().unwrap(), PipelineSettings::default());
    }

    #[test]
    fn reads_overrides() {
        let c = config(&[
            ("DATABASE_PATH", "/var/lib/tally/tally.db"),
            ("BIND_ADDR", "127.0.0.1:3000"),
            ("SEPAY_API_KEY", "sk_live"),
            ("GEMINI_API_KEY", ""),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(c.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.sepay_api_key.as_deref(), Some("sk_live"));
        assert_eq!(c.gemini_api_key, None);
        assert_eq!(c.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_bind_addr_is_an_error() {
        assert!(config(&[("BIND_ADDR", "localhost")]).is_err());
    }

    #[test]
    fn missing_settings_file_is_an_error() {
        let c = config(&[("TALLY_SETTINGS", "/nonexistent/tally.toml")]).unwrap();
        assert!(c.pipeline_settings().is_err());
    }
}
