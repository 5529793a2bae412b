use anyhow::{Context, Result};
use clap_serde_derive::ClapSerde;

#[derive(ClapSerde, Debug)]
pub struct Config {
    /// The address the listener binds to
    #[default("0.0.0.0".to_string())]
    #[arg(short, long, env)]
    pub(crate) address: String,

    /// The port the listener binds to
    #[default(8000)]
    #[arg(short, long, env)]
    pub(crate) port: u16,

    /// Path to the serialized dosage model, relative to the working directory
    #[default("dosage_model.json".to_string())]
    #[arg(short, long, env)]
    pub(crate) model_path: String,

    /// OTLP collector endpoint, traces and metrics are only exported when set
    #[default(None)]
    #[arg(long, env)]
    pub(crate) otlp_endpoint: Option<String>,

    /// Keep logging to the console while exporting to an OTLP collector
    #[default(false)]
    #[arg(long, env)]
    pub(crate) console: bool,

    /// PEM certificate chain, enables TLS together with the key
    #[default(None)]
    #[arg(long, env)]
    pub(crate) tls_cert_path: Option<String>,

    /// PEM private key, enables TLS together with the certificate
    #[default(None)]
    #[arg(long, env)]
    pub(crate) tls_key_path: Option<String>,

    /// Maximum accepted request body size in bytes
    #[default(64 * 1024)]
    #[arg(long, env)]
    pub(crate) body_limit: usize,
}

impl Config {
    pub fn from_toml(path: &str) -> Result<Self> {
        let str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path))?;
        let opt: <Config as ClapSerde>::Opt = toml::from_str(&str)
            .with_context(|| format!("Failed to parse configuration file {}", path))?;
        Ok(Config::from(opt))
    }

    /// Like [`Config::from_toml`], but a missing file yields the defaults when
    /// `default_if_missing` is set. Unreadable or malformed files are always errors.
    pub fn from_toml_or_default(path: &str, default_if_missing: bool) -> Result<Self> {
        match Config::from_toml(path) {
            Ok(config) => Ok(config),
            Err(err) if default_if_missing && is_not_found(&err) => Ok(Config::default()),
            Err(err) => Err(err),
        }
    }

    /// Both TLS paths, when TLS is fully configured.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
}
