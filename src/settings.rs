use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub store: Store,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    /// Path to persist the document store. Default: data/store.json
    pub data_path: PathBuf,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/store.json"),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)
            .into_diagnostic()?
            .set_default("server.port", Server::default().port)
            .into_diagnostic()?
            .set_default(
                "store.data_path",
                Store::default().data_path.to_string_lossy().to_string(),
            )
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: TYPEGATE__SERVER__PORT=9090, etc.
        builder = builder.add_source(config::Environment::with_prefix("TYPEGATE").separator("__"));

        let settings = builder
            .build()
            .into_diagnostic()?
            .try_deserialize::<Settings>()
            .into_diagnostic()?;
        Ok(settings)
    }
}
