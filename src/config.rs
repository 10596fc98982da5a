use std::{borrow::Cow, collections::HashMap, path::Path, sync::Arc};

use serde::Deserialize;
use tokio::{io::AsyncReadExt, sync::RwLock};

pub trait ConfigLoaderObject {
    fn key(&self) -> Cow<'static, str>;

    fn restore(&mut self, value: serde_json::Value) -> eyre::Result<()>;
}

/// Read-only view of the JSON config file, split into sections by key.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<HashMap<Cow<'static, str>, serde_json::Value>>>,
}

impl ConfigLoader {
    pub async fn read(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let mut file = tokio::fs::File::open(path.as_ref()).await?;

        let mut buf = String::new();
        let _size = file.read_to_string(&mut buf).await?;

        Self::parse(&buf)
    }

    pub fn parse(data: &str) -> eyre::Result<Self> {
        let config = serde_json::from_str(data)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Load the config at the given path, falling back to an empty config if
    /// it doesn't exist or can't be parsed.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn read_or_default(path: impl AsRef<Path>) -> Self {
        match Self::read(&path).await {
            Ok(loader) => {
                tracing::info!("loaded config");
                loader
            }
            Err(err) => {
                tracing::info!("using default config: {err}");
                Self::default()
            }
        }
    }

    #[tracing::instrument(skip_all, fields(key = %object.key()))]
    pub async fn restore_object<T>(&self, object: &mut T) -> eyre::Result<()>
    where
        T: ConfigLoaderObject,
    {
        tracing::debug!("loading object data");

        let data = match self.config.read().await.get(&object.key()) {
            Some(data) => data.to_owned(),
            None => {
                tracing::trace!("no data found for object");
                return Ok(());
            }
        };

        object.restore(data)?;

        Ok(())
    }
}

/// Location of the config file in the platform config directory.
pub fn config_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("com", "example", "barcode")
        .map(|dirs| dirs.config_dir().join("config.json"))
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    pub device_index: u32,
}

impl ConfigLoaderObject for ScannerConfig {
    fn key(&self) -> Cow<'static, str> {
        "scanner".into()
    }

    fn restore(&mut self, value: serde_json::Value) -> eyre::Result<()> {
        *self = serde_json::from_value(value)?;

        Ok(())
    }
}
