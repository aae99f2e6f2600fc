use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, bail};
use db::{
    DocumentStore,
    store::{JsonFileStore, MemoryStore, SqliteStore},
};
use services::services::repository::RepositoryConfig;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Default)]
#[strum(serialize_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Sqlite,
    Memory,
}

impl StoreKind {
    fn default_path(self) -> &'static str {
        match self {
            Self::File | Self::Memory => "data/bizdesk.json",
            Self::Sqlite => "data/bizdesk.sqlite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store: StoreKind,
    pub data_path: PathBuf,
    pub create_if_missing: bool,
    pub io_timeout: Duration,
    pub queue_depth: usize,
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store = match lookup("BIZDESK_STORE") {
            Some(kind) => kind
                .parse::<StoreKind>()
                .with_context(|| format!("BIZDESK_STORE must be file, sqlite or memory, got {kind:?}"))?,
            None => StoreKind::default(),
        };
        let data_path = lookup("BIZDESK_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(store.default_path()));
        let create_if_missing = match lookup("BIZDESK_CREATE_IF_MISSING").as_deref() {
            None | Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => bail!("BIZDESK_CREATE_IF_MISSING must be true or false, got {other:?}"),
        };
        let io_timeout = Duration::from_millis(parse_or(&lookup, "BIZDESK_IO_TIMEOUT_MS", 5000)?);
        let queue_depth = parse_or(&lookup, "BIZDESK_QUEUE_DEPTH", 256)?;
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "PORT", 3001)?;

        Ok(Self {
            store,
            data_path,
            create_if_missing,
            io_timeout,
            queue_depth,
            host,
            port,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn repository(&self) -> RepositoryConfig {
        RepositoryConfig {
            io_timeout: self.io_timeout,
            queue_depth: self.queue_depth,
        }
    }

    pub async fn build_store(&self) -> anyhow::Result<Arc<dyn DocumentStore>> {
        let store: Arc<dyn DocumentStore> = match self.store {
            StoreKind::File => Arc::new(
                JsonFileStore::new(&self.data_path).create_if_missing(self.create_if_missing),
            ),
            StoreKind::Sqlite => {
                if self.create_if_missing
                    && let Some(dir) = self.data_path.parent()
                    && !dir.as_os_str().is_empty()
                {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .with_context(|| format!("creating {}", dir.display()))?;
                }
                let url = format!("sqlite://{}", self.data_path.display());
                Arc::new(
                    SqliteStore::connect(&url, self.create_if_missing)
                        .await
                        .with_context(|| format!("opening {url}"))?,
                )
            }
            StoreKind::Memory => Arc::new(MemoryStore::empty()),
        };
        Ok(store)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{key} has an invalid value {value:?}")),
        None => Ok(default),
    }
}
