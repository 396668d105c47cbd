use super::profiles::RemoteSettings;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::path::PathBuf;

/// Load/save of per-remote settings by remote name
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn load(&self, remote: &str) -> AppResult<Option<RemoteSettings>>;

    /// Replace the stored settings of `remote` as a whole
    async fn save(&self, remote: &str, settings: &RemoteSettings) -> AppResult<()>;
}

/// One `<name>.json` file per remote
pub struct JsonFileRepository {
    dir: PathBuf,
}

/// File-name safe form of a remote name; percent-encoding keeps distinct
/// names on distinct files
fn file_stem(remote: &str) -> String {
    urlencoding::encode(remote).into_owned()
}

impl JsonFileRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, remote: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(remote)))
    }
}

#[async_trait]
impl SettingsRepository for JsonFileRepository {
    async fn load(&self, remote: &str) -> AppResult<Option<RemoteSettings>> {
        let path = self.path_for(remote);
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let settings = serde_json::from_str(&content)
            .map_err(|e| AppError::Persistence(format!("{}: {}", path.display(), e)))?;
        Ok(Some(settings))
    }

    async fn save(&self, remote: &str, settings: &RemoteSettings) -> AppResult<()> {
        let content = serde_json::to_string_pretty(settings)?;
        let path = self.path_for(remote);
        let temp_path = path.with_extension("json.tmp");

        let write = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            // Write atomically using temp file
            tokio::fs::write(&temp_path, content.as_bytes()).await?;
            tokio::fs::rename(&temp_path, &path).await
        };
        write.await.map_err(|e| {
            AppError::Persistence(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!("Saved settings for '{}' to {}", remote, path.display());
        Ok(())
    }
}
