// File-backed dashboard snapshots: <root>/<session>/<version>.json plus latest.json
use crate::application::dashboard_store::DashboardStore;
use crate::domain::dashboard::DashboardState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const LATEST: &str = "latest.json";

#[derive(Debug, Clone)]
pub struct FileDashboardStore {
    root: PathBuf,
}

impl FileDashboardStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(urlencoding::encode(session_id).as_ref())
    }
}

/// Write-then-rename so a crash never leaves a torn latest.json behind
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move snapshot into {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl DashboardStore for FileDashboardStore {
    async fn save_dashboard_version(
        &self,
        session_id: &str,
        version_tag: &str,
        state: &DashboardState,
    ) -> Result<()> {
        let dir = self.session_dir(session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let bytes = serde_json::to_vec_pretty(state).context("Failed to serialize dashboard")?;
        let version_file = dir.join(format!("{}.json", urlencoding::encode(version_tag)));
        write_atomic(&version_file, &bytes).await?;
        write_atomic(&dir.join(LATEST), &bytes).await?;

        tracing::debug!("Saved dashboard {} version {}", session_id, version_tag);
        Ok(())
    }

    async fn load_latest_dashboard(&self, session_id: &str) -> Result<Option<DashboardState>> {
        let path = self.session_dir(session_id).join(LATEST);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let state = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt dashboard snapshot {}", path.display()))?;
        Ok(Some(state))
    }
}
