// Persistence collaborator for dashboard snapshots
use crate::domain::dashboard::DashboardState;
use async_trait::async_trait;

#[async_trait]
pub trait DashboardStore: Send + Sync {
    async fn save_dashboard_version(
        &self,
        session_id: &str,
        version_tag: &str,
        state: &DashboardState,
    ) -> anyhow::Result<()>;

    /// `None` when nothing has been saved for the session yet
    async fn load_latest_dashboard(&self, session_id: &str) -> anyhow::Result<Option<DashboardState>>;
}
