// Session registry - one tool service per session, rehydrated on first use and autosaved
use crate::application::dashboard_store::DashboardStore;
use crate::application::dashboard_tools::DashboardTools;
use crate::application::data_fetcher::{DataFetcher, FetcherSettings};
use crate::application::row_query::RowQuery;
use crate::application::source_client::SourceClient;
use crate::domain::dashboard::DashboardState;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};

pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<DashboardTools>>>,
    store: Arc<dyn DashboardStore>,
    client: Arc<dyn SourceClient>,
    row_query: Arc<dyn RowQuery>,
    settings: FetcherSettings,
    autosave_debounce: Duration,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn DashboardStore>,
        client: Arc<dyn SourceClient>,
        row_query: Arc<dyn RowQuery>,
        settings: FetcherSettings,
        autosave_debounce: Duration,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            store,
            client,
            row_query,
            settings,
            autosave_debounce,
        }
    }

    /// Tool service for `session_id`, created from the latest snapshot on first access.
    /// Sessions stay registered for the life of the registry.
    pub async fn session(&self, session_id: &str) -> Arc<DashboardTools> {
        if let Some(tools) = self.sessions.lock().await.get(session_id) {
            return tools.clone();
        }

        // loaded without the registry lock so other sessions are not held up by store I/O
        let state = self.rehydrate(session_id).await;

        let mut sessions = self.sessions.lock().await;
        if let Some(tools) = sessions.get(session_id) {
            return tools.clone();
        }
        let fetcher = DataFetcher::new(
            self.client.clone(),
            self.row_query.clone(),
            self.settings.clone(),
        );
        let tools = Arc::new(DashboardTools::new(state, fetcher));

        tokio::spawn(autosave(
            session_id.to_string(),
            Arc::downgrade(&tools),
            tools.subscribe(),
            self.store.clone(),
            self.autosave_debounce,
        ));

        sessions.insert(session_id.to_string(), tools.clone());
        tools
    }

    async fn rehydrate(&self, session_id: &str) -> DashboardState {
        match self.store.load_latest_dashboard(session_id).await {
            Ok(Some(state)) => {
                tracing::info!(
                    "Resumed session {} with {} components",
                    session_id,
                    state.components.len()
                );
                state
            }
            Ok(None) => {
                tracing::info!("Starting new session {}", session_id);
                DashboardState::default()
            }
            Err(e) => {
                tracing::warn!(
                    "Could not load dashboard for session {}, starting empty: {:#}",
                    session_id,
                    e
                );
                DashboardState::default()
            }
        }
    }
}

/// Saves a snapshot once mutations have been quiet for `debounce`.
/// Ends when the registry, and with it the session, is dropped.
async fn autosave(
    session_id: String,
    tools: Weak<DashboardTools>,
    mut revisions: watch::Receiver<u64>,
    store: Arc<dyn DashboardStore>,
    debounce: Duration,
) {
    while revisions.changed().await.is_ok() {
        loop {
            match tokio::time::timeout(debounce, revisions.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return,
                Err(_) => break,
            }
        }

        let Some(service) = tools.upgrade() else {
            return;
        };
        let revision = *revisions.borrow_and_update();
        let snapshot = service.snapshot().await;
        drop(service);

        let tag = format!("{}-r{}", Utc::now().format("%Y%m%dT%H%M%S%3fZ"), revision);
        match store.save_dashboard_version(&session_id, &tag, &snapshot).await {
            Ok(()) => tracing::debug!("Autosaved session {} as {}", session_id, tag),
            Err(e) => tracing::error!("Autosave failed for session {}: {:#}", session_id, e),
        }
    }
}
