// Application state for HTTP handlers
use crate::application::session_registry::SessionRegistry;

pub struct AppState {
    pub sessions: SessionRegistry,
}
