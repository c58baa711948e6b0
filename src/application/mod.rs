// Application layer - Tool API, data fetching and session lifecycle
pub mod dashboard_store;
pub mod dashboard_tools;
pub mod data_fetcher;
pub mod errors;
pub mod row_query;
pub mod session_registry;
pub mod source_client;
pub mod template;
pub mod template_builders;
pub mod tool_catalog;
pub mod tool_params;
pub mod tool_result;
