// Error types for tool calls and data transforms
use thiserror::Error;

/// Post-processing failures. Unlike source failures these abort the fetch.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("template transform failed: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("query transform failed: {0}")]
    Query(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid grid layout: {}", .0.join("; "))]
    InvalidLayout(Vec<String>),

    /// (component id, grid area) pairs the new layout would strand
    #[error("Layout change rejected, it would orphan components: {}", describe_orphans(.0))]
    OrphanedComponents(Vec<(String, String)>),

    #[error("Component '{0}' already exists")]
    DuplicateComponent(String),

    #[error("Grid area '{area}' is not defined in the current layout (available: {})", .available.join(", "))]
    InvalidGridArea { area: String, available: Vec<String> },

    #[error("Grid area '{area}' is already occupied by component '{occupant}'")]
    AreaOccupied { area: String, occupant: String },

    #[error("Component '{0}' not found")]
    ComponentNotFound(String),

    #[error("Invalid update for component '{id}': {reason}")]
    InvalidUpdate { id: String, reason: String },

    #[error("No PostgreSQL schema has been configured")]
    SchemaNotConfigured,

    #[error("Table '{0}' not found in the PostgreSQL schema")]
    TableNotFound(String),

    #[error("Schema '{0}' not found in the PostgreSQL schema")]
    SchemaNameNotFound(String),

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid parameters for {tool}: {reason}")]
    InvalidParams { tool: String, reason: String },

    #[error("Data source of component '{0}' changed while fetching, result discarded")]
    FetchSuperseded(String),

    #[error("Failed to fetch data for component '{id}': {reason}")]
    FetchFailed { id: String, reason: String },
}

fn describe_orphans(orphans: &[(String, String)]) -> String {
    orphans
        .iter()
        .map(|(id, area)| format!("'{}' in area '{}'", id, area))
        .collect::<Vec<_>>()
        .join(", ")
}
