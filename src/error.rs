//! Error types for catalog loading, graph resolution, and planning.
//!
//! Every error here is terminal for the request that raised it: the caller
//! fixes the catalog or the request and retries. Nothing inside the crate
//! retries or degrades to a partial plan.

use std::path::PathBuf;

/// Errors detected while loading or validating a catalog.
///
/// Malformed entries are rejected at load time so the resolver and the
/// optimizer can assume every cross-reference is valid.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A recipe references an item that is not in the catalog.
    #[error("recipe '{recipe}' references unknown item '{item}'")]
    UnknownItem { recipe: String, item: String },

    /// A recipe runs in a building that is not in the catalog.
    #[error("recipe '{recipe}' references unknown building '{building}'")]
    UnknownBuilding { recipe: String, building: String },

    /// A recipe has no outputs.
    #[error("recipe '{recipe}' has no outputs")]
    NoOutputs { recipe: String },

    /// A recipe has a zero or negative cycle duration.
    #[error("recipe '{recipe}' has a non-positive duration")]
    NonPositiveDuration { recipe: String },

    /// An input or output rate is zero or negative.
    #[error("recipe '{recipe}' has a non-positive amount for item '{item}'")]
    NonPositiveAmount { recipe: String, item: String },

    /// A building has a negative base power draw.
    #[error("building '{building}' has a negative base power")]
    NegativeBasePower { building: String },

    /// A catalog file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A catalog file could not be parsed.
    #[error("parse error in {file}: {source}")]
    Json {
        file: PathBuf,
        source: serde_json::Error,
    },
}

/// Errors raised while resolving the production graph for a target item.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The target item has no enabled producing recipe and is not an
    /// extractable resource.
    #[error("item '{item}' has no enabled producing recipe and is not extractable")]
    UnreachableItem { item: String },
}

/// Errors raised by the allocation optimizer.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The request itself is malformed (non-positive rate, unknown target).
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// No assignment of buildings, clocks, and modules can reach the
    /// requested rate within the given constraints.
    #[error("infeasible: {reason}")]
    InfeasibleBudget { reason: String },

    /// The production graph handed to the optimizer is not valid.
    #[error("resolution failed: {0}")]
    ResolutionFailed(#[from] ResolveError),
}
