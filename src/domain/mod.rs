pub mod distributions;
pub mod investments;
pub mod labels;
pub mod models;
pub mod portfolios;
pub mod snapshots;

use thiserror::Error;

use crate::db::StoreError;

/// Domain constraint violations, kept separate from plumbing errors so the
/// API layer can surface specific messages.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Absent or owned by someone else; the two are indistinguishable
    #[error("Record not found")]
    NotFound,

    #[error("Portfolio still holds {investment_count} investment(s)")]
    PortfolioNotEmpty { investment_count: i64 },

    #[error("Cross-tenant association rejected")]
    CrossTenantAssociation,

    #[error("{0} must be non-negative")]
    NegativeAmount(&'static str),

    #[error("Duplicate {0} name")]
    DuplicateName(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}
