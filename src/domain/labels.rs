//! User-scoped labels: categories, tags and investment type suggestions
//! share one row shape and one set of operations. Categories and tags
//! additionally attach to investments through junction tables whose rows
//! must never cross a tenant boundary.

use crate::db::{ScopedStore, StoreError};
use crate::domain::models::{Label, NewLabel};
use crate::domain::DomainError;

/// Which label table an operation targets. Table names are fixed here so
/// no caller-supplied string ever reaches SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Category,
    Tag,
    InvestmentType,
}

impl LabelKind {
    fn table(&self) -> &'static str {
        match self {
            LabelKind::Category => "categories",
            LabelKind::Tag => "tags",
            LabelKind::InvestmentType => "investment_types",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            LabelKind::Category => "category",
            LabelKind::Tag => "tag",
            LabelKind::InvestmentType => "investment type",
        }
    }
}

/// The subset of label kinds that attach to investments. Investment types
/// are suggestions only, so the association operations take this narrowed
/// type and the unattachable case cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachKind {
    Category,
    Tag,
}

impl AttachKind {
    pub fn label(&self) -> LabelKind {
        match self {
            AttachKind::Category => LabelKind::Category,
            AttachKind::Tag => LabelKind::Tag,
        }
    }

    /// Junction table and label column
    fn junction(&self) -> (&'static str, &'static str) {
        match self {
            AttachKind::Category => ("investment_categories", "category_id"),
            AttachKind::Tag => ("investment_tags", "tag_id"),
        }
    }
}

const LABEL_COLUMNS: &str = "id, user_id, name, created_at, updated_at";

pub async fn create(
    store: &ScopedStore,
    kind: LabelKind,
    payload: NewLabel,
) -> Result<Label, DomainError> {
    let mut conn = store.conn().await?;

    let sql = format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING {}",
        kind.table(),
        LABEL_COLUMNS
    );
    sqlx::query_as::<_, Label>(&sql)
        .bind(store.user_id())
        .bind(&payload.name)
        .fetch_one(&mut *conn)
        .await
        .map_err(StoreError::from)
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => DomainError::DuplicateName(kind.noun()),
            other => other.into(),
        })
}

pub async fn list(store: &ScopedStore, kind: LabelKind) -> Result<Vec<Label>, DomainError> {
    let mut conn = store.conn().await?;

    let sql = format!(
        "SELECT {} FROM {} WHERE user_id = $1 ORDER BY name",
        LABEL_COLUMNS,
        kind.table()
    );
    let labels = sqlx::query_as::<_, Label>(&sql)
        .bind(store.user_id())
        .fetch_all(&mut *conn)
        .await
        .map_err(StoreError::from)?;

    Ok(labels)
}

pub async fn rename(
    store: &ScopedStore,
    kind: LabelKind,
    id: i64,
    payload: NewLabel,
) -> Result<Label, DomainError> {
    let mut conn = store.conn().await?;

    let sql = format!(
        "UPDATE {} SET name = $3 WHERE id = $2 AND user_id = $1 RETURNING {}",
        kind.table(),
        LABEL_COLUMNS
    );
    sqlx::query_as::<_, Label>(&sql)
        .bind(store.user_id())
        .bind(id)
        .bind(&payload.name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(StoreError::from)
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => DomainError::DuplicateName(kind.noun()),
            other => other.into(),
        })?
        .ok_or(DomainError::NotFound)
}

pub async fn delete(store: &ScopedStore, kind: LabelKind, id: i64) -> Result<(), DomainError> {
    let mut conn = store.conn().await?;

    let sql = format!(
        "DELETE FROM {} WHERE id = $2 AND user_id = $1",
        kind.table()
    );
    let result = sqlx::query(&sql)
        .bind(store.user_id())
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from)?;

    if result.rows_affected() == 0 {
        return Err(DomainError::NotFound);
    }
    Ok(())
}

/// Attach a category/tag to an owned investment. Idempotent; a label the
/// bound identity does not own is rejected as a cross-tenant association,
/// regardless of whether it exists at all.
pub async fn associate(
    store: &ScopedStore,
    kind: AttachKind,
    investment_id: i64,
    label_id: i64,
) -> Result<(), DomainError> {
    let (junction_table, label_column) = kind.junction();

    let mut tx = store.begin().await?;

    let investment_owned: Option<i64> = sqlx::query_scalar(
        "SELECT i.id FROM investments i
         JOIN portfolios p ON p.id = i.portfolio_id
         WHERE p.user_id = $1 AND i.id = $2",
    )
    .bind(store.user_id())
    .bind(investment_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(StoreError::from)?;
    if investment_owned.is_none() {
        return Err(DomainError::NotFound);
    }

    let label_owned: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT id FROM {} WHERE id = $2 AND user_id = $1",
        kind.label().table()
    ))
    .bind(store.user_id())
    .bind(label_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(StoreError::from)?;
    if label_owned.is_none() {
        return Err(DomainError::CrossTenantAssociation);
    }

    sqlx::query(&format!(
        "INSERT INTO {} (investment_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        junction_table, label_column
    ))
    .bind(investment_id)
    .bind(label_id)
    .execute(&mut *tx)
    .await
    .map_err(StoreError::from)?;

    tx.commit().await.map_err(StoreError::from)?;
    Ok(())
}

pub async fn dissociate(
    store: &ScopedStore,
    kind: AttachKind,
    investment_id: i64,
    label_id: i64,
) -> Result<(), DomainError> {
    let (junction_table, label_column) = kind.junction();

    let mut conn = store.conn().await?;

    let sql = format!(
        "DELETE FROM {junction} j
         USING investments i, portfolios p
         WHERE j.investment_id = $2 AND j.{label} = $3
           AND i.id = j.investment_id
           AND p.id = i.portfolio_id
           AND p.user_id = $1",
        junction = junction_table,
        label = label_column
    );
    let result = sqlx::query(&sql)
        .bind(store.user_id())
        .bind(investment_id)
        .bind(label_id)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from)?;

    if result.rows_affected() == 0 {
        return Err(DomainError::NotFound);
    }
    Ok(())
}

/// Labels attached to one owned investment
pub async fn list_for_investment(
    store: &ScopedStore,
    kind: AttachKind,
    investment_id: i64,
) -> Result<Vec<Label>, DomainError> {
    let (junction_table, label_column) = kind.junction();

    let mut conn = store.conn().await?;

    let sql = format!(
        "SELECT l.{columns} FROM {table} l
         JOIN {junction} j ON j.{label} = l.id
         JOIN investments i ON i.id = j.investment_id
         JOIN portfolios p ON p.id = i.portfolio_id
         WHERE p.user_id = $1 AND l.user_id = $1 AND j.investment_id = $2
         ORDER BY l.name",
        columns = LABEL_COLUMNS.replace(", ", ", l."),
        table = kind.label().table(),
        junction = junction_table,
        label = label_column
    );
    let labels = sqlx::query_as::<_, Label>(&sql)
        .bind(store.user_id())
        .bind(investment_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(StoreError::from)?;

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_fixed_tables() {
        assert_eq!(LabelKind::Category.table(), "categories");
        assert_eq!(LabelKind::Tag.table(), "tags");
        assert_eq!(LabelKind::InvestmentType.table(), "investment_types");
    }

    #[test]
    fn attachable_kinds_map_to_their_junctions() {
        assert_eq!(
            AttachKind::Category.junction(),
            ("investment_categories", "category_id")
        );
        assert_eq!(AttachKind::Tag.junction(), ("investment_tags", "tag_id"));
        // The association surface only exists for the attachable subset
        assert_eq!(AttachKind::Category.label(), LabelKind::Category);
        assert_eq!(AttachKind::Tag.label(), LabelKind::Tag);
    }

    #[test]
    fn label_column_rewrite_prefixes_every_column() {
        let columns = LABEL_COLUMNS.replace(", ", ", l.");
        assert_eq!(columns, "id, user_id, name, created_at, updated_at".replace(", ", ", l."));
        assert!(columns.starts_with("id"));
        assert!(columns.contains("l.user_id"));
    }
}
