use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;
use railway_core::StoreError;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Wrap an infrastructure failure. Constraint violations that mean something to
/// callers are mapped before reaching this point.
pub(crate) fn backend(err: sqlx::Error) -> StoreError {
    StoreError::backend(err)
}

/// Integrity violations with a meaning for callers, keyed by SQLSTATE
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Violation {
    Unique,
    /// Names the constraint when the server reports it
    ForeignKey(Option<String>),
}

impl Violation {
    pub(crate) fn of(err: &sqlx::Error) -> Option<Self> {
        let db_err = err.as_database_error()?;
        Self::from_code(db_err.code().as_deref(), db_err.constraint())
    }

    pub(crate) fn from_code(code: Option<&str>, constraint: Option<&str>) -> Option<Self> {
        match code? {
            "23505" => Some(Violation::Unique),
            "23503" => Some(Violation::ForeignKey(constraint.map(str::to_string))),
            _ => None,
        }
    }
}

/// A foreign key constraint and the row it points at.
pub(crate) type Reference<'a> = (&'a str, &'static str, Uuid);

/// The referenced row a foreign-key violation reports as gone.
///
/// Falls back to the first reference when the server does not name the constraint.
pub(crate) fn missing_reference(violation: &Violation, references: &[Reference<'_>]) -> Option<StoreError> {
    let Violation::ForeignKey(constraint) = violation else {
        return None;
    };
    let &(_, entity, id) = references
        .iter()
        .find(|(name, _, _)| constraint.as_deref() == Some(*name))
        .or_else(|| references.first())?;
    Some(StoreError::NotFound { entity, id })
}

/// A write that raced with the delete of a row it references reports that row
/// as missing, the same way the in-memory store does.
pub(crate) fn reference_error(err: sqlx::Error, references: &[Reference<'_>]) -> StoreError {
    match Violation::of(&err).and_then(|violation| missing_reference(&violation, references)) {
        Some(missing) => missing,
        None => backend(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlstate_classification() {
        assert_eq!(Violation::from_code(Some("23505"), Some("tickets_journey_cargo_seat_key")), Some(Violation::Unique));
        assert_eq!(
            Violation::from_code(Some("23503"), Some("trains_train_type_id_fkey")),
            Some(Violation::ForeignKey(Some("trains_train_type_id_fkey".to_string())))
        );
        // Check constraints are not mapped
        assert_eq!(Violation::from_code(Some("23514"), Some("tickets_cargo_check")), None);
        assert_eq!(Violation::from_code(None, None), None);
    }

    #[test]
    fn test_foreign_key_names_the_referenced_row() {
        let source = Uuid::new_v4();
        let destination = Uuid::new_v4();
        let references = [
            ("routes_source_id_fkey", "station", source),
            ("routes_destination_id_fkey", "station", destination),
        ];

        let violation = Violation::ForeignKey(Some("routes_destination_id_fkey".to_string()));
        let err = missing_reference(&violation, &references).unwrap();
        assert!(matches!(err, StoreError::NotFound { entity: "station", id } if id == destination));

        let unnamed = Violation::ForeignKey(None);
        let err = missing_reference(&unnamed, &references).unwrap();
        assert!(matches!(err, StoreError::NotFound { id, .. } if id == source));

        assert!(missing_reference(&Violation::Unique, &references).is_none());
    }

    #[test]
    fn test_other_failures_stay_backend_errors() {
        let err = reference_error(sqlx::Error::RowNotFound, &[("trains_train_type_id_fkey", "train type", Uuid::new_v4())]);
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
