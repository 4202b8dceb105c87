//! Database error types and sqlx error mapping.

use std::fmt;

/// Classified database failure.
#[derive(Debug, Clone)]
pub struct DatabaseError {
    kind: DatabaseErrorKind,
}

#[derive(Debug, Clone)]
pub enum DatabaseErrorKind {
    /// Row expected but absent.
    NotFound { entity: String, id: String },
    /// Unique constraint violated (SQLSTATE 23505). The remote store is the
    /// final arbiter of transaction-id uniqueness; this is how a lost race
    /// surfaces.
    UniqueViolation { constraint: String },
    /// Relation does not exist (SQLSTATE 42P01). Some deployments run
    /// without optional tables such as payment_audit_logs.
    UndefinedTable { message: String },
    /// Connection/pool-level failure.
    Connection { message: String },
    Unknown { message: String },
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.into(),
            id: id.into(),
        })
    }

    pub fn kind(&self) -> &DatabaseErrorKind {
        &self.kind
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::UniqueViolation { .. })
    }

    pub fn is_undefined_table(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::UndefinedTable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }

    /// Map a raw sqlx error onto the taxonomy above.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::new(DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            }),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => Self::new(DatabaseErrorKind::UniqueViolation {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                }),
                Some("42P01") => Self::new(DatabaseErrorKind::UndefinedTable {
                    message: db.message().to_string(),
                }),
                _ => Self::new(DatabaseErrorKind::Unknown {
                    message: db.message().to_string(),
                }),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::new(DatabaseErrorKind::Connection {
                    message: err.to_string(),
                })
            }
            _ => Self::new(DatabaseErrorKind::Unknown {
                message: err.to_string(),
            }),
        }
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DatabaseErrorKind::NotFound { entity, id } => {
                write!(f, "{} not found: {}", entity, id)
            }
            DatabaseErrorKind::UniqueViolation { constraint } => {
                write!(f, "unique constraint violated: {}", constraint)
            }
            DatabaseErrorKind::UndefinedTable { message } => {
                write!(f, "relation does not exist: {}", message)
            }
            DatabaseErrorKind::Connection { message } => {
                write!(f, "database connection error: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => write!(f, "database error: {}", message),
        }
    }
}

impl std::error::Error for DatabaseError {}
