pub mod mock_db;
pub mod organization_repository;
pub mod postgres_organization_repository;
pub mod postgres_project_repository;
pub mod postgres_user_repository;
pub mod project_repository;
pub mod user_repository;

/// True when the error is a Postgres unique-constraint violation. Slug
/// generation and membership upserts rely on this rather than pre-checks.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Name of the violated constraint, when the driver reports one. Lets the
/// signup path tell a slug collision apart from a duplicate organization name.
pub fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    err.as_database_error().and_then(|db| db.constraint())
}
