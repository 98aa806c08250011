mod init;
mod postgres_repository;

#[cfg(test)]
mod tests;

pub use init::init_database_with_retry;
pub use postgres_repository::{create_postgres_repository, PostgresRepository};
