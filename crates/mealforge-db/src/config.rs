use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgConnectOptions;

/// Connection settings for the job queue database.
///
/// The URL comes from the resolved application config; this type adds the
/// pool sizing a process needs on top of it.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/mealforge";

    /// Enough for a one-shot command (a query plus a migration lock).
    pub const CLI_CONNECTIONS: u32 = 2;

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: Self::CLI_CONNECTIONS,
            acquire_timeout: Duration::from_secs(10),
        }
    }

    /// One connection per job loop, plus the status server and event log.
    pub fn for_workers(mut self, concurrency: usize) -> Self {
        let loops = u32::try_from(concurrency).unwrap_or(u32::MAX);
        self.max_connections = loops.saturating_add(Self::CLI_CONNECTIONS);
        self
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        PgConnectOptions::from_str(&self.database_url)
            .with_context(|| format!("invalid database URL {}", self.redacted_url()))
    }

    /// Name of the queue database; required for `db-init`.
    pub fn database_name(&self) -> Result<String> {
        self.connect_options()?
            .get_database()
            .map(str::to_owned)
            .with_context(|| format!("no database name in {}", self.redacted_url()))
    }

    /// Same server, `postgres` database: where `CREATE DATABASE` is issued.
    pub fn maintenance_options(&self) -> Result<PgConnectOptions> {
        Ok(self.connect_options()?.database("postgres"))
    }

    /// The URL with its password masked, for logs and error messages.
    pub fn redacted_url(&self) -> String {
        let url = &self.database_url;
        let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
            return url.clone();
        };
        let authority_end = url[scheme_end..]
            .find('/')
            .map_or(url.len(), |i| scheme_end + i);
        let Some(at) = url[scheme_end..authority_end].rfind('@').map(|i| scheme_end + i) else {
            return url.clone();
        };
        match url[scheme_end..at].find(':') {
            Some(colon) => format!("{}:***{}", &url[..scheme_end + colon], &url[at..]),
            None => url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_sized_for_one_shot_commands() {
        let cfg = DbConfig::new(DbConfig::DEFAULT_URL);
        assert_eq!(cfg.max_connections, DbConfig::CLI_CONNECTIONS);
        assert_eq!(cfg.database_name().unwrap(), "mealforge");
    }

    #[test]
    fn worker_pool_gets_a_connection_per_loop() {
        let cfg = DbConfig::new(DbConfig::DEFAULT_URL).for_workers(4);
        assert_eq!(cfg.max_connections, 6);
        assert_eq!(
            DbConfig::new(DbConfig::DEFAULT_URL).for_workers(usize::MAX).max_connections,
            u32::MAX
        );
    }

    #[test]
    fn database_name_ignores_query_string() {
        let cfg = DbConfig::new("postgresql://db:5432/plans?sslmode=require");
        assert_eq!(cfg.database_name().unwrap(), "plans");
    }

    #[test]
    fn maintenance_options_target_postgres() {
        let cfg = DbConfig::new("postgresql://queue@localhost:5433/mealforge");
        let opts = cfg.maintenance_options().unwrap();
        assert_eq!(opts.get_database(), Some("postgres"));
        assert_eq!(opts.get_port(), 5433);
        assert_eq!(opts.get_username(), "queue");
    }

    #[test]
    fn redacts_only_the_password() {
        let cfg = DbConfig::new("postgresql://queue:s3cret@db:5432/mealforge");
        assert_eq!(cfg.redacted_url(), "postgresql://queue:***@db:5432/mealforge");

        let cfg = DbConfig::new("postgresql://queue@db:5432/mealforge");
        assert_eq!(cfg.redacted_url(), "postgresql://queue@db:5432/mealforge");
    }

    #[test]
    fn invalid_url_error_hides_the_password() {
        let cfg = DbConfig::new("postgresql://queue:s3cret@db:notaport/mealforge");
        let err = cfg.connect_options().unwrap_err();
        assert!(!format!("{err:#}").contains("s3cret"), "got: {err:#}");
    }
}
