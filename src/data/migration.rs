use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::{params, Connection};

use crate::validation::rules::all_rules;

const SEED_VALIDATION_RULES: &str = "seed_validation_rules";

/// Database migration manager that handles schema updates
pub struct MigrationManager<'a> {
    connection: &'a Connection,
}

impl<'a> MigrationManager<'a> {
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    /// Run all necessary migrations to update the database schema
    pub fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        self.create_migrations_table()?;

        self.seed_validation_rules()?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Creates the migrations table to track which migrations have been applied
    fn create_migrations_table(&self) -> Result<()> {
        debug!("Creating migrations table if it doesn't exist");

        self.connection
            .execute(
                "CREATE TABLE IF NOT EXISTS migrations (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    applied_at TEXT NOT NULL
                )",
                [],
            )
            .context("Failed to create migrations table")?;

        Ok(())
    }

    fn is_migration_applied(&self, name: &str) -> Result<bool> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM migrations WHERE name = ?", [name], |row| row.get(0))
            .context("Failed to check if migration has been applied")?;

        Ok(count > 0)
    }

    fn record_migration(&self, name: &str) -> Result<()> {
        debug!("Recording migration '{}' as applied", name);

        self.connection
            .execute("INSERT INTO migrations (name, applied_at) VALUES (?, datetime('now'))", [name])
            .context("Failed to record migration")?;

        Ok(())
    }

    /// Upserts the rule catalog so titles and descriptions follow the running binary
    fn seed_validation_rules(&self) -> Result<()> {
        let first_run = !self.is_migration_applied(SEED_VALIDATION_RULES)?;
        if first_run {
            info!("Running migration: {}", SEED_VALIDATION_RULES);
        }

        let mut stmt = self.connection.prepare(
            "INSERT INTO validation_rules (error_id, severity, title, error_description, occurrence_suffix)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(error_id) DO UPDATE SET
                severity = excluded.severity,
                title = excluded.title,
                error_description = excluded.error_description,
                occurrence_suffix = excluded.occurrence_suffix",
        )?;

        let rules = all_rules();
        for rule in rules {
            stmt.execute(params![
                rule.error_id,
                rule.severity.to_string(),
                rule.title,
                rule.error_description,
                rule.occurrence_suffix,
            ])
            .with_context(|| format!("Failed to seed validation rule {}", rule.error_id))?;
        }
        debug!("Seeded {} validation rules", rules.len());

        if first_run {
            self.record_migration(SEED_VALIDATION_RULES)?;
        }
        Ok(())
    }
}
