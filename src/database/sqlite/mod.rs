use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{DocumentChunk, NewDocumentChunk};
use crate::database::sqlite::queries::ChunkQueries;
use crate::retrieval::ChunkStore;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

pub const DATABASE_FILE_NAME: &str = "study.db";

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Open (creating if needed) `study.db` inside `base_dir`
    pub async fn initialize_from_base_dir(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).with_context(|| {
            format!("Failed to create base directory: {}", base_dir.display())
        })?;

        Self::new(base_dir.join(DATABASE_FILE_NAME)).await
    }
}

#[async_trait]
impl ChunkStore for Database {
    async fn chunks_of(&self, document_id: i64) -> Result<Vec<DocumentChunk>> {
        ChunkQueries::list_by_document(&self.pool, document_id).await
    }

    async fn save_chunks(
        &self,
        document_id: i64,
        chunks: &[NewDocumentChunk],
    ) -> Result<Vec<DocumentChunk>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for chunk replacement")?;

        let created = ChunkQueries::replace_for_document(&mut tx, document_id, chunks).await?;

        tx.commit()
            .await
            .context("Failed to commit chunk replacement transaction")?;

        debug!(
            "Stored {} chunks for document {}",
            created.len(),
            document_id
        );
        Ok(created)
    }
}
