//! Load gallery images from a JSON file into Postgres as one batch.
//!
//! Usage: seed-gallery <images.json>
//!
//! The file holds an array of `gallery.create` payloads. Nothing is written
//! unless every entry is valid and the whole batch inserts.

use bitsa_backend::db::{self, models::NewGalleryImage};
use bitsa_backend::rpc::input::GalleryBatchInput;
use bitsa_backend::rpc::{Input, ProcedureError};
use bitsa_backend::store::{ContentStore, PgContentStore, StoreError};
use std::{path::PathBuf, process::ExitCode};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum SeedError {
    #[error("usage: seed-gallery <images.json>")]
    Usage,

    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid gallery entry: {0}")]
    Invalid(#[from] ProcedureError),

    #[error("could not connect to the database: {0}")]
    Connect(sqlx::Error),

    #[error("migrations failed: {0}")]
    Migrate(sqlx::Error),

    #[error("insert failed: {0}")]
    Store(#[from] StoreError),
}

fn parse_batch(raw: &str, path: &PathBuf) -> Result<Vec<NewGalleryImage>, SeedError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|source| SeedError::Json {
        path: path.clone(),
        source,
    })?;
    let GalleryBatchInput(items) = GalleryBatchInput::parse(value)?;
    Ok(items.into_iter().map(Into::into).collect())
}

async fn seed() -> Result<usize, SeedError> {
    let path: PathBuf = std::env::args_os().nth(1).ok_or(SeedError::Usage)?.into();
    let raw = std::fs::read_to_string(&path).map_err(|source| SeedError::Read {
        path: path.clone(),
        source,
    })?;
    let images = parse_batch(&raw, &path)?;
    tracing::info!(count = images.len(), path = %path.display(), "gallery batch validated");

    let pool = db::init_pool(None).await.map_err(SeedError::Connect)?;
    db::run_migrations(&pool).await.map_err(SeedError::Migrate)?;

    let store = PgContentStore::new(pool);
    let inserted = store.insert_gallery_images(&images).await?;
    Ok(inserted.len())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match seed().await {
        Ok(count) => {
            tracing::info!(count, "gallery images inserted");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "gallery seeding failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("images.json")
    }

    #[test]
    fn test_parse_batch_applies_defaults() {
        let raw = r#"[
            {"title": "Lab", "imageUrl": "/gallery/lab.jpg", "category": "campus"},
            {"title": "Hack", "imageUrl": "/gallery/hack.jpg", "category": "events", "displayOrder": 2}
        ]"#;
        let images = parse_batch(raw, &path()).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].display_order, 0);
        assert!(images[0].published);
        assert_eq!(images[1].display_order, 2);
    }

    #[test]
    fn test_one_bad_entry_rejects_the_file() {
        let raw = r#"[
            {"title": "Lab", "imageUrl": "/gallery/lab.jpg", "category": "campus"},
            {"title": "", "imageUrl": "/gallery/x.jpg", "category": "campus"}
        ]"#;
        assert!(matches!(
            parse_batch(raw, &path()),
            Err(SeedError::Invalid(ProcedureError::InvalidInput { .. }))
        ));
    }

    #[test]
    fn test_malformed_file_is_reported() {
        assert!(matches!(
            parse_batch("[{", &path()),
            Err(SeedError::Json { .. })
        ));
    }
}
