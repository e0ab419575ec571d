/*!
 * Content Store
 * Persistence contract for site content and users, plus the degrading
 * facade the procedure handlers talk to.
 */
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;

use crate::db::models::{
    BlogPost, ContactSubmission, Event, GalleryImage, NewBlogPost, NewContactSubmission,
    NewEvent, NewGalleryImage, Role, UpsertUser, User,
};

pub use memory::{MemoryContentStore, StoreCounts};
pub use postgres::PgContentStore;

/// Public blog list size.
pub const BLOG_LIST_LIMIT: i64 = 20;
/// Public event list size.
pub const EVENT_LIST_LIMIT: i64 = 20;
/// Public gallery list size.
pub const GALLERY_LIST_LIMIT: i64 = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable")]
    Unavailable,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Typed reads and writes over every persisted collection.
///
/// Public list and lookup methods only ever return rows with
/// `published = true`. Insert methods return the row as persisted.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    // Users
    async fn find_user_by_open_id(&self, open_id: &str) -> Result<Option<User>, StoreError>;
    /// Atomic insert-or-update keyed on `open_id`. `role` is the role to
    /// write on insert; `role_override` replaces the stored role on update.
    async fn upsert_user(
        &self,
        user: &UpsertUser,
        role: Role,
        role_override: Option<Role>,
    ) -> Result<User, StoreError>;

    // Blog
    async fn list_published_posts(&self, limit: i64) -> Result<Vec<BlogPost>, StoreError>;
    async fn find_published_post_by_slug(&self, slug: &str)
        -> Result<Option<BlogPost>, StoreError>;
    async fn insert_post(&self, post: &NewBlogPost) -> Result<BlogPost, StoreError>;

    // Events
    async fn list_published_events(&self, limit: i64) -> Result<Vec<Event>, StoreError>;
    async fn insert_event(&self, event: &NewEvent) -> Result<Event, StoreError>;

    // Contact
    async fn insert_contact_submission(
        &self,
        submission: &NewContactSubmission,
    ) -> Result<ContactSubmission, StoreError>;
    async fn list_contact_submissions(&self) -> Result<Vec<ContactSubmission>, StoreError>;

    // Gallery
    async fn list_published_gallery_images(
        &self,
        limit: i64,
    ) -> Result<Vec<GalleryImage>, StoreError>;
    async fn insert_gallery_image(&self, image: &NewGalleryImage)
        -> Result<GalleryImage, StoreError>;
    /// All rows or none.
    async fn insert_gallery_images(
        &self,
        images: &[NewGalleryImage],
    ) -> Result<Vec<GalleryImage>, StoreError>;
}

/// Handler-facing view of the store: reads degrade to empty results and
/// writes to `None` when the store fails. Failures are logged here.
#[derive(Clone)]
pub struct Content {
    store: Arc<dyn ContentStore>,
}

impl Content {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Round-trip to the store, timed.
    pub async fn timed_ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        self.store.ping().await?;
        Ok(start.elapsed())
    }

    pub async fn is_available(&self) -> bool {
        match self.timed_ping().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "content store ping failed");
                false
            }
        }
    }

    pub async fn blog_posts(&self) -> Vec<BlogPost> {
        degrade_list("blog posts", self.store.list_published_posts(BLOG_LIST_LIMIT).await)
    }

    pub async fn blog_post_by_slug(&self, slug: &str) -> Option<BlogPost> {
        match self.store.find_published_post_by_slug(slug).await {
            Ok(post) => post,
            Err(e) => {
                tracing::error!(slug = %slug, error = %e, "failed to fetch blog post");
                None
            }
        }
    }

    pub async fn create_blog_post(&self, post: NewBlogPost) -> Option<BlogPost> {
        degrade_write("blog post", self.store.insert_post(&post).await)
    }

    pub async fn events(&self) -> Vec<Event> {
        degrade_list("events", self.store.list_published_events(EVENT_LIST_LIMIT).await)
    }

    pub async fn create_event(&self, event: NewEvent) -> Option<Event> {
        degrade_write("event", self.store.insert_event(&event).await)
    }

    pub async fn submit_contact(&self, submission: NewContactSubmission) -> Option<ContactSubmission> {
        degrade_write(
            "contact submission",
            self.store.insert_contact_submission(&submission).await,
        )
    }

    pub async fn contact_submissions(&self) -> Vec<ContactSubmission> {
        degrade_list("contact submissions", self.store.list_contact_submissions().await)
    }

    pub async fn gallery_images(&self) -> Vec<GalleryImage> {
        degrade_list(
            "gallery images",
            self.store
                .list_published_gallery_images(GALLERY_LIST_LIMIT)
                .await,
        )
    }

    pub async fn create_gallery_image(&self, image: NewGalleryImage) -> Option<GalleryImage> {
        degrade_write("gallery image", self.store.insert_gallery_image(&image).await)
    }

    pub async fn create_gallery_images(
        &self,
        images: Vec<NewGalleryImage>,
    ) -> Option<Vec<GalleryImage>> {
        degrade_write(
            "gallery image batch",
            self.store.insert_gallery_images(&images).await,
        )
    }
}

fn degrade_list<T>(what: &str, result: Result<Vec<T>, StoreError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::error!(collection = what, error = %e, "failed to list content");
        Vec::new()
    })
}

fn degrade_write<T>(what: &str, result: Result<T, StoreError>) -> Option<T> {
    match result {
        Ok(row) => Some(row),
        Err(StoreError::Conflict(msg)) => {
            tracing::warn!(entity = what, conflict = %msg, "rejected duplicate write");
            None
        }
        Err(e) => {
            tracing::error!(entity = what, error = %e, "failed to create content");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(title: &str, order: i32) -> NewGalleryImage {
        NewGalleryImage {
            title: title.to_string(),
            description: None,
            image_url: format!("/gallery/{}.jpg", title),
            category: "photos".to_string(),
            display_order: order,
            published: true,
        }
    }

    #[tokio::test]
    async fn test_lists_degrade_to_empty_when_offline() {
        let store = Arc::new(MemoryContentStore::new());
        let content = Content::new(store.clone());
        assert!(content.create_gallery_image(image("lab", 1)).await.is_some());

        store.set_available(false);
        assert!(content.gallery_images().await.is_empty());
        assert!(content.blog_posts().await.is_empty());
        assert!(content.events().await.is_empty());
        assert!(content.contact_submissions().await.is_empty());
        assert!(content.blog_post_by_slug("anything").await.is_none());
        assert!(!content.is_available().await);

        store.set_available(true);
        assert_eq!(content.gallery_images().await.len(), 1);
        assert!(content.is_available().await);
    }

    #[tokio::test]
    async fn test_writes_degrade_to_none_when_offline() {
        let store = Arc::new(MemoryContentStore::new());
        let content = Content::new(store.clone());
        store.set_available(false);

        assert!(content.create_gallery_image(image("lab", 1)).await.is_none());
        assert!(content
            .create_gallery_images(vec![image("a", 1), image("b", 2)])
            .await
            .is_none());

        store.set_available(true);
        assert!(content.gallery_images().await.is_empty());
    }

    #[test]
    fn test_pool_timeout_maps_to_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable));

        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
