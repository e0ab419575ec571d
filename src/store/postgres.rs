//! Postgres-backed content store.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{ContentStore, StoreError};
use crate::db::models::{
    BlogPost, ContactSubmission, Event, GalleryImage, NewBlogPost, NewContactSubmission,
    NewEvent, NewGalleryImage, Role, UpsertUser, User,
};

const USER_COLUMNS: &str =
    "id, open_id, name, email, login_method, role, created_at, updated_at, last_signed_in";
const POST_COLUMNS: &str = "id, title, slug, content, excerpt, category, author_id, featured, published, created_at, updated_at";
const EVENT_COLUMNS: &str = "id, title, description, date, location, category, registration_link, published, created_at, updated_at";
const CONTACT_COLUMNS: &str = "id, name, email, phone, subject, message, read, created_at";
const GALLERY_COLUMNS: &str =
    "id, title, description, image_url, category, display_order, published, created_at, updated_at";

/// `blog_posts.author_id` references `users`, so users go last.
const CLEAR_ORDER: [&str; 5] = [
    "contact_submissions",
    "gallery_images",
    "events",
    "blog_posts",
    "users",
];

/// Content store over a `sqlx` Postgres pool.
///
/// Constructed without a pool when the database is not configured or could
/// not be reached at startup; every call then reports `Unavailable`.
#[derive(Clone)]
pub struct PgContentStore {
    pool: Option<PgPool>,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Some(pool) }
    }

    pub fn disconnected() -> Self {
        Self { pool: None }
    }

    fn pool(&self) -> Result<&PgPool, StoreError> {
        self.pool.as_ref().ok_or(StoreError::Unavailable)
    }

    /// Delete every row from every table in one transaction, children first.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let mut tx = self.pool()?.begin().await?;
        for table in CLEAR_ORDER {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let elapsed = crate::db::health_check(self.pool()?).await?;
        tracing::debug!(elapsed_ms = %elapsed.as_millis(), "database ping");
        Ok(())
    }

    async fn find_user_by_open_id(&self, open_id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE open_id = $1 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(open_id)
        .fetch_optional(self.pool()?)
        .await?;
        Ok(user)
    }

    async fn upsert_user(
        &self,
        user: &UpsertUser,
        role: Role,
        role_override: Option<Role>,
    ) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (open_id, name, email, login_method, role, last_signed_in)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (open_id) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, users.name),
                email = COALESCE(EXCLUDED.email, users.email),
                login_method = COALESCE(EXCLUDED.login_method, users.login_method),
                role = COALESCE($6, users.role),
                last_signed_in = now(),
                updated_at = now()
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.open_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.login_method)
        .bind(role.as_str())
        .bind(role_override.map(|r| r.as_str()))
        .fetch_one(self.pool()?)
        .await?;
        Ok(row)
    }

    async fn list_published_posts(&self, limit: i64) -> Result<Vec<BlogPost>, StoreError> {
        let posts = sqlx::query_as::<_, BlogPost>(&format!(
            "SELECT {} FROM blog_posts WHERE published = true ORDER BY created_at DESC LIMIT $1",
            POST_COLUMNS
        ))
        .bind(limit)
        .fetch_all(self.pool()?)
        .await?;
        Ok(posts)
    }

    async fn find_published_post_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<BlogPost>, StoreError> {
        let post = sqlx::query_as::<_, BlogPost>(&format!(
            "SELECT {} FROM blog_posts WHERE slug = $1 AND published = true LIMIT 1",
            POST_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(self.pool()?)
        .await?;
        Ok(post)
    }

    async fn insert_post(&self, post: &NewBlogPost) -> Result<BlogPost, StoreError> {
        let row = sqlx::query_as::<_, BlogPost>(&format!(
            r#"
            INSERT INTO blog_posts (title, slug, content, excerpt, category, author_id, featured, published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.category)
        .bind(post.author_id)
        .bind(post.featured)
        .bind(post.published)
        .fetch_one(self.pool()?)
        .await?;
        Ok(row)
    }

    async fn list_published_events(&self, limit: i64) -> Result<Vec<Event>, StoreError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE published = true ORDER BY date ASC LIMIT $1",
            EVENT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(self.pool()?)
        .await?;
        Ok(events)
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<Event, StoreError> {
        let row = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (title, description, date, location, category, registration_link, published)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(&event.category)
        .bind(&event.registration_link)
        .bind(event.published)
        .fetch_one(self.pool()?)
        .await?;
        Ok(row)
    }

    async fn insert_contact_submission(
        &self,
        submission: &NewContactSubmission,
    ) -> Result<ContactSubmission, StoreError> {
        let row = sqlx::query_as::<_, ContactSubmission>(&format!(
            r#"
            INSERT INTO contact_submissions (name, email, phone, subject, message, read)
            VALUES ($1, $2, $3, $4, $5, false)
            RETURNING {}
            "#,
            CONTACT_COLUMNS
        ))
        .bind(&submission.name)
        .bind(&submission.email)
        .bind(&submission.phone)
        .bind(&submission.subject)
        .bind(&submission.message)
        .fetch_one(self.pool()?)
        .await?;
        Ok(row)
    }

    async fn list_contact_submissions(&self) -> Result<Vec<ContactSubmission>, StoreError> {
        let rows = sqlx::query_as::<_, ContactSubmission>(&format!(
            "SELECT {} FROM contact_submissions ORDER BY created_at DESC",
            CONTACT_COLUMNS
        ))
        .fetch_all(self.pool()?)
        .await?;
        Ok(rows)
    }

    async fn list_published_gallery_images(
        &self,
        limit: i64,
    ) -> Result<Vec<GalleryImage>, StoreError> {
        let rows = sqlx::query_as::<_, GalleryImage>(&format!(
            "SELECT {} FROM gallery_images WHERE published = true ORDER BY display_order ASC, created_at ASC LIMIT $1",
            GALLERY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(self.pool()?)
        .await?;
        Ok(rows)
    }

    async fn insert_gallery_image(
        &self,
        image: &NewGalleryImage,
    ) -> Result<GalleryImage, StoreError> {
        let row = sqlx::query_as::<_, GalleryImage>(&format!(
            r#"
            INSERT INTO gallery_images (title, description, image_url, category, display_order, published)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            GALLERY_COLUMNS
        ))
        .bind(&image.title)
        .bind(&image.description)
        .bind(&image.image_url)
        .bind(&image.category)
        .bind(image.display_order)
        .bind(image.published)
        .fetch_one(self.pool()?)
        .await?;
        Ok(row)
    }

    async fn insert_gallery_images(
        &self,
        images: &[NewGalleryImage],
    ) -> Result<Vec<GalleryImage>, StoreError> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        // One multi-row INSERT: Postgres applies it atomically.
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO gallery_images (title, description, image_url, category, display_order, published) ",
        );
        builder.push_values(images, |mut row, image| {
            row.push_bind(&image.title)
                .push_bind(&image.description)
                .push_bind(&image.image_url)
                .push_bind(&image.category)
                .push_bind(image.display_order)
                .push_bind(image.published);
        });
        builder.push(" RETURNING ");
        builder.push(GALLERY_COLUMNS);

        let rows = builder
            .build_query_as::<GalleryImage>()
            .fetch_all(self.pool()?)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_disconnected_store_reports_unavailable() {
        let store = PgContentStore::disconnected();
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable)));
        assert!(matches!(
            store.list_published_posts(20).await,
            Err(StoreError::Unavailable)
        ));
        assert!(matches!(
            store.find_user_by_open_id("owner").await,
            Err(StoreError::Unavailable)
        ));

        let event = NewEvent {
            title: "Hack Night".to_string(),
            description: "Bring a laptop".to_string(),
            date: Utc::now(),
            location: "Lab 2".to_string(),
            category: "workshop".to_string(),
            registration_link: None,
            published: true,
        };
        assert!(matches!(
            store.insert_event(&event).await,
            Err(StoreError::Unavailable)
        ));

        let post = NewBlogPost {
            title: "Hello".to_string(),
            slug: "hello".to_string(),
            content: "World".to_string(),
            excerpt: None,
            category: "announcement".to_string(),
            author_id: Uuid::new_v4(),
            featured: false,
            published: true,
        };
        assert!(matches!(
            store.insert_post(&post).await,
            Err(StoreError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn test_clear_all_needs_a_database() {
        let store = PgContentStore::disconnected();
        assert!(matches!(store.clear_all().await, Err(StoreError::Unavailable)));
        assert_eq!(CLEAR_ORDER.last(), Some(&"users"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let store = PgContentStore::disconnected();
        let rows = store.insert_gallery_images(&[]).await.unwrap();
        assert!(rows.is_empty());
    }
}
