//! In-memory content store.
//!
//! Backs the test suite and local runs without Postgres. Every collection
//! lives behind one lock so batch inserts and upserts are atomic, and the
//! store can be switched offline to exercise the unavailable paths.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ContentStore, StoreError};
use crate::db::models::{
    BlogPost, ContactSubmission, Event, GalleryImage, NewBlogPost, NewContactSubmission,
    NewEvent, NewGalleryImage, Role, UpsertUser, User,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    blog_posts: Vec<BlogPost>,
    events: Vec<Event>,
    contact_submissions: Vec<ContactSubmission>,
    gallery_images: Vec<GalleryImage>,
}

pub struct MemoryContentStore {
    tables: RwLock<Tables>,
    available: AtomicBool,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backing database going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    /// Row counts per collection, ignoring the published flag.
    pub async fn counts(&self) -> StoreCounts {
        let tables = self.tables.read().await;
        StoreCounts {
            users: tables.users.len(),
            blog_posts: tables.blog_posts.len(),
            events: tables.events.len(),
            contact_submissions: tables.contact_submissions.len(),
            gallery_images: tables.gallery_images.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCounts {
    pub users: usize,
    pub blog_posts: usize,
    pub events: usize,
    pub contact_submissions: usize,
    pub gallery_images: usize,
}

fn gallery_row(image: &NewGalleryImage) -> GalleryImage {
    let now = Utc::now();
    GalleryImage {
        id: Uuid::new_v4(),
        title: image.title.clone(),
        description: image.description.clone(),
        image_url: image.image_url.clone(),
        category: image.category.clone(),
        display_order: image.display_order,
        published: image.published,
        created_at: now,
        updated_at: now,
    }
}

/// Newest first; later inserts win ties on identical timestamps.
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().rev().cloned().collect();
    out.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    out
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn find_user_by_open_id(&self, open_id: &str) -> Result<Option<User>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.open_id == open_id).cloned())
    }

    async fn upsert_user(
        &self,
        user: &UpsertUser,
        role: Role,
        role_override: Option<Role>,
    ) -> Result<User, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if let Some(existing) = tables.users.iter_mut().find(|u| u.open_id == user.open_id) {
            if let Some(name) = &user.name {
                existing.name = Some(name.clone());
            }
            if let Some(email) = &user.email {
                existing.email = Some(email.clone());
            }
            if let Some(method) = &user.login_method {
                existing.login_method = Some(method.clone());
            }
            if let Some(role) = role_override {
                existing.role = role;
            }
            existing.last_signed_in = now;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let row = User {
            id: Uuid::new_v4(),
            open_id: user.open_id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            login_method: user.login_method.clone(),
            role,
            created_at: now,
            updated_at: now,
            last_signed_in: now,
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    async fn list_published_posts(&self, limit: i64) -> Result<Vec<BlogPost>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        let published: Vec<BlogPost> = tables
            .blog_posts
            .iter()
            .filter(|p| p.published)
            .cloned()
            .collect();
        let mut rows = newest_first(&published, |p| p.created_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn find_published_post_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<BlogPost>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .blog_posts
            .iter()
            .find(|p| p.slug == slug && p.published)
            .cloned())
    }

    async fn insert_post(&self, post: &NewBlogPost) -> Result<BlogPost, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.blog_posts.iter().any(|p| p.slug == post.slug) {
            return Err(StoreError::Conflict(format!(
                "duplicate key value violates unique constraint on slug '{}'",
                post.slug
            )));
        }

        let now = Utc::now();
        let row = BlogPost {
            id: Uuid::new_v4(),
            title: post.title.clone(),
            slug: post.slug.clone(),
            content: post.content.clone(),
            excerpt: post.excerpt.clone(),
            category: post.category.clone(),
            author_id: post.author_id,
            featured: post.featured,
            published: post.published,
            created_at: now,
            updated_at: now,
        };
        tables.blog_posts.push(row.clone());
        Ok(row)
    }

    async fn list_published_events(&self, limit: i64) -> Result<Vec<Event>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<Event> = tables
            .events
            .iter()
            .filter(|e| e.published)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<Event, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let row = Event {
            id: Uuid::new_v4(),
            title: event.title.clone(),
            description: event.description.clone(),
            date: event.date,
            location: event.location.clone(),
            category: event.category.clone(),
            registration_link: event.registration_link.clone(),
            published: event.published,
            created_at: now,
            updated_at: now,
        };
        tables.events.push(row.clone());
        Ok(row)
    }

    async fn insert_contact_submission(
        &self,
        submission: &NewContactSubmission,
    ) -> Result<ContactSubmission, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let row = ContactSubmission {
            id: Uuid::new_v4(),
            name: submission.name.clone(),
            email: submission.email.clone(),
            phone: submission.phone.clone(),
            subject: submission.subject.clone(),
            message: submission.message.clone(),
            read: false,
            created_at: Utc::now(),
        };
        tables.contact_submissions.push(row.clone());
        Ok(row)
    }

    async fn list_contact_submissions(&self) -> Result<Vec<ContactSubmission>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(newest_first(&tables.contact_submissions, |s| s.created_at))
    }

    async fn list_published_gallery_images(
        &self,
        limit: i64,
    ) -> Result<Vec<GalleryImage>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<GalleryImage> = tables
            .gallery_images
            .iter()
            .filter(|g| g.published)
            .cloned()
            .collect();
        rows.sort_by_key(|g| g.display_order);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert_gallery_image(
        &self,
        image: &NewGalleryImage,
    ) -> Result<GalleryImage, StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let row = gallery_row(image);
        tables.gallery_images.push(row.clone());
        Ok(row)
    }

    async fn insert_gallery_images(
        &self,
        images: &[NewGalleryImage],
    ) -> Result<Vec<GalleryImage>, StoreError> {
        self.check()?;
        let rows: Vec<GalleryImage> = images.iter().map(gallery_row).collect();
        let mut tables = self.tables.write().await;
        tables.gallery_images.extend(rows.iter().cloned());
        Ok(rows)
    }
}
