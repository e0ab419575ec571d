//! Reset the database and fill it with generated demo content.
//!
//! Usage: seed
//!
//! Clears every table, then inserts an admin and a regular user, blog posts
//! by the admin, upcoming events, contact submissions and gallery images.

use bitsa_backend::db::{
    self,
    models::{NewBlogPost, NewContactSubmission, NewEvent, NewGalleryImage, Role, UpsertUser},
};
use bitsa_backend::store::{ContentStore, PgContentStore, StoreError};
use chrono::{Duration, Utc};
use fake::faker::address::en::{BuildingNumber, CityName, StreetName};
use fake::faker::boolean::en::Boolean;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::{Paragraph, Paragraphs, Sentence, Words};
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const BLOG_POSTS: usize = 10;
const EVENTS: usize = 8;
const CONTACT_SUBMISSIONS: usize = 15;
const GALLERY_IMAGES: usize = 20;

const BLOG_CATEGORIES: &[&str] = &["announcement", "news", "tutorial", "event-recap"];
const EVENT_CATEGORIES: &[&str] = &["competition", "meeting", "workshop", "social"];
const GALLERY_CATEGORIES: &[&str] = &["hardware", "software", "team", "event"];

#[derive(Debug, Error)]
enum SeedError {
    #[error("could not connect to the database: {0}")]
    Connect(sqlx::Error),

    #[error("migrations failed: {0}")]
    Migrate(sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SeedReport {
    users: usize,
    blog_posts: usize,
    events: usize,
    contact_submissions: usize,
    gallery_images: usize,
}

fn pick<'a>(options: &[&'a str]) -> &'a str {
    options[(0..options.len()).fake::<usize>()]
}

fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..5].to_string()
}

fn fake_user(role: Role) -> UpsertUser {
    UpsertUser {
        open_id: Uuid::new_v4().simple().to_string(),
        name: Some(Name().fake()),
        email: Some(SafeEmail().fake()),
        login_method: Some("oauth".to_string()),
        role: Some(role),
    }
}

fn fake_post(author_id: Uuid) -> NewBlogPost {
    let title: String = Sentence(4..6).fake();
    let stem = match slugify(&title) {
        stem if stem.is_empty() => "post".to_string(),
        stem => stem,
    };
    let paragraphs: Vec<String> = Paragraphs(5..6).fake();

    NewBlogPost {
        slug: format!("{}-{}", stem, short_id()),
        title,
        content: paragraphs.join("\n\n"),
        excerpt: Some(Paragraph(2..3).fake()),
        category: pick(BLOG_CATEGORIES).to_string(),
        author_id,
        featured: Boolean(50).fake(),
        published: true,
    }
}

fn fake_event() -> NewEvent {
    let words: Vec<String> = Words(3..5).fake();
    let title = format!("{} Competition", words.join(" "));
    let paragraphs: Vec<String> = Paragraphs(3..4).fake();
    let building: String = BuildingNumber().fake();
    let street: String = StreetName().fake();
    let city: String = CityName().fake();

    NewEvent {
        registration_link: Some(format!(
            "https://events.example.org/{}-{}",
            slugify(&title),
            short_id()
        )),
        title,
        description: paragraphs.join("\n\n"),
        date: Utc::now() + Duration::days((1..365).fake::<i64>()),
        location: format!("{} {}, {}", building, street, city),
        category: pick(EVENT_CATEGORIES).to_string(),
        published: true,
    }
}

fn fake_contact_submission() -> NewContactSubmission {
    NewContactSubmission {
        name: Name().fake(),
        email: SafeEmail().fake(),
        phone: Some(PhoneNumber().fake()),
        subject: Sentence(4..6).fake(),
        message: Paragraph(3..5).fake(),
    }
}

fn fake_gallery_image() -> NewGalleryImage {
    let words: Vec<String> = Words(2..4).fake();
    NewGalleryImage {
        title: words.join(" "),
        description: Some(Sentence(8..12).fake()),
        image_url: format!(
            "https://loremflickr.com/800/600/tech?lock={}",
            (1..10_000).fake::<u32>()
        ),
        category: pick(GALLERY_CATEGORIES).to_string(),
        display_order: (1..100).fake::<i32>(),
        published: true,
    }
}

/// Insert the demo data set. Stops at the first store error.
async fn populate(store: &dyn ContentStore) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();

    let admin = store
        .upsert_user(&fake_user(Role::Admin), Role::Admin, Some(Role::Admin))
        .await?;
    store
        .upsert_user(&fake_user(Role::User), Role::User, Some(Role::User))
        .await?;
    report.users = 2;
    tracing::info!(admin_id = %admin.id, "seeded users");

    for _ in 0..BLOG_POSTS {
        store.insert_post(&fake_post(admin.id)).await?;
        report.blog_posts += 1;
    }

    for _ in 0..EVENTS {
        store.insert_event(&fake_event()).await?;
        report.events += 1;
    }

    for _ in 0..CONTACT_SUBMISSIONS {
        store
            .insert_contact_submission(&fake_contact_submission())
            .await?;
        report.contact_submissions += 1;
    }

    let images: Vec<NewGalleryImage> = (0..GALLERY_IMAGES).map(|_| fake_gallery_image()).collect();
    report.gallery_images = store.insert_gallery_images(&images).await?.len();

    Ok(report)
}

async fn seed() -> Result<SeedReport, SeedError> {
    let pool = db::init_pool(None).await.map_err(SeedError::Connect)?;
    db::run_migrations(&pool).await.map_err(SeedError::Migrate)?;

    let store = PgContentStore::new(pool);
    tracing::info!("clearing existing data");
    store.clear_all().await?;

    Ok(populate(&store).await?)
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
        Ok(report) => {
            tracing::info!(
                users = report.users,
                blog_posts = report.blog_posts,
                events = report.events,
                contact_submissions = report.contact_submissions,
                gallery_images = report.gallery_images,
                "database seeding complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "database seeding failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitsa_backend::rpc::input::{is_valid_email, is_valid_slug};
    use bitsa_backend::store::{Content, MemoryContentStore};
    use std::sync::Arc;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World! Again"), "hello-world-again");
        assert_eq!(slugify("  --Trim me--  "), "trim-me");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_generated_rows_pass_the_input_rules() {
        for _ in 0..20 {
            let post = fake_post(Uuid::new_v4());
            assert!(is_valid_slug(&post.slug), "bad slug {}", post.slug);
            assert!(BLOG_CATEGORIES.contains(&post.category.as_str()));

            let submission = fake_contact_submission();
            assert!(is_valid_email(&submission.email), "bad email {}", submission.email);

            let event = fake_event();
            assert!(event.date > Utc::now());
            assert!(event.title.ends_with(" Competition"));

            let image = fake_gallery_image();
            assert!((1..100).contains(&image.display_order));
        }
    }

    #[tokio::test]
    async fn test_populate_inserts_the_full_data_set() {
        let store = Arc::new(MemoryContentStore::new());
        let report = populate(store.as_ref()).await.unwrap();

        assert_eq!(
            report,
            SeedReport {
                users: 2,
                blog_posts: BLOG_POSTS,
                events: EVENTS,
                contact_submissions: CONTACT_SUBMISSIONS,
                gallery_images: GALLERY_IMAGES,
            }
        );
        let counts = store.counts().await;
        assert_eq!(counts.users, 2);
        assert_eq!(counts.blog_posts, BLOG_POSTS);
        assert_eq!(counts.gallery_images, GALLERY_IMAGES);

        let content = Content::new(store.clone());
        assert_eq!(content.blog_posts().await.len(), BLOG_POSTS);
        assert_eq!(content.events().await.len(), EVENTS);
    }

    #[tokio::test]
    async fn test_unavailable_store_is_fatal() {
        let store = MemoryContentStore::new();
        store.set_available(false);
        assert!(matches!(
            populate(&store).await,
            Err(StoreError::Unavailable)
        ));

        let offline = PgContentStore::disconnected();
        assert!(matches!(
            offline.clear_all().await,
            Err(StoreError::Unavailable)
        ));
    }
}
