/*!
 * Procedure input contracts
 * Shape (serde) plus format checks for every procedure payload.
 */
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use super::error::ProcedureError;
use crate::db::models::{NewBlogPost, NewContactSubmission, NewEvent, NewGalleryImage};

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();

    /// One `@`, a dotted domain, no whitespace anywhere
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();

    static ref MISSING_FIELD_REGEX: Regex = Regex::new(r"missing field `([^`]+)`").unwrap();
}

pub const DEFAULT_BLOG_CATEGORY: &str = "announcement";

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Format checks applied after the payload has the right shape.
pub trait Validate {
    fn validate(&self) -> Result<(), ProcedureError> {
        Ok(())
    }
}

/// A payload a procedure can be called with.
pub trait Input: Sized + Send + 'static {
    fn parse(raw: Value) -> Result<Self, ProcedureError>;
}

impl<T> Input for T
where
    T: DeserializeOwned + Validate + Send + 'static,
{
    fn parse(raw: Value) -> Result<Self, ProcedureError> {
        let input: T = serde_json::from_value(raw).map_err(shape_error)?;
        input.validate()?;
        Ok(input)
    }
}

/// Procedures that take no input accept (and ignore) any payload.
pub type NoInput = serde::de::IgnoredAny;

impl Validate for NoInput {}

fn shape_error(err: serde_json::Error) -> ProcedureError {
    let message = err.to_string();
    let field = MISSING_FIELD_REGEX
        .captures(&message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    ProcedureError::InvalidInput { field, message }
}

fn required(field: &str, value: &str) -> Result<(), ProcedureError> {
    if value.trim().is_empty() {
        return Err(ProcedureError::invalid(field, format!("{} is required", field)));
    }
    Ok(())
}

/// Optional text from a form: blank means absent.
fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_true() -> bool {
    true
}

fn default_blog_category() -> String {
    DEFAULT_BLOG_CATEGORY.to_string()
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (taken as UTC) or `YYYY-MM-DD`
/// (midnight UTC).
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_event_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_event_date(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "invalid date '{}': expected RFC 3339 or YYYY-MM-DD",
            raw
        ))
    })
}

// ============================================================================
// Blog
// ============================================================================

fn check_slug(slug: &str) -> Result<(), ProcedureError> {
    required("slug", slug)?;
    if !is_valid_slug(slug) {
        return Err(ProcedureError::invalid(
            "slug",
            "Slug must contain only lowercase letters, numbers, and hyphens",
        ));
    }
    Ok(())
}

/// `blog.getBySlug` takes the bare slug string. Any string is a valid
/// lookup; one that cannot be a slug simply finds nothing.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct SlugInput(pub String);

impl Validate for SlugInput {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogPostInput {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    #[serde(default = "default_blog_category")]
    pub category: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_true")]
    pub published: bool,
}

impl Validate for CreateBlogPostInput {
    fn validate(&self) -> Result<(), ProcedureError> {
        required("title", &self.title)?;
        check_slug(&self.slug)?;
        required("content", &self.content)?;
        required("category", &self.category)
    }
}

impl CreateBlogPostInput {
    pub fn into_new(self, author_id: Uuid) -> NewBlogPost {
        NewBlogPost {
            title: self.title,
            slug: self.slug,
            content: self.content,
            excerpt: optional(self.excerpt),
            category: self.category,
            author_id,
            featured: self.featured,
            published: self.published,
        }
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventInput {
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "deserialize_event_date")]
    pub date: DateTime<Utc>,
    pub location: String,
    pub category: String,
    pub registration_link: Option<String>,
    #[serde(default = "default_true")]
    pub published: bool,
}

impl Validate for CreateEventInput {
    fn validate(&self) -> Result<(), ProcedureError> {
        required("title", &self.title)?;
        required("description", &self.description)?;
        required("location", &self.location)?;
        required("category", &self.category)
    }
}

impl From<CreateEventInput> for NewEvent {
    fn from(input: CreateEventInput) -> Self {
        NewEvent {
            title: input.title,
            description: input.description,
            date: input.date,
            location: input.location,
            category: input.category,
            registration_link: optional(input.registration_link),
            published: input.published,
        }
    }
}

// ============================================================================
// Contact
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmitInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

impl Validate for ContactSubmitInput {
    fn validate(&self) -> Result<(), ProcedureError> {
        required("name", &self.name)?;
        if !is_valid_email(self.email.trim()) {
            return Err(ProcedureError::invalid(
                "email",
                "email must be a valid email address",
            ));
        }
        required("subject", &self.subject)?;
        required("message", &self.message)
    }
}

impl From<ContactSubmitInput> for NewContactSubmission {
    fn from(input: ContactSubmitInput) -> Self {
        NewContactSubmission {
            name: input.name,
            email: input.email.trim().to_string(),
            phone: optional(input.phone),
            subject: input.subject,
            message: input.message,
        }
    }
}

// ============================================================================
// Gallery
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImageInput {
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub category: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub published: bool,
}

impl Validate for GalleryImageInput {
    fn validate(&self) -> Result<(), ProcedureError> {
        required("title", &self.title)?;
        required("imageUrl", &self.image_url)?;
        required("category", &self.category)
    }
}

impl From<GalleryImageInput> for NewGalleryImage {
    fn from(input: GalleryImageInput) -> Self {
        NewGalleryImage {
            title: input.title,
            description: optional(input.description),
            image_url: input.image_url,
            category: input.category,
            display_order: input.display_order,
            published: input.published,
        }
    }
}

/// `gallery.bulkCreate`: an array, each item held to the `gallery.create`
/// contract. An empty array is a valid batch that inserts nothing.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct GalleryBatchInput(pub Vec<GalleryImageInput>);

impl Validate for GalleryBatchInput {
    fn validate(&self) -> Result<(), ProcedureError> {
        for (index, item) in self.0.iter().enumerate() {
            item.validate().map_err(|err| match err {
                ProcedureError::InvalidInput { field, message } => ProcedureError::InvalidInput {
                    field: Some(match field {
                        Some(f) => format!("[{}].{}", index, f),
                        None => format!("[{}]", index),
                    }),
                    message,
                },
                other => other,
            })?;
        }
        Ok(())
    }
}
