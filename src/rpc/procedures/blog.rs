use crate::rpc::input::{CreateBlogPostInput, SlugInput};
use crate::rpc::{AuthLevel, CallContext, NoInput, Procedure, ProcedureResult, ProcedureRouter, Reply};

pub fn register(router: &mut ProcedureRouter) {
    router
        .register(Procedure::query("blog.list", AuthLevel::Public, list))
        .register(Procedure::query("blog.getBySlug", AuthLevel::Public, get_by_slug))
        .register(Procedure::mutation("blog.create", AuthLevel::Admin, create));
}

async fn list(ctx: CallContext, _: NoInput) -> ProcedureResult {
    Reply::json(ctx.content.blog_posts().await)
}

async fn get_by_slug(ctx: CallContext, SlugInput(slug): SlugInput) -> ProcedureResult {
    Reply::json(ctx.content.blog_post_by_slug(&slug).await)
}

/// Authored by the caller. A taken slug yields `null`.
async fn create(ctx: CallContext, input: CreateBlogPostInput) -> ProcedureResult {
    let author_id = ctx.require_user()?.id;
    let post = ctx.content.create_blog_post(input.into_new(author_id)).await;
    if let Some(post) = &post {
        tracing::info!(slug = %post.slug, published = post.published, "blog post created");
    }
    Reply::json(post)
}
