use crate::db::models::NewGalleryImage;
use crate::rpc::input::{GalleryBatchInput, GalleryImageInput};
use crate::rpc::{AuthLevel, CallContext, NoInput, Procedure, ProcedureResult, ProcedureRouter, Reply};

pub fn register(router: &mut ProcedureRouter) {
    router
        .register(Procedure::query("gallery.list", AuthLevel::Public, list))
        .register(Procedure::mutation("gallery.create", AuthLevel::Admin, create))
        .register(Procedure::mutation("gallery.bulkCreate", AuthLevel::Admin, bulk_create));
}

async fn list(ctx: CallContext, _: NoInput) -> ProcedureResult {
    Reply::json(ctx.content.gallery_images().await)
}

async fn create(ctx: CallContext, input: GalleryImageInput) -> ProcedureResult {
    Reply::json(ctx.content.create_gallery_image(input.into()).await)
}

async fn bulk_create(ctx: CallContext, GalleryBatchInput(items): GalleryBatchInput) -> ProcedureResult {
    let images: Vec<NewGalleryImage> = items.into_iter().map(Into::into).collect();
    let count = images.len();
    let created = ctx.content.create_gallery_images(images).await;
    if created.is_some() {
        tracing::info!(count, "gallery batch inserted");
    }
    Reply::json(created)
}
