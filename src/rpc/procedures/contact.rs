use crate::rpc::input::ContactSubmitInput;
use crate::rpc::{AuthLevel, CallContext, NoInput, Procedure, ProcedureResult, ProcedureRouter, Reply};

pub fn register(router: &mut ProcedureRouter) {
    router
        .register(Procedure::mutation("contact.submit", AuthLevel::Public, submit))
        .register(Procedure::query("contact.list", AuthLevel::Admin, list));
}

async fn submit(ctx: CallContext, input: ContactSubmitInput) -> ProcedureResult {
    let submission = ctx.content.submit_contact(input.into()).await;
    if let Some(submission) = &submission {
        tracing::info!(submission_id = %submission.id, "contact form received");
    }
    Reply::json(submission)
}

/// Newest first, read or not.
async fn list(ctx: CallContext, _: NoInput) -> ProcedureResult {
    Reply::json(ctx.content.contact_submissions().await)
}
