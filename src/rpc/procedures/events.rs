use crate::rpc::input::CreateEventInput;
use crate::rpc::{AuthLevel, CallContext, NoInput, Procedure, ProcedureResult, ProcedureRouter, Reply};

pub fn register(router: &mut ProcedureRouter) {
    router
        .register(Procedure::query("events.list", AuthLevel::Public, list))
        .register(Procedure::mutation("events.create", AuthLevel::Admin, create));
}

async fn list(ctx: CallContext, _: NoInput) -> ProcedureResult {
    Reply::json(ctx.content.events().await)
}

async fn create(ctx: CallContext, input: CreateEventInput) -> ProcedureResult {
    let event = ctx.content.create_event(input.into()).await;
    if let Some(event) = &event {
        tracing::info!(event_id = %event.id, date = %event.date, "event created");
    }
    Reply::json(event)
}
