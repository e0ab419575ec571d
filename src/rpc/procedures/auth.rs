use serde_json::json;

use crate::rpc::{AuthLevel, CallContext, NoInput, Procedure, ProcedureResult, ProcedureRouter, Reply};

pub fn register(router: &mut ProcedureRouter) {
    router
        .register(Procedure::query("auth.me", AuthLevel::Public, me))
        .register(Procedure::mutation("auth.logout", AuthLevel::Public, logout));
}

/// The resolved caller, or `null` for anonymous requests.
async fn me(ctx: CallContext, _: NoInput) -> ProcedureResult {
    Reply::json(ctx.caller)
}

async fn logout(ctx: CallContext, _: NoInput) -> ProcedureResult {
    if let Some(user) = &ctx.caller {
        tracing::info!(open_id = %user.open_id, "user signed out");
    }
    Ok(Reply::json(json!({ "success": true }))?.with_cookie(ctx.sessions.clear_cookie()))
}
