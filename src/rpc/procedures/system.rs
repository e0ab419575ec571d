use serde::Serialize;

use crate::rpc::{AuthLevel, CallContext, NoInput, Procedure, ProcedureResult, ProcedureRouter, Reply};

#[derive(Debug, Serialize)]
pub struct SystemHealth {
    pub ok: bool,
    pub database: bool,
}

pub fn register(router: &mut ProcedureRouter) {
    router.register(Procedure::query("system.health", AuthLevel::Public, health));
}

/// Tells callers whether an empty list means "no rows" or "store down".
async fn health(ctx: CallContext, _: NoInput) -> ProcedureResult {
    Reply::json(SystemHealth {
        ok: true,
        database: ctx.content.is_available().await,
    })
}
