//! Site procedures, grouped by area.

pub mod auth;
pub mod blog;
pub mod contact;
pub mod events;
pub mod gallery;
pub mod system;

use super::ProcedureRouter;

pub fn register_all(router: &mut ProcedureRouter) {
    auth::register(router);
    blog::register(router);
    events::register(router);
    contact::register(router);
    gallery::register(router);
    system::register(router);
}
