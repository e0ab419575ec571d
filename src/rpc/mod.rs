/*!
 * Procedure Router
 * Named operations with an input contract, an authorization level and a
 * handler. Dispatch validates, resolves the caller, authorizes, then runs.
 */
pub mod auth;
pub mod error;
pub mod input;
pub mod procedures;

use axum::http::HeaderMap;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, future::Future, sync::Arc};

use crate::db::models::User;
use crate::identity::IdentityResolver;
use crate::session::SessionManager;
use crate::store::Content;

pub use auth::{allowed, authorize, AuthLevel};
pub use error::ProcedureError;
pub use input::{Input, NoInput, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureKind {
    Query,
    Mutation,
}

/// How the call arrived. Mutations are only accepted over `Post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Get,
    Post,
}

/// Everything a handler may touch.
#[derive(Clone)]
pub struct CallContext {
    pub caller: Option<User>,
    pub content: Content,
    pub sessions: SessionManager,
}

impl CallContext {
    /// The caller, for handlers behind `Authenticated` or `Admin`.
    pub fn require_user(&self) -> Result<&User, ProcedureError> {
        self.caller.as_ref().ok_or(ProcedureError::Unauthorized)
    }
}

/// Successful procedure result plus any cookies to set on the response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub data: Value,
    pub set_cookies: Vec<String>,
}

impl Reply {
    pub fn json<T: Serialize>(data: T) -> Result<Self, ProcedureError> {
        let data =
            serde_json::to_value(data).map_err(|e| ProcedureError::Internal(e.to_string()))?;
        Ok(Self {
            data,
            set_cookies: Vec::new(),
        })
    }

    pub fn with_cookie(mut self, cookie: String) -> Self {
        self.set_cookies.push(cookie);
        self
    }
}

pub type ProcedureResult = Result<Reply, ProcedureError>;

type PreparedCall = Box<dyn FnOnce(CallContext) -> BoxFuture<'static, ProcedureResult> + Send>;
type Prepare = Arc<dyn Fn(Value) -> Result<PreparedCall, ProcedureError> + Send + Sync>;

/// One registered operation.
#[derive(Clone)]
pub struct Procedure {
    name: &'static str,
    kind: ProcedureKind,
    auth: AuthLevel,
    prepare: Prepare,
}

impl Procedure {
    pub fn new<I, F, Fut>(name: &'static str, kind: ProcedureKind, auth: AuthLevel, handler: F) -> Self
    where
        I: Input,
        F: Fn(CallContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcedureResult> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let prepare: Prepare = Arc::new(move |raw: Value| -> Result<PreparedCall, ProcedureError> {
            let input = I::parse(raw)?;
            let handler = handler.clone();
            Ok(Box::new(
                move |ctx: CallContext| -> BoxFuture<'static, ProcedureResult> {
                    Box::pin(async move { handler(ctx, input).await })
                },
            ))
        });

        Self {
            name,
            kind,
            auth,
            prepare,
        }
    }

    pub fn query<I, F, Fut>(name: &'static str, auth: AuthLevel, handler: F) -> Self
    where
        I: Input,
        F: Fn(CallContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcedureResult> + Send + 'static,
    {
        Self::new(name, ProcedureKind::Query, auth, handler)
    }

    pub fn mutation<I, F, Fut>(name: &'static str, auth: AuthLevel, handler: F) -> Self
    where
        I: Input,
        F: Fn(CallContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcedureResult> + Send + 'static,
    {
        Self::new(name, ProcedureKind::Mutation, auth, handler)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ProcedureKind {
        self.kind
    }

    pub fn auth(&self) -> AuthLevel {
        self.auth
    }
}

/// The procedure registry plus the collaborators every call needs.
pub struct ProcedureRouter {
    procedures: BTreeMap<&'static str, Procedure>,
    identity: IdentityResolver,
    content: Content,
}

impl ProcedureRouter {
    /// Empty registry.
    pub fn empty(content: Content, identity: IdentityResolver) -> Self {
        Self {
            procedures: BTreeMap::new(),
            identity,
            content,
        }
    }

    /// Registry with every site procedure installed.
    pub fn new(content: Content, identity: IdentityResolver) -> Self {
        let mut router = Self::empty(content, identity);
        procedures::register_all(&mut router);
        router
    }

    pub fn register(&mut self, procedure: Procedure) -> &mut Self {
        if self.procedures.insert(procedure.name, procedure).is_some() {
            tracing::warn!("procedure registered twice; keeping the later one");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Procedure> {
        self.procedures.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.procedures.keys().copied()
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Run one call end to end.
    pub async fn call(
        &self,
        name: &str,
        transport: Transport,
        raw_input: Value,
        headers: &HeaderMap,
    ) -> ProcedureResult {
        let procedure = self
            .procedures
            .get(name)
            .ok_or_else(|| ProcedureError::NotFound(name.to_string()))?;

        if procedure.kind == ProcedureKind::Mutation && transport == Transport::Get {
            return Err(ProcedureError::MethodNotSupported(name.to_string()));
        }

        let prepared = (procedure.prepare)(raw_input).map_err(|err| {
            tracing::debug!(procedure = %name, error = %err, "rejected procedure input");
            err
        })?;

        let caller = self.identity.resolve(headers).await;

        if let Err(err) = authorize(procedure.auth, caller.as_ref()) {
            tracing::warn!(
                procedure = %name,
                required = ?procedure.auth,
                caller = caller.as_ref().map(|u| u.open_id.as_str()).unwrap_or("anonymous"),
                "procedure call denied"
            );
            return Err(err);
        }

        let ctx = CallContext {
            caller,
            content: self.content.clone(),
            sessions: self.identity.sessions().clone(),
        };

        prepared(ctx).await
    }
}
