//! Caller identity: session cookie → user record, and the login upsert.

use axum::http::HeaderMap;
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::{Role, UpsertUser, User};
use crate::session::{SessionError, SessionManager};
use crate::store::{ContentStore, StoreError};

#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn ContentStore>,
    sessions: SessionManager,
    owner_open_id: Option<String>,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn ContentStore>,
        sessions: SessionManager,
        owner_open_id: Option<String>,
    ) -> Self {
        Self {
            store,
            sessions,
            owner_open_id,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn is_owner(&self, open_id: &str) -> bool {
        self.owner_open_id.as_deref() == Some(open_id)
    }

    /// Role a fresh account gets.
    pub fn role_for(&self, open_id: &str) -> Role {
        if self.is_owner(open_id) {
            Role::Admin
        } else {
            Role::User
        }
    }

    /// Resolve the caller behind a request. `None` means anonymous; an
    /// unreachable store also yields anonymous.
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<User> {
        let token = self.sessions.token_from_headers(headers)?;

        let claims = match self.sessions.verify(&token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring invalid session cookie");
                return None;
            }
        };

        match self.store.find_user_by_open_id(&claims.sub).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(open_id = %claims.sub, error = %e, "could not resolve session user");
                None
            }
        }
    }

    /// Record a successful external login and mint its session token.
    pub async fn complete_login(&self, assertion: UpsertUser) -> Result<(User, String), LoginError> {
        // An explicit role wins; otherwise only the owner is (re)promoted.
        let role_override = assertion
            .role
            .or_else(|| self.is_owner(&assertion.open_id).then_some(Role::Admin));
        let insert_role = role_override.unwrap_or_else(|| self.role_for(&assertion.open_id));

        let user = self
            .store
            .upsert_user(&assertion, insert_role, role_override)
            .await?;

        let token = self.sessions.issue(&user.open_id, user.name.as_deref())?;

        tracing::info!(open_id = %user.open_id, role = %user.role, "user signed in");
        Ok((user, token))
    }

    /// Entry point for the OAuth callback handler: record the login and
    /// return the `Set-Cookie` value that starts the session.
    pub async fn sign_in(&self, assertion: UpsertUser) -> Result<(User, String), LoginError> {
        let (user, token) = self.complete_login(assertion).await?;
        Ok((user, self.sessions.session_cookie(&token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::store::MemoryContentStore;
    use axum::http::{header, HeaderValue};

    fn resolver(store: Arc<MemoryContentStore>) -> IdentityResolver {
        IdentityResolver::new(
            store,
            SessionManager::new(SessionConfig::default()),
            Some("owner-oid".to_string()),
        )
    }

    fn cookie_headers(resolver: &IdentityResolver, token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{}={}", resolver.sessions().cookie_name(), token))
                .unwrap(),
        );
        headers
    }

    fn assertion(open_id: &str, name: &str) -> UpsertUser {
        UpsertUser {
            open_id: open_id.to_string(),
            name: Some(name.to_string()),
            email: Some(format!("{}@example.com", open_id)),
            login_method: Some("oauth".to_string()),
            role: None,
        }
    }

    #[tokio::test]
    async fn test_owner_becomes_admin_others_user() {
        let resolver = resolver(Arc::new(MemoryContentStore::new()));
        let (owner, _) = resolver
            .complete_login(assertion("owner-oid", "Owner"))
            .await
            .unwrap();
        let (member, _) = resolver
            .complete_login(assertion("member-oid", "Member"))
            .await
            .unwrap();
        assert_eq!(owner.role, Role::Admin);
        assert_eq!(member.role, Role::User);
    }

    #[tokio::test]
    async fn test_second_login_merges_into_one_row() {
        let store = Arc::new(MemoryContentStore::new());
        let resolver = resolver(store.clone());
        let (first, _) = resolver
            .complete_login(assertion("member-oid", "First Name"))
            .await
            .unwrap();
        let (second, _) = resolver
            .complete_login(UpsertUser {
                open_id: "member-oid".to_string(),
                name: Some("Second Name".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(store.counts().await.users, 1);
        assert_eq!(first.id, second.id);
        assert_eq!(second.name.as_deref(), Some("Second Name"));
        assert_eq!(second.email.as_deref(), Some("member-oid@example.com"));
        assert_eq!(second.role, Role::User);
    }

    #[tokio::test]
    async fn test_explicit_role_is_applied_on_update() {
        let store = Arc::new(MemoryContentStore::new());
        let resolver = resolver(store.clone());
        resolver
            .complete_login(assertion("member-oid", "Member"))
            .await
            .unwrap();
        let (promoted, _) = resolver
            .complete_login(UpsertUser {
                open_id: "member-oid".to_string(),
                role: Some(Role::Admin),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_resolve_session_cookie() {
        let resolver = resolver(Arc::new(MemoryContentStore::new()));
        let (user, token) = resolver
            .complete_login(assertion("member-oid", "Member"))
            .await
            .unwrap();

        let resolved = resolver.resolve(&cookie_headers(&resolver, &token)).await;
        assert_eq!(resolved.map(|u| u.id), Some(user.id));

        assert!(resolver.resolve(&HeaderMap::new()).await.is_none());
        assert!(resolver
            .resolve(&cookie_headers(&resolver, "garbage"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_valid_token_for_unknown_user_is_anonymous() {
        let resolver = resolver(Arc::new(MemoryContentStore::new()));
        let token = resolver.sessions().issue("ghost", None).unwrap();
        assert!(resolver
            .resolve(&cookie_headers(&resolver, &token))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_logins_create_one_row() {
        let store = Arc::new(MemoryContentStore::new());
        let resolver = resolver(store.clone());

        let logins = (0..16).map(|i| {
            let resolver = resolver.clone();
            async move {
                resolver
                    .complete_login(assertion("member-oid", &format!("Name {}", i)))
                    .await
            }
        });
        let results = futures_util::future::join_all(logins).await;

        let ids: Vec<_> = results.into_iter().map(|r| r.unwrap().0.id).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(store.counts().await.users, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins_on_worker_threads_create_one_row() {
        let store = Arc::new(MemoryContentStore::new());
        let resolver = resolver(store.clone());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move {
                    resolver
                        .complete_login(assertion("owner-oid", "Owner"))
                        .await
                })
            })
            .collect();
        for handle in futures_util::future::join_all(handles).await {
            assert_eq!(handle.unwrap().unwrap().0.role, Role::Admin);
        }
        assert_eq!(store.counts().await.users, 1);
    }

    #[tokio::test]
    async fn test_sign_in_cookie_resolves_to_the_user() {
        let resolver = resolver(Arc::new(MemoryContentStore::new()));
        let (user, set_cookie) = resolver
            .sign_in(assertion("member-oid", "Member"))
            .await
            .unwrap();
        assert!(set_cookie.contains("HttpOnly"));

        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());
        assert_eq!(resolver.resolve(&headers).await.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_store_outage_resolves_anonymous() {
        let store = Arc::new(MemoryContentStore::new());
        let resolver = resolver(store.clone());
        let (_, token) = resolver
            .complete_login(assertion("member-oid", "Member"))
            .await
            .unwrap();

        store.set_available(false);
        assert!(resolver
            .resolve(&cookie_headers(&resolver, &token))
            .await
            .is_none());
        assert!(matches!(
            resolver.complete_login(assertion("member-oid", "x")).await,
            Err(LoginError::Store(StoreError::Unavailable))
        ));
    }
}
