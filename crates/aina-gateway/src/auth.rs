// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for the `/v1` API.
//!
//! Each configured token maps to one [`AuthContext`]. The middleware resolves
//! the caller and stores the context in the request extensions, where handlers
//! pick it up with `Extension<AuthContext>`.
//!
//! Tokens are read from `Authorization: Bearer <token>`. Browser WebSocket and
//! EventSource clients cannot set headers, so `?access_token=<token>` is
//! accepted as well. With no tokens configured every request is rejected
//! (fail-closed).

use std::collections::HashMap;
use std::sync::Arc;

use aina_config::model::{ApiTokenConfig, TokenRole};
use aina_core::{AuthContext, TenantId};
use serde::Deserialize;
use axum::{
    extract::{Query, Request, State},
    http::{StatusCode, Uri},
    middleware::Next,
    response::Response,
};

/// Token → caller identity, built once from `[[gateway.tokens]]`.
#[derive(Clone, Default)]
pub struct TokenTable {
    tokens: Arc<HashMap<String, AuthContext>>,
}

impl TokenTable {
    pub fn from_config(tokens: &[ApiTokenConfig]) -> Self {
        let tokens = tokens
            .iter()
            .map(|t| {
                let tenant_id = TenantId::from(t.tenant_id.as_str());
                let ctx = match t.role {
                    TokenRole::Agent => AuthContext::agent(tenant_id, t.actor_id.as_str()),
                    TokenRole::Admin => AuthContext::admin(tenant_id, t.actor_id.as_str()),
                };
                (t.token.clone(), ctx)
            })
            .collect();
        Self {
            tokens: Arc::new(tokens),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn resolve(&self, token: &str) -> Option<&AuthContext> {
        self.tokens.get(token)
    }
}

impl std::fmt::Debug for TokenTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenTable")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

#[derive(Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

/// `?access_token=`, percent-decoded.
fn query_token(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(query)| query.access_token)
}

/// Middleware that resolves the caller or rejects with 401.
pub async fn auth_middleware(
    State(tokens): State<TokenTable>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if tokens.is_empty() {
        tracing::error!("gateway has no API tokens configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = bearer_token(&request)
        .map(str::to_owned)
        .or_else(|| query_token(request.uri()));
    let ctx = token.and_then(|token| tokens.resolve(&token).cloned());

    match ctx {
        Some(ctx) => {
            tracing::debug!(
                tenant_id = %ctx.tenant_id,
                role = %ctx.role,
                path = request.uri().path(),
                "request authenticated"
            );
            request.extensions_mut().insert(ctx);
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!(path = request.uri().path(), "rejected request with missing or unknown token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
