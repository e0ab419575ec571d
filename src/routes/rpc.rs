/**
 * RPC Routes
 * HTTP transport for the procedure router
 */
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rpc::{ProcedureError, Reply, Transport};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RpcQuery {
    pub input: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResultBody {
    data: Value,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    result: ResultBody,
}

fn parse_json(raw: &[u8]) -> Result<Value, ProcedureError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(raw).map_err(|e| ProcedureError::InvalidInput {
        field: None,
        message: format!("malformed JSON: {}", e),
    })
}

fn into_response(reply: Reply) -> Response {
    let mut response = (
        StatusCode::OK,
        Json(SuccessResponse {
            result: ResultBody { data: reply.data },
        }),
    )
        .into_response();

    for cookie in reply.set_cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "dropping unencodable cookie"),
        }
    }

    response
}

async fn dispatch(
    state: &AppState,
    name: &str,
    transport: Transport,
    input: Result<Value, ProcedureError>,
    headers: &HeaderMap,
) -> Response {
    let result = match input {
        Ok(input) => state.rpc.call(name, transport, input, headers).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(reply) => into_response(reply),
        Err(e) => {
            tracing::debug!(procedure = %name, code = e.code(), "procedure call failed");
            e.into_response()
        }
    }
}

/// GET /api/rpc/{name}?input=<json>
pub async fn call_query(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<RpcQuery>,
    headers: HeaderMap,
) -> Response {
    let input = match query.input.as_deref() {
        Some(raw) => parse_json(raw.as_bytes()),
        None => Ok(Value::Null),
    };
    dispatch(&state, &name, Transport::Get, input, &headers).await
}

/// POST /api/rpc/{name}
pub async fn call_mutation(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let input = parse_json(&body);
    dispatch(&state, &name, Transport::Post, input, &headers).await
}
