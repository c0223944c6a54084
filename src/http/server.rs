use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::catalog::{Catalog, SearchParams};
use crate::core::error::{Error, ErrorKind};
use crate::core::types::IndexedDoc;
use crate::http::requester;

pub fn router(catalog: Arc<Catalog>) -> Router {
    Router::new()
        .route("/core/health", get(health))
        .route("/core/stats", get(stats))
        .route("/core/search", get(search))
        .route("/core/entries/:id", get(read_entry))
        .route("/core/batchGet", post(batch_get))
        .layer(TraceLayer::new_for_http())
        .with_state(catalog)
}

/// Crate error rendered as the wire error shape
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::InvalidRequest | ErrorKind::InvalidFilter => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let mut error = json!({
            "code": self.0.kind.code(),
            "message": self.0.context,
        });
        if let Some(position) = self.0.position {
            error["details"] = json!({ "position": position });
        }
        (status, Json(json!({ "error": error }))).into_response()
    }
}

type ApiResult = std::result::Result<Json<Value>, ApiError>;

/// Projection selected by the `view` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Card,
    Full,
    Ids,
}

impl View {
    fn parse(raw: Option<&str>) -> Result<View, Error> {
        match raw {
            None | Some("card") => Ok(View::Card),
            Some("full") => Ok(View::Full),
            Some("ids") => Ok(View::Ids),
            Some(other) => Err(Error::invalid_request(format!(
                "view must be card, full, or ids (got {})",
                other
            ))),
        }
    }

    fn project(&self, doc: &IndexedDoc) -> Result<Value, Error> {
        let value = match self {
            View::Card => serde_json::to_value(&doc.card),
            View::Full => serde_json::to_value(&doc.entry),
            View::Ids => Ok(Value::String(doc.entry.id.clone())),
        };
        value.map_err(|e| Error::internal(format!("projection: {}", e)))
    }
}

const LIMIT_DEFAULT: usize = 20;

fn parse_limit(raw: Option<&str>) -> Result<usize, Error> {
    let Some(raw) = raw else {
        return Ok(LIMIT_DEFAULT);
    };
    let limit: usize = raw
        .parse()
        .map_err(|_| Error::invalid_request("limit must be an integer"))?;
    if !(1..=200).contains(&limit) {
        return Err(Error::invalid_request("limit must be between 1 and 200"));
    }
    Ok(limit)
}

async fn health(State(catalog): State<Arc<Catalog>>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "docs": catalog.doc_count(),
        "last_seq": catalog.last_seq(),
    }))
}

async fn stats(State(catalog): State<Arc<Catalog>>) -> ApiResult {
    let mut value = serde_json::to_value(catalog.stats())
        .map_err(|e| ApiError(Error::internal(format!("stats: {}", e))))?;
    value["poll_ms"] = json!(catalog.config.poll_ms);
    Ok(Json(value))
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    filter: Option<String>,
    q: Option<String>,
    limit: Option<String>,
    cursor: Option<String>,
    sort: Option<String>,
    view: Option<String>,
}

async fn search(
    State(catalog): State<Arc<Catalog>>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> ApiResult {
    let requester = requester::from_headers(&headers, catalog.config.trusted_headers);
    let limit = parse_limit(query.limit.as_deref())?;
    let view = View::parse(query.view.as_deref())?;
    let sorted = match query.sort.as_deref() {
        None | Some("updated_at_desc") => true,
        Some("none") => {
            if query.cursor.is_some() {
                return Err(ApiError(Error::invalid_request(
                    "cursor requires sort=updated_at_desc",
                )));
            }
            false
        }
        Some(other) => {
            return Err(ApiError(Error::invalid_request(format!(
                "sort must be updated_at_desc or none (got {})",
                other
            ))));
        }
    };

    let params = SearchParams {
        filter: query.filter,
        limit,
        cursor: query.cursor,
        q: query.q,
    };
    let page = catalog.search(&params, &requester)?;
    let next_cursor = if sorted {
        page.next_cursor.map(|c| c.encode()).transpose()?
    } else {
        None
    };

    let body = if view == View::Ids {
        let ids: Vec<&str> = page.hits.iter().map(|d| d.entry.id.as_str()).collect();
        json!({ "ids": ids, "next_cursor": next_cursor })
    } else {
        let items = page
            .hits
            .iter()
            .map(|doc| view.project(doc))
            .collect::<Result<Vec<_>, _>>()?;
        json!({ "items": items, "next_cursor": next_cursor })
    };
    Ok(Json(body))
}

#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    view: Option<String>,
}

async fn read_entry(
    State(catalog): State<Arc<Catalog>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ViewQuery>,
) -> ApiResult {
    let requester = requester::from_headers(&headers, catalog.config.trusted_headers);
    let view = View::parse(query.view.as_deref())?;
    match catalog.read(&id, &requester) {
        Some(doc) => Ok(Json(json!({ "item": view.project(&doc)? }))),
        None => Err(ApiError(Error::not_found("entry not found"))),
    }
}

async fn batch_get(
    State(catalog): State<Arc<Catalog>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let requester = requester::from_headers(&headers, catalog.config.trusted_headers);
    let value: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError(Error::invalid_request("body is not valid JSON")))?;
    let view = View::parse(value.get("view").and_then(|v| v.as_str()))?;
    let ids = value
        .get("ids")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ApiError(Error::invalid_request("ids must be an array")))?;
    if ids.is_empty() || ids.len() > 200 {
        return Err(ApiError(Error::invalid_request(
            "ids must contain between 1 and 200 entries",
        )));
    }
    let ids = ids
        .iter()
        .map(|v| v.as_str().map(String::from))
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| ApiError(Error::invalid_request("ids must be strings")))?;

    let result = catalog.batch_get(&ids, &requester);
    let items = result
        .items
        .iter()
        .map(|doc| view.project(doc))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(json!({ "items": items, "omitted": result.omitted })))
}
