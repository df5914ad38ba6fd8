//! Request handlers for the contact API.
//!
//! [`ContactService`] owns the pool and maps one [`HttpRequest`] to one
//! [`HttpResponse`]. Validation failures turn into 400 responses here and
//! never reach the loop; store failures bubble out as
//! [`Error::Database`](switchboard_core::Error::Database) for the loop to
//! report. The connection guard goes out of scope on every path, so the
//! pool is whole again by the time an answer leaves the worker.

use std::sync::Arc;
use switchboard_core::{Error, HttpRequest, HttpResponse, Result};

use crate::worker::pool::ConnectionPool;
use crate::worker::store::{ContactFilter, ContactStore, MAX_LIST_LIMIT, NewContact};

/// Error body for a failed create, matching what API clients already parse.
const REQUIRED_FIELDS_MESSAGE: &str = "external_id and phone_number are required";

/// Handler dispatch over a shared connection pool.
pub struct ContactService<C> {
    pool: Arc<ConnectionPool<C>>,
}

impl<C> Clone for ContactService<C> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<C: ContactStore> ContactService<C> {
    pub fn new(pool: Arc<ConnectionPool<C>>) -> Self {
        Self { pool }
    }

    /// Maps one request to one response.
    ///
    /// # Errors
    /// Returns [`Error::Database`](switchboard_core::Error::Database) when
    /// the store fails; the caller decides whether that ends the loop.
    /// Invalid input does not error: it is already a 400 response by the
    /// time this returns.
    pub async fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let result = match (request.method.as_str(), request.path()) {
            ("GET", "/ping") => Ok(HttpResponse::text(200, "pong")),
            ("POST", "/contacts") => self.create_contact(request).await,
            ("GET", "/contacts") => self.list_contacts(request).await,
            _ => Ok(HttpResponse::text(404, "Not Found")),
        };

        match result {
            Err(Error::InvalidRequest { reason }) => {
                HttpResponse::json(400, &serde_json::json!({ "error": reason }))
            }
            other => other,
        }
    }

    async fn create_contact(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let new = parse_new_contact(request)?;
        let mut conn = self.pool.acquire().await;
        let contact = conn.insert_contact(&new).await?;
        HttpResponse::json(201, &contact)
    }

    async fn list_contacts(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let filter = parse_filter(request)?;
        let mut conn = self.pool.acquire().await;
        let contacts = conn.list_contacts(&filter).await?;
        HttpResponse::json(200, &contacts)
    }
}

fn parse_new_contact(request: &HttpRequest) -> Result<NewContact> {
    let raw = request.body()?;
    let body: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|_| Error::invalid_request(REQUIRED_FIELDS_MESSAGE))?;

    match (
        field_as_string(&body, "external_id"),
        field_as_string(&body, "phone_number"),
    ) {
        (Some(external_id), Some(phone_number)) => Ok(NewContact {
            external_id,
            phone_number,
        }),
        _ => Err(Error::invalid_request(REQUIRED_FIELDS_MESSAGE)),
    }
}

/// Reads a field as an opaque string, accepting JSON numbers from clients
/// that send identifiers unquoted. Absent and empty values are both `None`.
fn field_as_string(body: &serde_json::Value, key: &str) -> Option<String> {
    match body.get(key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_filter(request: &HttpRequest) -> Result<ContactFilter> {
    let mut filter = ContactFilter::default();
    for (key, value) in request.query_pairs() {
        match key.as_str() {
            "external_id" => filter.external_id = Some(value),
            "phone_number" => filter.phone_number = Some(value),
            "limit" => {
                let limit: i64 = value
                    .parse()
                    .map_err(|_| Error::invalid_request("limit must be an integer"))?;
                filter.limit = limit.clamp(0, MAX_LIST_LIMIT);
            }
            "offset" => {
                let offset: i64 = value
                    .parse()
                    .map_err(|_| Error::invalid_request("offset must be an integer"))?;
                filter.offset = offset.max(0);
            }
            // Unknown parameters are ignored rather than rejected.
            _ => {}
        }
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::store::testing::{MemoryConn, MemoryTable};
    use std::convert::Infallible;

    async fn service_over(table: &MemoryTable, capacity: usize) -> ContactService<MemoryConn> {
        let pool = ConnectionPool::initialize(capacity, || {
            let conn = table.connection();
            async move { Ok::<_, Infallible>(conn) }
        })
        .await
        .expect("pool initializes");
        ContactService::new(pool)
    }

    fn post_contact(body: &serde_json::Value) -> HttpRequest {
        HttpRequest::new("POST", "/contacts").with_body(body.to_string().as_bytes())
    }

    fn body_json(response: &HttpResponse) -> serde_json::Value {
        serde_json::from_slice(&response.body().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let table = MemoryTable::new();
        let service = service_over(&table, 1).await;

        let response = service
            .dispatch(&HttpRequest::new("GET", "/ping"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body().unwrap(), b"pong");
    }

    #[tokio::test]
    async fn unknown_routes_get_404() {
        let table = MemoryTable::new();
        let service = service_over(&table, 1).await;

        for request in [
            HttpRequest::new("GET", "/missing"),
            HttpRequest::new("DELETE", "/contacts"),
            HttpRequest::new("POST", "/ping"),
        ] {
            let response = service.dispatch(&request).await.unwrap();
            assert_eq!(response.status, 404);
        }
    }

    #[tokio::test]
    async fn create_returns_the_stored_record() {
        let table = MemoryTable::new();
        let service = service_over(&table, 1).await;

        let request = post_contact(&serde_json::json!({
            "external_id": "abc",
            "phone_number": "+15551234567"
        }));
        let response = service.dispatch(&request).await.unwrap();
        assert_eq!(response.status, 201);

        let body = body_json(&response);
        assert_eq!(body["external_id"], "abc");
        assert_eq!(body["phone_number"], "+15551234567");
        assert!(body["id"].is_string());
        assert!(body["date_created"].is_string());
        assert!(body["date_updated"].is_string());
    }

    #[tokio::test]
    async fn create_accepts_numeric_identifiers() {
        let table = MemoryTable::new();
        let service = service_over(&table, 1).await;

        let request = post_contact(&serde_json::json!({
            "external_id": 12345,
            "phone_number": "+15551234567"
        }));
        let response = service.dispatch(&request).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(body_json(&response)["external_id"], "12345");
    }

    #[tokio::test]
    async fn create_rejects_missing_or_empty_fields() {
        let table = MemoryTable::new();
        let service = service_over(&table, 1).await;

        for body in [
            serde_json::json!({}),
            serde_json::json!({ "external_id": "abc" }),
            serde_json::json!({ "external_id": "", "phone_number": "+15551234567" }),
            serde_json::json!({ "external_id": "abc", "phone_number": "" }),
            serde_json::json!({ "external_id": null, "phone_number": "+15551234567" }),
        ] {
            let response = service.dispatch(&post_contact(&body)).await.unwrap();
            assert_eq!(response.status, 400);
            assert_eq!(body_json(&response)["error"], REQUIRED_FIELDS_MESSAGE);
        }
        assert_eq!(table.row_count(), 0);
    }

    #[tokio::test]
    async fn create_rejects_unparseable_bodies() {
        let table = MemoryTable::new();
        let service = service_over(&table, 1).await;

        let request = HttpRequest::new("POST", "/contacts").with_body(b"not json");
        let response = service.dispatch(&request).await.unwrap();
        assert_eq!(response.status, 400);
        assert_eq!(table.row_count(), 0);
    }

    #[tokio::test]
    async fn list_filters_by_equality() {
        let table = MemoryTable::new();
        let service = service_over(&table, 1).await;

        for (external_id, phone_number) in [
            ("a", "+15550000001"),
            ("b", "+15550000002"),
            ("a", "+15550000003"),
        ] {
            let request = post_contact(&serde_json::json!({
                "external_id": external_id,
                "phone_number": phone_number
            }));
            assert_eq!(service.dispatch(&request).await.unwrap().status, 201);
        }

        let response = service
            .dispatch(&HttpRequest::new("GET", "/contacts?external_id=a"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        let listed = body_json(&response);
        assert_eq!(listed.as_array().unwrap().len(), 2);

        let response = service
            .dispatch(&HttpRequest::new(
                "GET",
                "/contacts?external_id=a&phone_number=%2B15550000003",
            ))
            .await
            .unwrap();
        let listed = body_json(&response);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["phone_number"], "+15550000003");
    }

    #[tokio::test]
    async fn list_limit_zero_is_an_empty_array() {
        let table = MemoryTable::new();
        let service = service_over(&table, 1).await;

        let request = post_contact(&serde_json::json!({
            "external_id": "abc",
            "phone_number": "+15551234567"
        }));
        service.dispatch(&request).await.unwrap();

        let response = service
            .dispatch(&HttpRequest::new("GET", "/contacts?limit=0"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(body_json(&response), serde_json::json!([]));
    }

    #[tokio::test]
    async fn list_rejects_non_numeric_paging() {
        let table = MemoryTable::new();
        let service = service_over(&table, 1).await;

        for target in ["/contacts?limit=abc", "/contacts?offset=1.5"] {
            let response = service
                .dispatch(&HttpRequest::new("GET", target))
                .await
                .unwrap();
            assert_eq!(response.status, 400);
        }
    }

    #[tokio::test]
    async fn store_failure_bubbles_and_releases_the_connection() {
        let table = MemoryTable::new();
        let service = service_over(&table, 2).await;

        table.fail_next();
        let request = post_contact(&serde_json::json!({
            "external_id": "abc",
            "phone_number": "+15551234567"
        }));
        let result = service.dispatch(&request).await;
        assert!(matches!(result, Err(Error::Database { .. })));

        // The guard released on the error path; nothing leaked.
        assert_eq!(service.pool.idle_count(), 2);

        let response = service.dispatch(&request).await.unwrap();
        assert_eq!(response.status, 201);
    }

    #[test]
    fn filter_parsing_applies_defaults_and_clamps() {
        let bare = parse_filter(&HttpRequest::new("GET", "/contacts")).unwrap();
        assert_eq!(bare, ContactFilter::default());

        let clamped =
            parse_filter(&HttpRequest::new("GET", "/contacts?limit=999999")).unwrap();
        assert_eq!(clamped.limit, MAX_LIST_LIMIT);

        let negative =
            parse_filter(&HttpRequest::new("GET", "/contacts?limit=-5&offset=-3")).unwrap();
        assert_eq!(negative.limit, 0);
        assert_eq!(negative.offset, 0);

        let ignored =
            parse_filter(&HttpRequest::new("GET", "/contacts?sort=asc&limit=7")).unwrap();
        assert_eq!(ignored.limit, 7);
        assert_eq!(ignored.external_id, None);
    }
}
