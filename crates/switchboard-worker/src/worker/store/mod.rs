//! Contact records and the storage abstraction over them.
//!
//! The worker persists exactly one entity. [`ContactStore`] is the seam
//! between the request handlers and PostgreSQL: production connections
//! ([`postgres::PgConn`]) implement it against prepared statements, and the
//! tests implement it in memory so the request loop can be exercised end to
//! end without a database.

pub mod postgres;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchboard_core::Result;
use uuid::Uuid;

/// Hard ceiling on the number of records one listing may return. Also the
/// default when the client does not ask for less.
pub const MAX_LIST_LIMIT: i64 = 10_000;

/// One stored contact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Store-generated identifier.
    pub id: Uuid,
    /// Caller-supplied identifier, treated as an opaque string.
    pub external_id: String,
    pub phone_number: String,
    /// Set by the store when the row is inserted.
    pub date_created: DateTime<Utc>,
    /// Set by the store when the row is inserted.
    pub date_updated: DateTime<Utc>,
}

/// A validated request to create a contact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewContact {
    pub external_id: String,
    pub phone_number: String,
}

/// Equality filters and paging for a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactFilter {
    pub external_id: Option<String>,
    pub phone_number: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ContactFilter {
    fn default() -> Self {
        Self {
            external_id: None,
            phone_number: None,
            limit: MAX_LIST_LIMIT,
            offset: 0,
        }
    }
}

/// Storage operations the request handlers depend on.
///
/// Methods take `&mut self` because a connection serves one request at a
/// time; the pool guarantees exclusive access for the lifetime of a
/// checkout.
pub trait ContactStore {
    /// Inserts one contact and returns the stored record.
    async fn insert_contact(&mut self, new: &NewContact) -> Result<Contact>;

    /// Lists contacts matching the filter, oldest first.
    async fn list_contacts(&mut self, filter: &ContactFilter) -> Result<Vec<Contact>>;
}
