//! PostgreSQL-backed contact store.
//!
//! One [`PgConn`] owns one client connection plus the only two statements
//! the worker ever runs, prepared eagerly at connect time. The connection's
//! driver future is spawned onto the runtime and lives for the life of the
//! process; there is no reconnect path, matching the pool's no-health-check
//! contract.

use switchboard_core::{Error, Result};
use tokio_postgres::{Client, NoTls, Row, Statement};

use crate::worker::store::{Contact, ContactFilter, ContactStore, NewContact};

const INSERT_CONTACT_SQL: &str = "\
    INSERT INTO contacts (external_id, phone_number) \
    VALUES ($1, $2) \
    RETURNING id, external_id, phone_number, date_created, date_updated";

// NULL filter parameters collapse to always-true so one prepared statement
// covers every filter combination. The explicit ordering keeps repeated
// listings stable.
const LIST_CONTACTS_SQL: &str = "\
    SELECT id, external_id, phone_number, date_created, date_updated \
    FROM contacts \
    WHERE ($1::text IS NULL OR external_id = $1) \
    AND ($2::text IS NULL OR phone_number = $2) \
    ORDER BY date_created, id \
    LIMIT $3 OFFSET $4";

/// One long-lived PostgreSQL connection with its statements prepared.
pub struct PgConn {
    client: Client,
    insert_contact: Statement,
    list_contacts: Statement,
}

impl PgConn {
    /// Connects, spawns the connection driver, and prepares the worker's
    /// statements.
    ///
    /// # Errors
    /// Returns [`Error::Database`] if the connection string is rejected,
    /// the server cannot be reached, or preparation fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(Error::database)?;

        // The driver future owns the socket and resolves when the
        // connection closes.
        tokio::spawn(async move {
            if let Err(_e) = connection.await {
                #[cfg(feature = "tracing")]
                tracing::warn!("PostgreSQL connection driver exited with error: {_e}");
            }
        });

        let (insert_contact, list_contacts) = futures::try_join!(
            client.prepare(INSERT_CONTACT_SQL),
            client.prepare(LIST_CONTACTS_SQL),
        )
        .map_err(Error::database)?;

        Ok(Self {
            client,
            insert_contact,
            list_contacts,
        })
    }
}

impl ContactStore for PgConn {
    async fn insert_contact(&mut self, new: &NewContact) -> Result<Contact> {
        let row = self
            .client
            .query_one(
                &self.insert_contact,
                &[&new.external_id, &new.phone_number],
            )
            .await
            .map_err(Error::database)?;
        contact_from_row(&row)
    }

    async fn list_contacts(&mut self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        let rows = self
            .client
            .query(
                &self.list_contacts,
                &[
                    &filter.external_id,
                    &filter.phone_number,
                    &filter.limit,
                    &filter.offset,
                ],
            )
            .await
            .map_err(Error::database)?;
        rows.iter().map(contact_from_row).collect()
    }
}

fn contact_from_row(row: &Row) -> Result<Contact> {
    Ok(Contact {
        id: row.try_get("id").map_err(Error::database)?,
        external_id: row.try_get("external_id").map_err(Error::database)?,
        phone_number: row.try_get("phone_number").map_err(Error::database)?,
        date_created: row.try_get("date_created").map_err(Error::database)?,
        date_updated: row.try_get("date_updated").map_err(Error::database)?,
    })
}
