//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity. Every write
//! bumps the global revision and appends to the activity log in the same
//! transaction as the change itself.

use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::models::{
    ActivityEntry, ActivityFilter, CreateEventRequest, CreateQuoteRequest, Event, LineItem, Quote,
    QuoteStatus, RevisionInfo, UpdateEventRequest,
};
use crate::workflow::{self, ActorRole, QuoteCommand, QuoteTotals};

const QUOTE_COLUMNS: &str = "id, event_id, status, vat_rate, line_items, modification_reason, \
                             sent_at, accepted_at, created_at, updated_at, version";

const EVENT_COLUMNS: &str =
    "id, name, client_name, location, description, start_date, end_date, created_at, updated_at, version";

/// Maximum number of activity entries returned by one listing.
const MAX_ACTIVITY_LIMIT: i64 = 500;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

/// An activity line about to be written.
struct NewActivity<'a> {
    entity_type: &'a str,
    entity_id: &'a str,
    action: &'a str,
    actor: ActorRole,
    detail: Option<String>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Start a write transaction holding the SQLite write lock from its first
    /// statement. Concurrent writers wait on `busy_timeout`, then re-read.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    // ==================== EVENT OPERATIONS ====================

    /// List all events.
    pub async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM events ORDER BY start_date, name",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(event_from_row).collect())
    }

    /// Get an event by ID.
    pub async fn get_event(&self, id: &str) -> Result<Option<Event>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(event_from_row))
    }

    /// Create a new event.
    pub async fn create_event(
        &self,
        request: &CreateEventRequest,
        actor: ActorRole,
    ) -> Result<Event, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.begin_write().await?;

        sqlx::query(
            "INSERT INTO events (id, name, client_name, location, description, start_date, end_date, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)"
        )
        .bind(&id)
        .bind(request.name.trim())
        .bind(&request.client_name)
        .bind(&request.location)
        .bind(&request.description)
        .bind(&request.start_date)
        .bind(&request.end_date)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        record_activity(
            &mut tx,
            NewActivity {
                entity_type: "event",
                entity_id: &id,
                action: "create",
                actor,
                detail: Some(request.name.trim().to_string()),
            },
        )
        .await?;
        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(Event {
            id,
            name: request.name.trim().to_string(),
            client_name: request.client_name.clone(),
            location: request.location.clone(),
            description: request.description.clone(),
            start_date: request.start_date.clone(),
            end_date: request.end_date.clone(),
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Update an event with optimistic concurrency control.
    pub async fn update_event(
        &self,
        id: &str,
        request: &UpdateEventRequest,
        actor: ActorRole,
    ) -> Result<Event, AppError> {
        let existing = self
            .get_event(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))?;

        check_expected_version(request.expected_version, existing.version)?;

        let now = Utc::now().to_rfc3339();
        let new_version = existing.version + 1;

        let name = request
            .name
            .as_ref()
            .map(|n| n.trim().to_string())
            .unwrap_or(existing.name.clone());
        if name.is_empty() {
            return Err(AppError::Validation("Event name is required".to_string()));
        }
        let client_name = request.client_name.clone().or(existing.client_name.clone());
        let location = request.location.clone().or(existing.location.clone());
        let description = request.description.clone().or(existing.description.clone());
        let start_date = request.start_date.clone().or(existing.start_date.clone());
        let end_date = request.end_date.clone().or(existing.end_date.clone());

        let mut tx = self.begin_write().await?;

        // Conditional UPDATE with version check prevents lost updates
        let result = sqlx::query(
            "UPDATE events SET name = ?, client_name = ?, location = ?, description = ?, start_date = ?, end_date = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(&name)
        .bind(&client_name)
        .bind(&location)
        .bind(&description)
        .bind(&start_date)
        .bind(&end_date)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let current = current_version(&mut tx, "events", id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.unwrap_or(0),
            });
        }

        record_activity(
            &mut tx,
            NewActivity {
                entity_type: "event",
                entity_id: id,
                action: "update",
                actor,
                detail: None,
            },
        )
        .await?;
        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(Event {
            id: id.to_string(),
            name,
            client_name,
            location,
            description,
            start_date,
            end_date,
            created_at: existing.created_at,
            updated_at: now,
            version: new_version,
        })
    }

    /// Delete an event. Events that still have quotes are kept.
    pub async fn delete_event(&self, id: &str, actor: ActorRole) -> Result<(), AppError> {
        let mut tx = self.begin_write().await?;

        let quote_count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM quotes WHERE event_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
            .get("n");
        if quote_count > 0 {
            return Err(AppError::InUse(format!(
                "Event {} still has {} quote(s)",
                id, quote_count
            )));
        }

        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Event {} not found", id)));
        }

        record_activity(
            &mut tx,
            NewActivity {
                entity_type: "event",
                entity_id: id,
                action: "delete",
                actor,
                detail: None,
            },
        )
        .await?;
        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ==================== QUOTE OPERATIONS ====================

    /// List quotes, optionally restricted to one event and/or one status.
    pub async fn list_quotes(
        &self,
        event_id: Option<&str>,
        status: Option<QuoteStatus>,
    ) -> Result<Vec<Quote>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM quotes WHERE (?1 IS NULL OR event_id = ?1) AND (?2 IS NULL OR status = ?2) ORDER BY created_at",
            QUOTE_COLUMNS
        ))
        .bind(event_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(quote_from_row).collect()
    }

    /// Get a quote by ID, with totals recomputed from its line items.
    pub async fn get_quote(&self, id: &str) -> Result<Option<Quote>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM quotes WHERE id = ?", QUOTE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(quote_from_row).transpose()
    }

    /// Create a new draft quote for an existing event.
    pub async fn create_quote(
        &self,
        request: &CreateQuoteRequest,
        default_vat_rate: Decimal,
        actor: ActorRole,
    ) -> Result<Quote, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let quote = workflow::new_draft(
            &id,
            &request.event_id,
            request.vat_rate.unwrap_or(default_vat_rate),
            request.line_items.clone(),
            actor,
            &now,
        )?;

        let mut tx = self.begin_write().await?;

        let event_exists = sqlx::query("SELECT 1 FROM events WHERE id = ?")
            .bind(&quote.event_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !event_exists {
            return Err(AppError::Validation(format!(
                "Event {} does not exist",
                quote.event_id
            )));
        }

        sqlx::query(&format!(
            "INSERT INTO quotes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
            QUOTE_COLUMNS
        ))
        .bind(&quote.id)
        .bind(&quote.event_id)
        .bind(quote.status.as_str())
        .bind(quote.vat_rate.to_string())
        .bind(serde_json::to_string(&quote.line_items)?)
        .bind(&quote.modification_reason)
        .bind(&quote.sent_at)
        .bind(&quote.accepted_at)
        .bind(&quote.created_at)
        .bind(&quote.updated_at)
        .execute(&mut *tx)
        .await?;

        record_activity(
            &mut tx,
            NewActivity {
                entity_type: "quote",
                entity_id: &quote.id,
                action: "create",
                actor,
                detail: Some(format!("event {}", quote.event_id)),
            },
        )
        .await?;
        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(quote)
    }

    /// Run a workflow command against a stored quote.
    ///
    /// The quote is read, checked and written inside one transaction. The
    /// UPDATE is conditioned on the version that was read, so of two racing
    /// commands only one lands and the other gets a `Conflict`.
    pub async fn apply_quote_command(
        &self,
        id: &str,
        command: QuoteCommand,
        actor: ActorRole,
        expected_version: Option<i64>,
    ) -> Result<Quote, AppError> {
        let mut tx = self.begin_write().await?;

        let existing = fetch_quote(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quote {} not found", id)))?;

        check_expected_version(expected_version, existing.version)?;

        let action = command.action();
        let now = Utc::now().to_rfc3339();
        let mut updated = workflow::apply(&existing, command, actor, &now)?;
        updated.version = existing.version + 1;

        let result = sqlx::query(
            "UPDATE quotes SET status = ?, vat_rate = ?, line_items = ?, modification_reason = ?, sent_at = ?, accepted_at = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(updated.status.as_str())
        .bind(updated.vat_rate.to_string())
        .bind(serde_json::to_string(&updated.line_items)?)
        .bind(&updated.modification_reason)
        .bind(&updated.sent_at)
        .bind(&updated.accepted_at)
        .bind(&updated.updated_at)
        .bind(updated.version)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let current = current_version(&mut tx, "quotes", id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.unwrap_or(0),
            });
        }

        let detail = if existing.status == updated.status {
            None
        } else {
            Some(format!("{} -> {}", existing.status, updated.status))
        };
        record_activity(
            &mut tx,
            NewActivity {
                entity_type: "quote",
                entity_id: id,
                action: action.as_str(),
                actor,
                detail,
            },
        )
        .await?;
        bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            quote_id = %id,
            action = %action,
            actor = %actor,
            status = %updated.status,
            "Quote updated"
        );

        Ok(updated)
    }

    /// Delete a quote if its status still allows it.
    pub async fn delete_quote(
        &self,
        id: &str,
        actor: ActorRole,
        expected_version: Option<i64>,
    ) -> Result<(), AppError> {
        let mut tx = self.begin_write().await?;

        let existing = fetch_quote(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quote {} not found", id)))?;

        check_expected_version(expected_version, existing.version)?;
        workflow::authorize_delete(&existing, actor)?;

        let result = sqlx::query("DELETE FROM quotes WHERE id = ? AND version = ?")
            .bind(id)
            .bind(existing.version)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            let current = current_version(&mut tx, "quotes", id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.unwrap_or(0),
            });
        }

        record_activity(
            &mut tx,
            NewActivity {
                entity_type: "quote",
                entity_id: id,
                action: "delete",
                actor,
                detail: Some(format!("was {}", existing.status)),
            },
        )
        .await?;
        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ==================== ACTIVITY LOG ====================

    /// List activity entries, newest first.
    pub async fn list_activity(&self, filter: &ActivityFilter) -> Result<Vec<ActivityEntry>, AppError> {
        let limit = filter.limit.clamp(1, MAX_ACTIVITY_LIMIT);

        let rows = sqlx::query(
            "SELECT id, entity_type, entity_id, action, actor, detail, created_at FROM activity_log WHERE (?1 IS NULL OR entity_type = ?1) AND (?2 IS NULL OR entity_id = ?2) ORDER BY id DESC LIMIT ?3"
        )
        .bind(&filter.entity_type)
        .bind(&filter.entity_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ActivityEntry {
                id: row.get("id"),
                entity_type: row.get("entity_type"),
                entity_id: row.get("entity_id"),
                action: row.get("action"),
                actor: row.get("actor"),
                detail: row.get("detail"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

// Helpers shared by the write paths

fn check_expected_version(expected: Option<i64>, current: i64) -> Result<(), AppError> {
    match expected {
        Some(expected) if expected != current => Err(AppError::Conflict {
            message: format!(
                "Version mismatch: expected {}, current {}",
                expected, current
            ),
            current_version: current,
        }),
        _ => Ok(()),
    }
}

async fn fetch_quote(conn: &mut SqliteConnection, id: &str) -> Result<Option<Quote>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM quotes WHERE id = ?", QUOTE_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(quote_from_row).transpose()
}

async fn current_version(
    conn: &mut SqliteConnection,
    table: &str,
    id: &str,
) -> Result<Option<i64>, AppError> {
    let row = sqlx::query(&format!("SELECT version FROM {} WHERE id = ?", table))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| r.get("version")))
}

async fn record_activity(
    conn: &mut SqliteConnection,
    entry: NewActivity<'_>,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO activity_log (entity_type, entity_id, action, actor, detail, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(entry.action)
    .bind(entry.actor.as_str())
    .bind(&entry.detail)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn bump_revision(conn: &mut SqliteConnection) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(&now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// Helper functions for row conversion

fn event_from_row(row: &sqlx::sqlite::SqliteRow) -> Event {
    Event {
        id: row.get("id"),
        name: row.get("name"),
        client_name: row.get("client_name"),
        location: row.get("location"),
        description: row.get("description"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn quote_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Quote, AppError> {
    let id: String = row.get("id");
    let status_str: String = row.get("status");
    let vat_rate_str: String = row.get("vat_rate");
    let line_items_str: String = row.get("line_items");

    let status = QuoteStatus::parse(&status_str).ok_or_else(|| {
        AppError::Internal(format!("Quote {} has unknown status {}", id, status_str))
    })?;
    let vat_rate = Decimal::from_str(&vat_rate_str).map_err(|e| {
        AppError::Internal(format!("Quote {} has malformed VAT rate: {}", id, e))
    })?;
    let line_items: Vec<LineItem> = serde_json::from_str(&line_items_str).map_err(|e| {
        AppError::Internal(format!("Quote {} has malformed line items: {}", id, e))
    })?;

    let totals = QuoteTotals::compute(&line_items, vat_rate);

    Ok(Quote {
        id,
        event_id: row.get("event_id"),
        status,
        vat_rate,
        line_items,
        totals,
        modification_reason: row.get("modification_reason"),
        sent_at: row.get("sent_at"),
        accepted_at: row.get("accepted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    async fn event(repo: &Repository) -> Event {
        repo.create_event(
            &CreateEventRequest {
                name: "Séminaire annuel".to_string(),
                client_name: Some("ACME".to_string()),
                location: Some("Lyon".to_string()),
                description: None,
                start_date: Some("2026-06-01".to_string()),
                end_date: None,
            },
            ActorRole::Staff,
        )
        .await
        .unwrap()
    }

    fn salle() -> Vec<LineItem> {
        vec![LineItem::new("Salle", Decimal::from(500))]
    }

    #[tokio::test]
    async fn test_quote_roundtrip_recomputes_totals() {
        let (repo, _dir) = repo().await;
        let event = event(&repo).await;

        let created = repo
            .create_quote(
                &CreateQuoteRequest {
                    event_id: event.id.clone(),
                    vat_rate: None,
                    line_items: salle(),
                },
                Decimal::from(20),
                ActorRole::Staff,
            )
            .await
            .unwrap();
        assert_eq!(created.status, QuoteStatus::Draft);
        assert_eq!(created.version, 1);

        let loaded = repo.get_quote(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.line_items, salle());
        assert_eq!(workflow::format_money(loaded.totals.total_incl_vat), "600.00");
    }

    #[tokio::test]
    async fn test_command_bumps_version_and_logs() {
        let (repo, _dir) = repo().await;
        let event = event(&repo).await;
        let quote = repo
            .create_quote(
                &CreateQuoteRequest {
                    event_id: event.id.clone(),
                    vat_rate: Some(Decimal::from(20)),
                    line_items: salle(),
                },
                Decimal::from(20),
                ActorRole::Staff,
            )
            .await
            .unwrap();
        let revision_before = repo.get_revision_id().await.unwrap();

        let sent = repo
            .apply_quote_command(&quote.id, QuoteCommand::Send, ActorRole::Staff, Some(1))
            .await
            .unwrap();
        assert_eq!(sent.status, QuoteStatus::Sent);
        assert_eq!(sent.version, 2);
        assert_eq!(repo.get_revision_id().await.unwrap(), revision_before + 1);

        let log = repo
            .list_activity(&ActivityFilter {
                entity_type: Some("quote".to_string()),
                entity_id: Some(quote.id.clone()),
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].action, "send");
        assert_eq!(log[0].detail.as_deref(), Some("draft -> sent"));
        assert_eq!(log[1].action, "create");
    }

    #[tokio::test]
    async fn test_stale_version_is_conflict() {
        let (repo, _dir) = repo().await;
        let event = event(&repo).await;
        let quote = repo
            .create_quote(
                &CreateQuoteRequest {
                    event_id: event.id,
                    vat_rate: None,
                    line_items: salle(),
                },
                Decimal::from(20),
                ActorRole::Staff,
            )
            .await
            .unwrap();

        let err = repo
            .apply_quote_command(&quote.id, QuoteCommand::Send, ActorRole::Staff, Some(7))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { current_version: 1, .. }));

        let unchanged = repo.get_quote(&quote.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, QuoteStatus::Draft);
    }

    #[tokio::test]
    async fn test_racing_client_responses_have_one_winner() {
        let (repo, _dir) = repo().await;
        let event = event(&repo).await;

        for _ in 0..20 {
            let quote = repo
                .create_quote(
                    &CreateQuoteRequest {
                        event_id: event.id.clone(),
                        vat_rate: None,
                        line_items: salle(),
                    },
                    Decimal::from(20),
                    ActorRole::Staff,
                )
                .await
                .unwrap();
            repo.apply_quote_command(&quote.id, QuoteCommand::Send, ActorRole::Staff, None)
                .await
                .unwrap();

            let accept = {
                let repo = repo.clone();
                let id = quote.id.clone();
                tokio::spawn(async move {
                    repo.apply_quote_command(&id, QuoteCommand::Accept, ActorRole::Client, Some(2))
                        .await
                })
            };
            let modify = {
                let repo = repo.clone();
                let id = quote.id.clone();
                tokio::spawn(async move {
                    repo.apply_quote_command(
                        &id,
                        QuoteCommand::RequestModification {
                            motif: "Ajouter traiteur".to_string(),
                        },
                        ActorRole::Client,
                        Some(2),
                    )
                    .await
                })
            };

            let results = [accept.await.unwrap(), modify.await.unwrap()];
            let winners = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1);
            for result in &results {
                if let Err(err) = result {
                    assert!(
                        matches!(err, AppError::Conflict { current_version: 3, .. }),
                        "loser got {:?}",
                        err
                    );
                }
            }

            let stored = repo.get_quote(&quote.id).await.unwrap().unwrap();
            assert_eq!(stored.version, 3);
        }
    }

    #[tokio::test]
    async fn test_illegal_command_leaves_row_and_revision() {
        let (repo, _dir) = repo().await;
        let event = event(&repo).await;
        let quote = repo
            .create_quote(
                &CreateQuoteRequest {
                    event_id: event.id,
                    vat_rate: None,
                    line_items: salle(),
                },
                Decimal::from(20),
                ActorRole::Staff,
            )
            .await
            .unwrap();
        let revision = repo.get_revision_id().await.unwrap();

        let err = repo
            .apply_quote_command(&quote.id, QuoteCommand::Accept, ActorRole::Client, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition(_)));
        assert_eq!(repo.get_revision_id().await.unwrap(), revision);

        let stored = repo.get_quote(&quote.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QuoteStatus::Draft);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_event_with_quotes_cannot_be_deleted() {
        let (repo, _dir) = repo().await;
        let event = event(&repo).await;
        let quote = repo
            .create_quote(
                &CreateQuoteRequest {
                    event_id: event.id.clone(),
                    vat_rate: None,
                    line_items: Vec::new(),
                },
                Decimal::from(20),
                ActorRole::Staff,
            )
            .await
            .unwrap();

        let err = repo.delete_event(&event.id, ActorRole::Staff).await.unwrap_err();
        assert!(matches!(err, AppError::InUse(_)));

        repo.delete_quote(&quote.id, ActorRole::Staff, None)
            .await
            .unwrap();
        repo.delete_event(&event.id, ActorRole::Staff).await.unwrap();
        assert!(repo.get_event(&event.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quote_for_unknown_event_is_rejected() {
        let (repo, _dir) = repo().await;
        let err = repo
            .create_quote(
                &CreateQuoteRequest {
                    event_id: "missing".to_string(),
                    vat_rate: None,
                    line_items: Vec::new(),
                },
                Decimal::from(20),
                ActorRole::Staff,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_quotes_filters() {
        let (repo, _dir) = repo().await;
        let first = event(&repo).await;
        let second = event(&repo).await;
        for event_id in [&first.id, &first.id, &second.id] {
            repo.create_quote(
                &CreateQuoteRequest {
                    event_id: event_id.clone(),
                    vat_rate: None,
                    line_items: salle(),
                },
                Decimal::from(20),
                ActorRole::Staff,
            )
            .await
            .unwrap();
        }

        let all = repo.list_quotes(None, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let for_first = repo.list_quotes(Some(&first.id), None).await.unwrap();
        assert_eq!(for_first.len(), 2);

        let sent = repo
            .list_quotes(None, Some(QuoteStatus::Sent))
            .await
            .unwrap();
        assert!(sent.is_empty());
    }
}
