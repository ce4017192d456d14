//! Full-text quote search backed by Tantivy.
//!
//! One document per quote: its line-item labels, the client's modification
//! motif and the name of the event it belongs to. `status` is indexed as a
//! raw token so a listing can be narrowed to e.g. quotes awaiting an answer.
//! SQLite stays the source of truth; hits only carry quote ids.

use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::models::{Quote, QuoteStatus};

const WRITER_HEAP_BYTES: usize = 30_000_000;

/// A quote paired with the name of its event, ready to be indexed.
pub struct QuoteDocument<'a> {
    pub quote: &'a Quote,
    pub event_name: &'a str,
}

/// What to look for.
#[derive(Debug, Clone, Default)]
pub struct QuoteQuery {
    /// Free text matched against labels, motif and event name. Blank matches
    /// every quote.
    pub text: String,
    pub status: Option<QuoteStatus>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct QuoteHit {
    pub quote_id: String,
    pub score: f32,
}

#[derive(Clone, Copy)]
struct QuoteFields {
    quote_id: Field,
    status: Field,
    labels: Field,
    motif: Field,
    event_name: Field,
}

impl QuoteFields {
    fn schema() -> (Schema, Self) {
        let mut builder = Schema::builder();
        let fields = Self {
            quote_id: builder.add_text_field("quote_id", STRING | STORED),
            status: builder.add_text_field("status", STRING),
            labels: builder.add_text_field("labels", TEXT),
            motif: builder.add_text_field("motif", TEXT),
            event_name: builder.add_text_field("event_name", TEXT),
        };
        (builder.build(), fields)
    }
}

pub struct QuoteIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: QuoteFields,
}

impl QuoteIndex {
    /// Open the index under `index_path`, creating it when absent.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let (schema, fields) = QuoteFields::schema();
        let index = match Index::open_in_dir(index_path) {
            Ok(existing) if existing.schema() == schema => existing,
            // A stale or foreign layout is discarded; it is rebuilt from SQLite.
            _ => {
                std::fs::remove_dir_all(index_path)
                    .and_then(|_| std::fs::create_dir_all(index_path))
                    .map_err(|e| AppError::Search(format!("Failed to reset index: {}", e)))?;
                Index::create_in_dir(index_path, schema)?
            }
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer = index.writer(WRITER_HEAP_BYTES)?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    /// Replace the whole index content.
    pub async fn rebuild(&self, documents: &[QuoteDocument<'_>]) -> Result<(), AppError> {
        let mut writer = self.writer.lock().await;
        writer.delete_all_documents()?;
        for document in documents {
            writer.add_document(self.to_tantivy(document))?;
        }
        self.commit(&mut writer)?;

        tracing::info!(quotes = documents.len(), "Quote index rebuilt");
        Ok(())
    }

    /// Insert or replace the document of one quote.
    pub async fn upsert(&self, document: &QuoteDocument<'_>) -> Result<(), AppError> {
        let mut writer = self.writer.lock().await;
        writer.delete_term(self.id_term(&document.quote.id));
        writer.add_document(self.to_tantivy(document))?;
        self.commit(&mut writer)
    }

    pub async fn remove(&self, quote_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.lock().await;
        writer.delete_term(self.id_term(quote_id));
        self.commit(&mut writer)
    }

    /// Run `query`, best matches first.
    pub fn search(&self, query: &QuoteQuery) -> Result<Vec<QuoteHit>, AppError> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let text_query: Box<dyn Query> = if query.text.trim().is_empty() {
            Box::new(AllQuery)
        } else {
            let mut parser = QueryParser::for_index(
                &self.index,
                vec![self.fields.labels, self.fields.motif, self.fields.event_name],
            );
            parser.set_field_boost(self.fields.labels, 4.0);
            parser.set_field_boost(self.fields.motif, 2.0);
            parser
                .parse_query(&query.text)
                .map_err(|e| AppError::Validation(format!("Invalid search query: {}", e)))?
        };

        let combined: Box<dyn Query> = match query.status {
            None => text_query,
            Some(status) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, text_query),
                (
                    Occur::Must,
                    Box::new(TermQuery::new(
                        Term::from_field_text(self.fields.status, status.as_str()),
                        IndexRecordOption::Basic,
                    )),
                ),
            ])),
        };

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(
            &combined,
            &TopDocs::with_limit(query.limit).and_offset(query.offset),
        )?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let stored: TantivyDocument = searcher.doc(address)?;
            if let Some(quote_id) = stored
                .get_first(self.fields.quote_id)
                .and_then(|value| value.as_str())
            {
                hits.push(QuoteHit {
                    quote_id: quote_id.to_string(),
                    score,
                });
            }
        }
        Ok(hits)
    }

    fn commit(&self, writer: &mut IndexWriter) -> Result<(), AppError> {
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn id_term(&self, quote_id: &str) -> Term {
        Term::from_field_text(self.fields.quote_id, quote_id)
    }

    fn to_tantivy(&self, document: &QuoteDocument<'_>) -> TantivyDocument {
        let quote = document.quote;
        let labels = quote
            .line_items
            .iter()
            .map(|item| item.label.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        doc!(
            self.fields.quote_id => quote.id.clone(),
            self.fields.status => quote.status.as_str().to_string(),
            self.fields.labels => labels,
            self.fields.motif => quote.modification_reason.clone().unwrap_or_default(),
            self.fields.event_name => document.event_name.to_string()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineItem;
    use crate::workflow::QuoteTotals;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn quote(id: &str, status: QuoteStatus, labels: &[&str], motif: Option<&str>) -> Quote {
        let mut quote = Quote {
            id: id.to_string(),
            event_id: "evt".to_string(),
            status,
            vat_rate: Decimal::from(20),
            line_items: labels
                .iter()
                .map(|label| LineItem::new(*label, Decimal::from(100)))
                .collect(),
            totals: QuoteTotals::default(),
            modification_reason: motif.map(str::to_string),
            sent_at: None,
            accepted_at: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            version: 1,
        };
        quote.refresh_totals();
        quote
    }

    fn text(text: &str) -> QuoteQuery {
        QuoteQuery {
            text: text.to_string(),
            limit: 10,
            ..QuoteQuery::default()
        }
    }

    fn ids(hits: &[QuoteHit]) -> Vec<&str> {
        hits.iter().map(|hit| hit.quote_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_matches_labels_motif_and_event() {
        let dir = TempDir::new().unwrap();
        let index = QuoteIndex::open(dir.path()).unwrap();

        let salle = quote("q1", QuoteStatus::Draft, &["Location salle", "Sonorisation"], None);
        let traiteur = quote(
            "q2",
            QuoteStatus::ModificationRequested,
            &["Cocktail"],
            Some("Ajouter traiteur"),
        );
        index
            .rebuild(&[
                QuoteDocument { quote: &salle, event_name: "Gala annuel" },
                QuoteDocument { quote: &traiteur, event_name: "Séminaire" },
            ])
            .await
            .unwrap();

        assert_eq!(ids(&index.search(&text("sonorisation")).unwrap()), vec!["q1"]);
        assert_eq!(ids(&index.search(&text("traiteur")).unwrap()), vec!["q2"]);
        assert_eq!(ids(&index.search(&text("gala")).unwrap()), vec!["q1"]);
    }

    #[tokio::test]
    async fn test_status_filter_and_blank_text() {
        let dir = TempDir::new().unwrap();
        let index = QuoteIndex::open(dir.path()).unwrap();

        let draft = quote("q1", QuoteStatus::Draft, &["Salle"], None);
        let sent = quote("q2", QuoteStatus::Sent, &["Salle"], None);
        index
            .rebuild(&[
                QuoteDocument { quote: &draft, event_name: "Gala" },
                QuoteDocument { quote: &sent, event_name: "Gala" },
            ])
            .await
            .unwrap();

        let sent_only = QuoteQuery {
            status: Some(QuoteStatus::Sent),
            ..text("salle")
        };
        assert_eq!(ids(&index.search(&sent_only).unwrap()), vec!["q2"]);

        assert_eq!(index.search(&text("")).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_remove_drops() {
        let dir = TempDir::new().unwrap();
        let index = QuoteIndex::open(dir.path()).unwrap();

        let mut q = quote("q1", QuoteStatus::Sent, &["Salle"], None);
        index
            .upsert(&QuoteDocument { quote: &q, event_name: "Gala" })
            .await
            .unwrap();

        q.status = QuoteStatus::ModificationRequested;
        q.modification_reason = Some("Ajouter un DJ".to_string());
        index
            .upsert(&QuoteDocument { quote: &q, event_name: "Gala" })
            .await
            .unwrap();
        assert_eq!(index.search(&text("dj")).unwrap().len(), 1);
        assert_eq!(index.search(&text("salle")).unwrap().len(), 1);

        index.remove("q1").await.unwrap();
        assert!(index.search(&text("salle")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_query_is_validation_error() {
        let dir = TempDir::new().unwrap();
        let index = QuoteIndex::open(dir.path()).unwrap();

        let err = index.search(&text("budget:100")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
