//! Quote (devis) model matching the frontend Devis interface.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::workflow::QuoteTotals;

/// Lifecycle status of a quote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    UnderClientReview,
    ModificationRequested,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 6] = [
        QuoteStatus::Draft,
        QuoteStatus::Sent,
        QuoteStatus::UnderClientReview,
        QuoteStatus::ModificationRequested,
        QuoteStatus::Accepted,
        QuoteStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::UnderClientReview => "under_client_review",
            QuoteStatus::ModificationRequested => "modification_requested",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(QuoteStatus::Draft),
            "sent" => Some(QuoteStatus::Sent),
            "under_client_review" => Some(QuoteStatus::UnderClientReview),
            "modification_requested" => Some(QuoteStatus::ModificationRequested),
            "accepted" => Some(QuoteStatus::Accepted),
            "rejected" => Some(QuoteStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single priced line of a quote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub label: String,
    pub amount_excl_vat: Decimal,
}

impl LineItem {
    pub fn new(label: impl Into<String>, amount_excl_vat: Decimal) -> Self {
        Self {
            label: label.into(),
            amount_excl_vat,
        }
    }
}

/// A quote sent to a client for a given event.
///
/// `totals` is never persisted. The repository recomputes it from
/// `line_items` and `vat_rate` every time a quote is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: String,
    pub event_id: String,
    pub status: QuoteStatus,
    pub vat_rate: Decimal,
    pub line_items: Vec<LineItem>,
    pub totals: QuoteTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

impl Quote {
    /// Recompute `totals` from the current line items and VAT rate.
    pub fn refresh_totals(&mut self) {
        self.totals = QuoteTotals::compute(&self.line_items, self.vat_rate);
    }
}

/// Request body for creating a new quote.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteRequest {
    pub event_id: String,
    #[serde(default)]
    pub vat_rate: Option<Decimal>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// Request body for editing the priced content of a quote.
///
/// The event reference is deliberately absent: it cannot change after creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuoteRequest {
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub vat_rate: Option<Decimal>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Optional body of the status-changing quote routes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Body of `POST /devis/{id}/modify`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationRequest {
    #[serde(default)]
    pub motif: String,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Query parameters for listing quotes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteFilter {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
