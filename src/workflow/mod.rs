//! Quote workflow: the lifecycle state machine and the totals it relies on.
//!
//! Everything here is pure. Handlers load a quote, call [`apply`] with the
//! acting role, and persist the returned quote only if it succeeds, so a
//! rejected command never touches the store.

mod lifecycle;
mod totals;

pub use lifecycle::*;
pub use totals::*;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{LineItem, Quote, QuoteStatus};

/// Upper bound on a single line amount, in either direction.
const MAX_LINE_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Errors raised by the quote workflow before any store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot {action} a quote that is {from}")]
    IllegalTransition {
        action: QuoteAction,
        from: QuoteStatus,
    },

    #[error("{actor} is not allowed to {action} a quote")]
    Forbidden {
        action: QuoteAction,
        actor: ActorRole,
    },
}

/// A requested change to a quote, with the input it carries.
#[derive(Debug, Clone)]
pub enum QuoteCommand {
    Edit {
        line_items: Vec<LineItem>,
        vat_rate: Option<Decimal>,
    },
    Send,
    Review,
    Accept,
    Reject,
    RequestModification {
        motif: String,
    },
}

impl QuoteCommand {
    pub fn action(&self) -> QuoteAction {
        match self {
            QuoteCommand::Edit { .. } => QuoteAction::Edit,
            QuoteCommand::Send => QuoteAction::Send,
            QuoteCommand::Review => QuoteAction::Review,
            QuoteCommand::Accept => QuoteAction::Accept,
            QuoteCommand::Reject => QuoteAction::Reject,
            QuoteCommand::RequestModification { .. } => QuoteAction::RequestModification,
        }
    }
}

/// Run `command` by `actor` against `quote` and return the updated quote.
///
/// `now` is the RFC 3339 timestamp recorded for `updatedAt` and for the
/// send/acceptance side effects. The version is left untouched; the
/// repository bumps it when the write lands.
pub fn apply(
    quote: &Quote,
    command: QuoteCommand,
    actor: ActorRole,
    now: &str,
) -> Result<Quote, WorkflowError> {
    let next = attempt_transition(quote.status, command.action(), actor)?;
    let mut updated = quote.clone();

    match command {
        QuoteCommand::Edit {
            line_items,
            vat_rate,
        } => {
            validate_line_items(&line_items)?;
            if let Some(rate) = vat_rate {
                validate_vat_rate(rate)?;
                updated.vat_rate = rate;
            }
            updated.line_items = line_items;
        }
        QuoteCommand::Send => {
            if !has_labelled_line(&quote.line_items) {
                return Err(WorkflowError::Validation(
                    "A quote needs at least one labelled line item before it can be sent"
                        .to_string(),
                ));
            }
            updated.sent_at = Some(now.to_string());
        }
        QuoteCommand::Accept => {
            updated.accepted_at = Some(now.to_string());
        }
        QuoteCommand::RequestModification { motif } => {
            let motif = motif.trim();
            if motif.is_empty() {
                return Err(WorkflowError::Validation(
                    "A modification request needs a motif".to_string(),
                ));
            }
            updated.modification_reason = Some(motif.to_string());
        }
        QuoteCommand::Review | QuoteCommand::Reject => {}
    }

    updated.status = next;
    updated.updated_at = now.to_string();
    updated.refresh_totals();
    Ok(updated)
}

/// Build a fresh `draft` quote. Only staff create quotes.
pub fn new_draft(
    id: &str,
    event_id: &str,
    vat_rate: Decimal,
    line_items: Vec<LineItem>,
    actor: ActorRole,
    now: &str,
) -> Result<Quote, WorkflowError> {
    if actor != QuoteAction::Create.actor() {
        return Err(WorkflowError::Forbidden {
            action: QuoteAction::Create,
            actor,
        });
    }
    if event_id.trim().is_empty() {
        return Err(WorkflowError::Validation(
            "A quote must reference an event".to_string(),
        ));
    }
    validate_vat_rate(vat_rate)?;
    validate_line_items(&line_items)?;

    let mut quote = Quote {
        id: id.to_string(),
        event_id: event_id.trim().to_string(),
        status: QuoteStatus::Draft,
        vat_rate,
        line_items,
        totals: QuoteTotals::default(),
        modification_reason: None,
        sent_at: None,
        accepted_at: None,
        created_at: now.to_string(),
        updated_at: now.to_string(),
        version: 1,
    };
    quote.refresh_totals();
    Ok(quote)
}

/// Check a delete request. Deleting never changes the status.
pub fn authorize_delete(quote: &Quote, actor: ActorRole) -> Result<(), WorkflowError> {
    attempt_transition(quote.status, QuoteAction::Delete, actor).map(|_| ())
}

pub fn validate_vat_rate(rate: Decimal) -> Result<(), WorkflowError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(WorkflowError::Validation(format!(
            "VAT rate must be between 0 and 100, got {}",
            rate
        )));
    }
    Ok(())
}

pub fn validate_line_items(line_items: &[LineItem]) -> Result<(), WorkflowError> {
    for (index, item) in line_items.iter().enumerate() {
        if item.label.trim().is_empty() {
            return Err(WorkflowError::Validation(format!(
                "Line item {} needs a label",
                index + 1
            )));
        }
        if item.amount_excl_vat.abs() > MAX_LINE_AMOUNT {
            return Err(WorkflowError::Validation(format!(
                "Line item {} amount is out of range",
                index + 1
            )));
        }
    }
    Ok(())
}

fn has_labelled_line(line_items: &[LineItem]) -> bool {
    line_items.iter().any(|item| !item.label.trim().is_empty())
}
