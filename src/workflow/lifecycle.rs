//! Quote lifecycle: guard predicates and the transition table.
//!
//! Every surface (list, detail, client view, HTTP handlers) asks this module
//! which actions are legal instead of comparing status strings itself.

use serde::{Deserialize, Serialize};

use super::WorkflowError;
use crate::models::QuoteStatus;

/// Who is acting on a quote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Staff,
    Client,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Staff => "staff",
            ActorRole::Client => "client",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staff" | "admin" | "employee" => Some(ActorRole::Staff),
            "client" => Some(ActorRole::Client),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something an actor can attempt on a quote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuoteAction {
    Create,
    Edit,
    Send,
    Review,
    Accept,
    Reject,
    RequestModification,
    Delete,
}

impl QuoteAction {
    /// Actions on an existing quote. `Create` is not one of them.
    pub const ALL: [QuoteAction; 7] = [
        QuoteAction::Edit,
        QuoteAction::Send,
        QuoteAction::Review,
        QuoteAction::Accept,
        QuoteAction::Reject,
        QuoteAction::RequestModification,
        QuoteAction::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteAction::Create => "create",
            QuoteAction::Edit => "edit",
            QuoteAction::Send => "send",
            QuoteAction::Review => "review",
            QuoteAction::Accept => "accept",
            QuoteAction::Reject => "reject",
            QuoteAction::RequestModification => "request_modification",
            QuoteAction::Delete => "delete",
        }
    }

    /// The only role allowed to perform this action.
    pub fn actor(&self) -> ActorRole {
        match self {
            QuoteAction::Create | QuoteAction::Edit | QuoteAction::Send | QuoteAction::Delete => {
                ActorRole::Staff
            }
            QuoteAction::Review
            | QuoteAction::Accept
            | QuoteAction::Reject
            | QuoteAction::RequestModification => ActorRole::Client,
        }
    }
}

impl std::fmt::Display for QuoteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn can_edit(status: QuoteStatus) -> bool {
    matches!(
        status,
        QuoteStatus::Draft | QuoteStatus::ModificationRequested
    )
}

pub fn can_send(status: QuoteStatus) -> bool {
    matches!(
        status,
        QuoteStatus::Draft | QuoteStatus::ModificationRequested
    )
}

pub fn can_client_respond(status: QuoteStatus) -> bool {
    matches!(status, QuoteStatus::Sent | QuoteStatus::UnderClientReview)
}

pub fn can_delete(status: QuoteStatus) -> bool {
    status != QuoteStatus::Accepted
}

/// Target status of `action` from `status`, ignoring who acts.
///
/// `None` means the action is not offered from this status. `Delete` keeps
/// the status: the record is removed afterwards.
pub fn next_status(status: QuoteStatus, action: QuoteAction) -> Option<QuoteStatus> {
    match action {
        QuoteAction::Create => None,
        QuoteAction::Edit => can_edit(status).then_some(status),
        QuoteAction::Send => can_send(status).then_some(QuoteStatus::Sent),
        QuoteAction::Review => {
            (status == QuoteStatus::Sent).then_some(QuoteStatus::UnderClientReview)
        }
        QuoteAction::Accept => can_client_respond(status).then_some(QuoteStatus::Accepted),
        QuoteAction::Reject => can_client_respond(status).then_some(QuoteStatus::Rejected),
        QuoteAction::RequestModification => {
            can_client_respond(status).then_some(QuoteStatus::ModificationRequested)
        }
        QuoteAction::Delete => can_delete(status).then_some(status),
    }
}

/// Check `action` by `actor` against the transition table.
///
/// The role is checked before the status.
pub fn attempt_transition(
    status: QuoteStatus,
    action: QuoteAction,
    actor: ActorRole,
) -> Result<QuoteStatus, WorkflowError> {
    if action.actor() != actor {
        return Err(WorkflowError::Forbidden { action, actor });
    }

    next_status(status, action).ok_or(WorkflowError::IllegalTransition {
        action,
        from: status,
    })
}

/// Actions `actor` may attempt on a quote in `status`.
pub fn allowed_actions(status: QuoteStatus, actor: ActorRole) -> Vec<QuoteAction> {
    QuoteAction::ALL
        .into_iter()
        .filter(|action| attempt_transition(status, *action, actor).is_ok())
        .collect()
}
