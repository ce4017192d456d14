//! Data models for the Innov'Events backend.
//!
//! These models match the frontend TypeScript interfaces (camelCase JSON).

mod activity;
mod event;
mod quote;
mod revision;

pub use activity::*;
pub use event::*;
pub use quote::*;
pub use revision::*;
