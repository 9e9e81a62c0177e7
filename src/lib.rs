//! Agency portal — reminders, checklists, conversations, and documents
//! for an insurance agency's client and staff apps.

pub mod auth;
pub mod chat;
pub mod checklist;
pub mod config;
pub mod documents;
pub mod error;
pub mod mailer;
pub mod reminders;
pub mod store;
pub mod users;
