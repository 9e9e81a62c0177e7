//! Reminders — model, due-sweep dispatcher, and routes.

pub mod dispatcher;
pub mod model;
pub mod routes;
