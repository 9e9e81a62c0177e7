//! Prioritized task checklist — model, ranking engine, and routes.

pub mod model;
pub mod rank;
pub mod routes;
