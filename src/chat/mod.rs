//! Real-time client/staff chat — conversation state machine, broadcast hub,
//! and WebSocket + REST surface.

pub mod hub;
pub mod model;
pub mod routes;
pub mod service;
