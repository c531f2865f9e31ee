//! REST and event-stream server: routes, admin auth, DTOs, OpenAPI docs, and
//! the wiring that hosts the scheduler in-process.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
