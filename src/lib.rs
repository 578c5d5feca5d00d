//! Admin chat: a per-user realtime message list, optimistic writes, and a
//! completion round trip against `POST /api/chat`, plus the small backend
//! that serves that endpoint.

pub mod auth;
pub mod completion;
pub mod config;
pub mod console;
pub mod db;
pub mod llm;
pub mod message;
pub mod routes;
pub mod state;
pub mod store;
pub mod view;

#[cfg(test)]
mod test_helpers;
