//! Job match client core: a fingerprint-validated match cache, a resolver
//! with a single primary→secondary fallback, and a per-entity mutation guard,
//! composed by `JobBoard` and exposed over HTTP by the `jobmatch` binary.

pub mod backend;
pub mod board;
pub mod cache;
pub mod config;
pub mod errors;
pub mod guard;
pub mod matching;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_support;
