//! In-memory implementations of the repository traits plus builders for
//! wiring use cases against them. Unit tests exercise the exact use-case
//! code paths the Postgres adapters serve in production.

pub mod factories;
pub mod mocks;
