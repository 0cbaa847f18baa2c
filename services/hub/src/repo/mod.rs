//! Repository layer: one module per table, each a thin set of
//! compile-time-checked `sqlx::query!`/`query_as!` functions -- no ORM,
//! no query builder, plain SQL per operation.

pub mod attendance;
pub mod commands;
pub mod credentials;
pub mod schedules;
pub mod terminals;
pub mod third_party;
pub mod users;
