/// Account balance management.
/// Balances change only by applying events, which are created by handling commands
pub mod account;

/// Validated commands built from raw request input, later executed by the services.
pub mod command;

/// Users, account numbers and the append-only transaction ledger.
pub mod ledger;

/// Ledger store interface, plus "in memory" implementation.
/// All writes happen inside an explicit transaction boundary.
pub mod store;

/// Password and PIN hashing.
pub mod credentials;

/// Session tokens and role based authorization.
pub mod session;

/// Registration, balances, transfers and admin adjustments, coordinated
/// over the ledger store.
pub mod service;

pub mod config;
pub mod error;

/// HTTP surface. Thin layer that parses requests into commands and hands
/// them to [`service`].
pub mod http;
