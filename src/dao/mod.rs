/// Persistence backends for users, slots, bookings and transactions.
pub mod club_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
