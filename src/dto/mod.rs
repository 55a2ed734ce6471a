pub mod booking;
pub mod health;
pub mod sse;
pub mod timeslot;
pub mod user;
pub mod validation;
