use mongodb::bson::{Document, doc};
use uuid::Uuid;

pub const USER_COLLECTION_NAME: &str = "users";
pub const SLOT_COLLECTION_NAME: &str = "timeslots";
pub const BOOKING_COLLECTION_NAME: &str = "bookings";
pub const TRANSACTION_COLLECTION_NAME: &str = "transactions";
pub const JOURNAL_COLLECTION_NAME: &str = "commit_journal";

/// Entities are stored as-is; the driver-generated `_id` is ignored and rows are addressed by
/// their own `id` field, which carries a unique index.
pub fn id_filter(id: Uuid) -> Document {
    doc! { "id": id.to_string() }
}
