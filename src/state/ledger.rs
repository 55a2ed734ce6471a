//! In-memory view of the club rows and the copy-on-write drafts mutations run against.
//!
//! A mutation never touches the [`Ledger`] directly: it records its changes in a [`Draft`],
//! the resulting [`ChangeSet`] is persisted, and only then is it applied. A mutation that
//! fails half-way simply drops its draft.

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{BookingEntity, ClubRecords, TimeSlotEntity, TransactionEntity, UserEntity},
    state::events::ClubEvent,
};

/// Authoritative in-memory copy of every persisted row, in creation order.
#[derive(Debug, Default)]
pub struct Ledger {
    version: u64,
    users: IndexMap<Uuid, UserEntity>,
    slots: IndexMap<Uuid, TimeSlotEntity>,
    bookings: IndexMap<Uuid, BookingEntity>,
    transactions: Vec<TransactionEntity>,
}

/// Errors that can occur when applying a change set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The ledger moved on since the draft was taken.
    #[error("ledger version mismatch (draft taken at {expected}, ledger at {actual})")]
    VersionMismatch {
        /// Version the draft was based on.
        expected: u64,
        /// Current version.
        actual: u64,
    },
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from rows loaded out of a store.
    pub fn from_records(records: ClubRecords) -> Self {
        let ClubRecords {
            users,
            slots,
            bookings,
            transactions,
        } = records;

        Self {
            version: 0,
            users: users.into_iter().map(|user| (user.id, user)).collect(),
            slots: slots.into_iter().map(|slot| (slot.id, slot)).collect(),
            bookings: bookings
                .into_iter()
                .map(|booking| (booking.id, booking))
                .collect(),
            transactions,
        }
    }

    /// Number of change sets applied since the ledger was built.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Look up a user.
    pub fn user(&self, id: Uuid) -> Option<&UserEntity> {
        self.users.get(&id)
    }

    /// All users in creation order.
    pub fn users(&self) -> impl DoubleEndedIterator<Item = &UserEntity> {
        self.users.values()
    }

    /// Look up a slot.
    pub fn slot(&self, id: Uuid) -> Option<&TimeSlotEntity> {
        self.slots.get(&id)
    }

    /// All slots in creation order.
    pub fn slots(&self) -> impl DoubleEndedIterator<Item = &TimeSlotEntity> {
        self.slots.values()
    }

    /// Look up a booking.
    pub fn booking(&self, id: Uuid) -> Option<&BookingEntity> {
        self.bookings.get(&id)
    }

    /// All bookings in creation order.
    pub fn bookings(&self) -> impl DoubleEndedIterator<Item = &BookingEntity> {
        self.bookings.values()
    }

    /// Wallet history in chronological order.
    pub fn transactions(&self) -> &[TransactionEntity] {
        &self.transactions
    }

    /// Apply a persisted change set, returning the events it carries.
    pub fn apply(&mut self, changes: ChangeSet) -> Result<Vec<ClubEvent>, ApplyError> {
        if changes.base_version != self.version {
            return Err(ApplyError::VersionMismatch {
                expected: changes.base_version,
                actual: self.version,
            });
        }

        let ChangeSet {
            records, events, ..
        } = changes;

        for user in records.users {
            self.users.insert(user.id, user);
        }
        for slot in records.slots {
            self.slots.insert(slot.id, slot);
        }
        for booking in records.bookings {
            self.bookings.insert(booking.id, booking);
        }
        self.transactions.extend(records.transactions);
        self.version += 1;

        Ok(events)
    }
}

/// Rows touched by a mutation plus the events to broadcast once they are applied.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    base_version: u64,
    /// Rows to persist.
    pub records: ClubRecords,
    /// Events raised while computing the changes.
    pub events: Vec<ClubEvent>,
}

impl ChangeSet {
    /// Whether the mutation changed nothing.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Copy-on-write overlay over a [`Ledger`].
///
/// Reads see the draft's own rows first and fall back to the ledger; the first mutable access
/// to a row copies it into the draft.
pub struct Draft<'a> {
    base: &'a Ledger,
    users: IndexMap<Uuid, UserEntity>,
    slots: IndexMap<Uuid, TimeSlotEntity>,
    bookings: IndexMap<Uuid, BookingEntity>,
    transactions: Vec<TransactionEntity>,
    events: Vec<ClubEvent>,
}

impl<'a> Draft<'a> {
    /// Start a draft on top of `base`.
    pub fn new(base: &'a Ledger) -> Self {
        Self {
            base,
            users: IndexMap::new(),
            slots: IndexMap::new(),
            bookings: IndexMap::new(),
            transactions: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Look up a user.
    pub fn user(&self, id: Uuid) -> Option<&UserEntity> {
        self.users.get(&id).or_else(|| self.base.user(id))
    }

    /// Mutable access to a user, copying it into the draft.
    pub fn user_mut(&mut self, id: Uuid) -> Option<&mut UserEntity> {
        if !self.users.contains_key(&id) {
            let user = self.base.user(id)?.clone();
            self.users.insert(id, user);
        }
        self.users.get_mut(&id)
    }

    /// All users, ledger rows first.
    pub fn users(&self) -> impl Iterator<Item = &UserEntity> {
        let base = self.base;
        base.users()
            .map(move |user| self.users.get(&user.id).unwrap_or(user))
            .chain(self.users.values().filter(move |user| base.user(user.id).is_none()))
    }

    /// Add a brand new user.
    pub fn insert_user(&mut self, user: UserEntity) {
        self.users.insert(user.id, user);
    }

    /// Look up a slot.
    pub fn slot(&self, id: Uuid) -> Option<&TimeSlotEntity> {
        self.slots.get(&id).or_else(|| self.base.slot(id))
    }

    /// Mutable access to a slot, copying it into the draft.
    pub fn slot_mut(&mut self, id: Uuid) -> Option<&mut TimeSlotEntity> {
        if !self.slots.contains_key(&id) {
            let slot = self.base.slot(id)?.clone();
            self.slots.insert(id, slot);
        }
        self.slots.get_mut(&id)
    }

    /// All slots, ledger rows first.
    pub fn slots(&self) -> impl Iterator<Item = &TimeSlotEntity> {
        let base = self.base;
        base.slots()
            .map(move |slot| self.slots.get(&slot.id).unwrap_or(slot))
            .chain(self.slots.values().filter(move |slot| base.slot(slot.id).is_none()))
    }

    /// Add a brand new slot.
    pub fn insert_slot(&mut self, slot: TimeSlotEntity) {
        self.slots.insert(slot.id, slot);
    }

    /// Look up a booking.
    pub fn booking(&self, id: Uuid) -> Option<&BookingEntity> {
        self.bookings.get(&id).or_else(|| self.base.booking(id))
    }

    /// Mutable access to a booking, copying it into the draft.
    pub fn booking_mut(&mut self, id: Uuid) -> Option<&mut BookingEntity> {
        if !self.bookings.contains_key(&id) {
            let booking = self.base.booking(id)?.clone();
            self.bookings.insert(id, booking);
        }
        self.bookings.get_mut(&id)
    }

    /// All bookings, ledger rows first.
    pub fn bookings(&self) -> impl Iterator<Item = &BookingEntity> {
        let base = self.base;
        base.bookings()
            .map(move |booking| self.bookings.get(&booking.id).unwrap_or(booking))
            .chain(
                self.bookings
                    .values()
                    .filter(move |booking| base.booking(booking.id).is_none()),
            )
    }

    /// Add a brand new booking.
    pub fn insert_booking(&mut self, booking: BookingEntity) {
        self.bookings.insert(booking.id, booking);
    }

    /// Append a wallet movement.
    pub fn record(&mut self, transaction: TransactionEntity) {
        self.transactions.push(transaction);
    }

    /// Queue an event for broadcast after commit.
    pub fn emit(&mut self, event: ClubEvent) {
        self.events.push(event);
    }

    /// Freeze the draft into the change set to persist.
    pub fn into_changes(self) -> ChangeSet {
        ChangeSet {
            base_version: self.base.version(),
            records: ClubRecords {
                users: self.users.into_values().collect(),
                slots: self.slots.into_values().collect(),
                bookings: self.bookings.into_values().collect(),
                transactions: self.transactions,
            },
            events: self.events,
        }
    }
}
