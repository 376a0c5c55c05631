use super::domain::{BlacklistEntry, CustomerId, EntryId};
use crate::rental::store::RepositoryError;

/// Storage abstraction for registry entries.
///
/// Each call is a single-record operation; implementations must make `insert`,
/// `update`, and `remove` atomic per entry.
pub trait BlacklistRepository: Send + Sync {
    fn insert(&self, entry: BlacklistEntry) -> Result<BlacklistEntry, RepositoryError>;
    fn update(&self, entry: BlacklistEntry) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &EntryId) -> Result<Option<BlacklistEntry>, RepositoryError>;
    fn remove(&self, id: &EntryId) -> Result<(), RepositoryError>;
    fn all(&self) -> Result<Vec<BlacklistEntry>, RepositoryError>;

    fn by_customer(&self, customer_id: &CustomerId) -> Result<Vec<BlacklistEntry>, RepositoryError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|entry| &entry.customer_id == customer_id)
            .collect())
    }

    fn by_email(&self, email: &str) -> Result<Vec<BlacklistEntry>, RepositoryError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|entry| entry.customer_email.eq_ignore_ascii_case(email))
            .collect())
    }

    fn by_phone(&self, phone: &str) -> Result<Vec<BlacklistEntry>, RepositoryError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|entry| entry.customer_phone.as_deref() == Some(phone))
            .collect())
    }
}

/// Booking figures owned by the reservation system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingSummary {
    pub total_bookings: u32,
    pub completed_bookings: u32,
    pub cancelled_bookings: u32,
    pub total_spent: crate::money::Money,
}

/// Read-only view onto the booking system, consulted when projecting a
/// customer's risk profile.
pub trait BookingHistory: Send + Sync {
    fn summary(&self, customer_id: &CustomerId) -> Result<BookingSummary, RepositoryError>;
}

/// Stand-in used when no booking system is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBookingHistory;

impl BookingHistory for NoBookingHistory {
    fn summary(&self, _customer_id: &CustomerId) -> Result<BookingSummary, RepositoryError> {
        Ok(BookingSummary::default())
    }
}
