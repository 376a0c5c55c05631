use super::domain::{DepositId, SecurityDeposit};
use crate::rental::store::RepositoryError;

/// Storage abstraction for deposit records.
///
/// `insert` must fail with [`RepositoryError::Duplicate`] when a deposit
/// already exists for the same booking, checked atomically with the write.
/// `replace` is a compare-and-swap on the record revision: it must fail with
/// [`RepositoryError::StaleRevision`] when the stored revision is not
/// `expected_revision`, and bump the revision on success.
pub trait DepositRepository: Send + Sync {
    fn insert(&self, deposit: SecurityDeposit) -> Result<SecurityDeposit, RepositoryError>;
    fn fetch(&self, id: &DepositId) -> Result<Option<SecurityDeposit>, RepositoryError>;
    fn replace(
        &self,
        deposit: SecurityDeposit,
        expected_revision: u64,
    ) -> Result<SecurityDeposit, RepositoryError>;
    fn all(&self) -> Result<Vec<SecurityDeposit>, RepositoryError>;
}
