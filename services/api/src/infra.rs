use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use rental_guard::rental::blacklist::{BlacklistEntry, BlacklistRepository, EntryId};
use rental_guard::rental::deposits::{DepositId, DepositRepository, SecurityDeposit};
use rental_guard::rental::RepositoryError;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryBlacklistRepository {
    entries: Arc<Mutex<HashMap<EntryId, BlacklistEntry>>>,
}

impl BlacklistRepository for InMemoryBlacklistRepository {
    fn insert(&self, entry: BlacklistEntry) -> Result<BlacklistEntry, RepositoryError> {
        let mut guard = lock(&self.entries)?;
        if guard.contains_key(&entry.id) {
            return Err(RepositoryError::Duplicate);
        }
        guard.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    fn update(&self, entry: BlacklistEntry) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.entries)?;
        match guard.get_mut(&entry.id) {
            Some(slot) => {
                *slot = entry;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &EntryId) -> Result<Option<BlacklistEntry>, RepositoryError> {
        Ok(lock(&self.entries)?.get(id).cloned())
    }

    fn remove(&self, id: &EntryId) -> Result<(), RepositoryError> {
        lock(&self.entries)?
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn all(&self) -> Result<Vec<BlacklistEntry>, RepositoryError> {
        Ok(lock(&self.entries)?.values().cloned().collect())
    }
}

/// Deposit store enforcing the revision check under a single lock.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDepositRepository {
    deposits: Arc<Mutex<HashMap<DepositId, SecurityDeposit>>>,
}

impl DepositRepository for InMemoryDepositRepository {
    fn insert(&self, deposit: SecurityDeposit) -> Result<SecurityDeposit, RepositoryError> {
        let mut guard = lock(&self.deposits)?;
        if guard.contains_key(&deposit.id)
            || guard
                .values()
                .any(|stored| stored.booking_id == deposit.booking_id)
        {
            return Err(RepositoryError::Duplicate);
        }
        guard.insert(deposit.id.clone(), deposit.clone());
        Ok(deposit)
    }

    fn fetch(&self, id: &DepositId) -> Result<Option<SecurityDeposit>, RepositoryError> {
        Ok(lock(&self.deposits)?.get(id).cloned())
    }

    fn replace(
        &self,
        mut deposit: SecurityDeposit,
        expected_revision: u64,
    ) -> Result<SecurityDeposit, RepositoryError> {
        let mut guard = lock(&self.deposits)?;
        let stored = guard
            .get_mut(&deposit.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.revision != expected_revision {
            return Err(RepositoryError::StaleRevision {
                expected: expected_revision,
                found: stored.revision,
            });
        }
        deposit.revision = expected_revision + 1;
        *stored = deposit.clone();
        Ok(deposit)
    }

    fn all(&self) -> Result<Vec<SecurityDeposit>, RepositoryError> {
        Ok(lock(&self.deposits)?.values().cloned().collect())
    }
}
