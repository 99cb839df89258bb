use crate::schedule_data::ScheduleData;

use tokio::sync::{Mutex, OwnedMutexGuard};

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// A private copy of the data. Readers keep seeing the old data until
/// `commit`; dropping the writer throws the copy away.
pub struct TransactionalWriter {
    new_data: ScheduleData,
    data_ref: Arc<RwLock<ScheduleData>>,
    _transaction_lock: OwnedMutexGuard<()>,
}

impl Deref for TransactionalWriter {
    type Target = ScheduleData;

    fn deref(&self) -> &Self::Target {
        &self.new_data
    }
}

impl DerefMut for TransactionalWriter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.new_data
    }
}

impl TransactionalWriter {
    pub fn commit(self) {
        let mut data = self.data_ref.write().unwrap_or_else(PoisonError::into_inner);
        *data = self.new_data
    }
}

/// Shares one `ScheduleData` between readers and a single writer at a time.
#[derive(Clone, Default)]
pub struct ScheduleManager {
    data: Arc<RwLock<ScheduleData>>,
    transaction_lock: Arc<Mutex<()>>,
}

impl ScheduleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ScheduleData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn transactional_write(&self) -> TransactionalWriter {
        let trans_lock = self.transaction_lock.clone().lock_owned().await;

        let new_data = self.read().clone();

        TransactionalWriter {
            new_data,
            data_ref: self.data.clone(),
            _transaction_lock: trans_lock,
        }
    }
}
