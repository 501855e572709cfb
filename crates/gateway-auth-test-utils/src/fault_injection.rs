//! Refresh token store wrapper that injects failures on demand.

use async_trait::async_trait;
use gateway_auth::errors::StoreError;
use gateway_auth::models::RefreshTokenRecord;
use gateway_auth::services::refresh_token_store::RefreshTokenStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Failure to inject into an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Persistence error (lost commit, unreachable database, timeout).
    Persistence,
    /// Integrity error (duplicate rows for one token).
    Integrity,
}

impl Fault {
    fn to_error(self, operation: &str) -> StoreError {
        match self {
            Fault::Persistence => StoreError::Persistence(format!("injected {} failure", operation)),
            Fault::Integrity => StoreError::Integrity(format!("injected {} integrity violation", operation)),
        }
    }
}

#[derive(Default)]
struct FaultSlot(Mutex<Option<Fault>>);

impl FaultSlot {
    fn set(&self, fault: Option<Fault>) {
        *self.0.lock().unwrap() = fault;
    }

    fn get(&self) -> Option<Fault> {
        *self.0.lock().unwrap()
    }
}

/// Delegates to an inner store unless a fault is armed for the operation.
///
/// A failing rotation never reaches the inner store, so it has the effect
/// of a rolled-back transaction.
pub struct FaultyRefreshTokenStore {
    inner: Arc<dyn RefreshTokenStore>,
    rotate: FaultSlot,
    find: FaultSlot,
    ping: FaultSlot,
    rotate_calls: AtomicUsize,
}

impl FaultyRefreshTokenStore {
    pub fn new(inner: Arc<dyn RefreshTokenStore>) -> Self {
        Self {
            inner,
            rotate: FaultSlot::default(),
            find: FaultSlot::default(),
            ping: FaultSlot::default(),
            rotate_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_rotate(&self, fault: Option<Fault>) {
        self.rotate.set(fault);
    }

    pub fn fail_find(&self, fault: Option<Fault>) {
        self.find.set(fault);
    }

    pub fn fail_ping(&self, fault: Option<Fault>) {
        self.ping.set(fault);
    }

    /// Disarm every fault.
    pub fn heal(&self) {
        self.fail_rotate(None);
        self.fail_find(None);
        self.fail_ping(None);
    }

    /// Rotation attempts seen, failed ones included.
    pub fn rotate_calls(&self) -> usize {
        self.rotate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshTokenStore for FaultyRefreshTokenStore {
    async fn rotate_token(
        &self,
        username: &str,
        audience: &str,
        ttl_days: u32,
    ) -> Result<Uuid, StoreError> {
        self.rotate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = self.rotate.get() {
            return Err(fault.to_error("rotate"));
        }
        self.inner.rotate_token(username, audience, ttl_days).await
    }

    async fn find_by_token(&self, token: Uuid) -> Result<Option<RefreshTokenRecord>, StoreError> {
        if let Some(fault) = self.find.get() {
            return Err(fault.to_error("find"));
        }
        self.inner.find_by_token(token).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if let Some(fault) = self.ping.get() {
            return Err(fault.to_error("ping"));
        }
        self.inner.ping().await
    }
}
