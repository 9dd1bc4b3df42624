//! Token lifecycle: authorization, refresh, revocation and deletion
//!
//! [`LifecycleController`] is the only writer of the token store once the
//! application is running. Refresh and revoke run against external services
//! and report their progress through a [`StatusBoard`]; failures end up as
//! [`OpStatus::Error`] rather than being returned to the caller.

pub mod status;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::auth::{AuthExchange, Revoker, ServiceError};
use crate::clock::Clock;
use crate::models::{format_timestamp, TokenId, TokenRecord};
use crate::tokens::{self, Expiry, StorageError, TokenStore};

use status::StatusBoard;

pub use status::{outcome_message, OpStatus, Operation, StatusEvent};

/// How long a finished operation's status stays visible.
pub const DEFAULT_RESET_AFTER: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("token {0} not found")]
    NotFound(TokenId),
    #[error("Failed to exchange authorization code: {0}")]
    CodeExchange(#[source] ServiceError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("failed to save tokens: {0}")]
    Storage(#[from] StorageError),
}

pub struct LifecycleController {
    store: Mutex<TokenStore>,
    exchange: Arc<dyn AuthExchange>,
    revoker: Arc<dyn Revoker>,
    clock: Arc<dyn Clock>,
    board: StatusBoard,
    reset_after: Duration,
}

impl LifecycleController {
    pub fn new(
        store: TokenStore,
        exchange: Arc<dyn AuthExchange>,
        revoker: Arc<dyn Revoker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            exchange,
            revoker,
            clock,
            board: StatusBoard::new(),
            reset_after: DEFAULT_RESET_AFTER,
        }
    }

    pub fn with_reset_after(mut self, reset_after: Duration) -> Self {
        self.reset_after = reset_after;
        self
    }

    fn store(&self) -> MutexGuard<'_, TokenStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of all stored tokens.
    pub fn tokens(&self) -> Vec<TokenRecord> {
        self.store().list().to_vec()
    }

    pub fn token(&self, id: TokenId) -> Option<TokenRecord> {
        self.store().get(id).cloned()
    }

    /// Remaining lifetime of `record` as of now.
    pub fn expiry(&self, record: &TokenRecord) -> Expiry {
        tokens::remaining(&record.created_at, record.expires_in, self.clock.now())
    }

    pub fn status(&self, id: TokenId, op: Operation) -> OpStatus {
        self.board.get(id, op)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.board.subscribe()
    }

    /// Login URL from the authorization backend.
    pub async fn auth_url(&self) -> Result<String, ServiceError> {
        self.exchange.auth_url().await
    }

    /// Exchange an authorization code and store the resulting token pair.
    pub async fn authorize(&self, code: &str) -> Result<TokenRecord, LifecycleError> {
        let grant = self
            .exchange
            .exchange_code(code)
            .await
            .map_err(LifecycleError::CodeExchange)?;
        let record = self.store().insert_grant(grant, self.clock.now())?;
        tracing::info!("Stored new token {}", record.id);
        Ok(record)
    }

    /// Refresh the access token of `id`.
    ///
    /// The stored refresh token is kept even if the backend returns a new one.
    pub async fn refresh(&self, id: TokenId) -> OpStatus {
        self.run(id, Operation::Refresh, self.try_refresh(id)).await
    }

    /// Revoke the access token of `id` with the provider, then delete it.
    ///
    /// The record is kept if the provider does not confirm the revocation.
    pub async fn revoke(&self, id: TokenId) -> OpStatus {
        self.run(id, Operation::Revoke, self.try_revoke(id)).await
    }

    /// Remove `id` locally without contacting any service.
    pub fn delete(&self, id: TokenId) -> Result<(), StorageError> {
        self.store().delete(id)?;
        tracing::info!("Deleted token {}", id);
        Ok(())
    }

    /// Cancel all pending status resets.
    pub fn shutdown(&self) {
        self.board.cancel_all();
    }

    async fn run(
        &self,
        id: TokenId,
        op: Operation,
        work: impl std::future::Future<Output = Result<(), LifecycleError>>,
    ) -> OpStatus {
        self.board.begin(id, op);
        let status = match work.await {
            Ok(()) => {
                tracing::info!("Token {} {} succeeded", id, op);
                OpStatus::Success
            }
            Err(e) => {
                tracing::warn!("Token {} {} failed: {}", id, op, e);
                OpStatus::Error
            }
        };
        self.board.finish(id, op, status, self.reset_after);
        status
    }

    async fn try_refresh(&self, id: TokenId) -> Result<(), LifecycleError> {
        let refresh_token = self
            .token(id)
            .ok_or(LifecycleError::NotFound(id))?
            .refresh_token;

        let grant = self.exchange.refresh(&refresh_token).await?;

        let mut store = self.store();
        // Deleted while the request was in flight: don't bring it back
        let mut record = store
            .get(id)
            .cloned()
            .ok_or(LifecycleError::NotFound(id))?;
        record.expires_in = grant.expires_in();
        record.access_token = grant.access_token;
        record.created_at = format_timestamp(self.clock.now());
        store.upsert(record)?;
        Ok(())
    }

    async fn try_revoke(&self, id: TokenId) -> Result<(), LifecycleError> {
        let access_token = self
            .token(id)
            .ok_or(LifecycleError::NotFound(id))?
            .access_token;

        self.revoker.revoke(&access_token).await?;
        self.store().delete(id)?;
        Ok(())
    }
}
