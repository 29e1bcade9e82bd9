//! Per-request execution state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jogasaki_common::{ErrorCode, ErrorInfo, ExecutionConfig, JogasakiResult};
use jogasaki_kvs::{KvsDatabase, Transaction};
use tracing::{debug, warn};

use crate::catalog::StorageProvider;
use crate::conv::CastContext;
use crate::meta::DecimalFieldOption;
use crate::sequence::SequenceManager;

/// Caller-side cancellation flag shared with a running request.
///
/// # Example
///
/// ```rust
/// use jogasaki_sql::executor::CancelToken;
///
/// let token = CancelToken::new();
/// let seen_by_request = token.clone();
/// token.cancel();
/// assert!(seen_by_request.is_canceled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not canceled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true once [`cancel`](Self::cancel) was called.
    #[inline]
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything a statement execution needs: catalog, sequences, storage,
/// the caller's transaction and cancel token.
#[derive(Debug)]
pub struct RequestContext {
    config: Arc<ExecutionConfig>,
    provider: Arc<StorageProvider>,
    sequences: Arc<SequenceManager>,
    kvs: Arc<KvsDatabase>,
    transaction: Option<Arc<Transaction>>,
    cancel: CancelToken,
    zone_offset: i32,
    aborts: usize,
}

impl RequestContext {
    /// Creates a context without a transaction.
    #[must_use]
    pub fn new(
        config: Arc<ExecutionConfig>,
        provider: Arc<StorageProvider>,
        sequences: Arc<SequenceManager>,
        kvs: Arc<KvsDatabase>,
    ) -> Self {
        Self {
            config,
            provider,
            sequences,
            kvs,
            transaction: None,
            cancel: CancelToken::new(),
            zone_offset: 0,
            aborts: 0,
        }
    }

    /// Attaches the caller's transaction.
    #[must_use]
    pub fn with_transaction(mut self, transaction: Arc<Transaction>) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Attaches a cancel token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets the session time zone offset in minutes.
    #[must_use]
    pub fn with_zone_offset(mut self, minutes: i32) -> Self {
        self.zone_offset = minutes;
        self
    }

    /// Engine configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Catalog.
    #[inline]
    #[must_use]
    pub fn provider(&self) -> &Arc<StorageProvider> {
        &self.provider
    }

    /// Sequence manager.
    #[inline]
    #[must_use]
    pub fn sequences(&self) -> &Arc<SequenceManager> {
        &self.sequences
    }

    /// Storage engine.
    #[inline]
    #[must_use]
    pub fn kvs(&self) -> &Arc<KvsDatabase> {
        &self.kvs
    }

    /// The caller's transaction.
    pub fn transaction(&self) -> JogasakiResult<&Arc<Transaction>> {
        self.transaction
            .as_ref()
            .ok_or_else(|| ErrorInfo::invalid_argument("statement requires a transaction"))
    }

    /// Session time zone offset in minutes.
    #[inline]
    #[must_use]
    pub fn zone_offset(&self) -> i32 {
        self.zone_offset
    }

    /// Cast settings derived from the configuration and session.
    #[must_use]
    pub fn cast_context(&self) -> CastContext {
        CastContext::new(
            self.zone_offset,
            DecimalFieldOption {
                precision: self.config.default_decimal_precision,
                scale: self.config.default_decimal_scale,
            },
        )
    }

    /// Fails with `OperationCanceled` once the token is set.
    pub fn check_canceled(&self) -> JogasakiResult<()> {
        if self.cancel.is_canceled() {
            return Err(ErrorInfo::canceled());
        }
        Ok(())
    }

    /// Aborts the transaction after `error`.
    ///
    /// Nothing is done when the error reports the transaction inactive or
    /// the engine already ended it.
    pub fn abort_on_error(&mut self, error: &ErrorInfo) {
        if error.code() == ErrorCode::InactiveTransaction {
            return;
        }
        let Some(tx) = self.transaction.as_ref() else {
            return;
        };
        if !tx.is_active() {
            return;
        }
        self.aborts += 1;
        match tx.abort() {
            Ok(()) => debug!(txn = %tx.id(), code = %error.code(), "transaction aborted on error"),
            Err(e) => warn!(txn = %tx.id(), error = %e, "abort failed"),
        }
    }

    /// Number of aborts issued through this context.
    #[inline]
    #[must_use]
    pub fn abort_count(&self) -> usize {
        self.aborts
    }
}
