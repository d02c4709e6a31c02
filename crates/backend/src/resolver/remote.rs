use std::{
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use super::{BoxedResolver, ResolveResult};
use crate::{
    block::BlockId,
    error::{BoxError, ReplayError},
    key::{RegisterKey, RegisterValue},
};

/// The remote source of truth for register values, typically a network client.
///
/// Retries, if any, are the source's business. Every call receives the run's [`RunContext`] so
/// that it can honor cancellation and the deadline in its own transport.
pub trait RegisterSource {
    /// Fetch the register `key` as of `block`. `None` means the register does not exist.
    fn get_register(
        &self,
        ctx: &RunContext,
        block: &BlockId,
        key: &RegisterKey,
    ) -> Result<Option<RegisterValue>, BoxError>;

    /// Resolve the block a transaction was executed in.
    fn transaction_block(&self, ctx: &RunContext, tx_id: &str) -> Result<BlockId, BoxError>;
}

/// Why a [`RunContext`] refuses further network calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation signal and optional deadline shared by every network call of a run.
///
/// Clones share the same cancellation flag, so a clone can be handed to e.g. a signal handler.
#[derive(Clone, Debug, Default)]
pub struct RunContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline `timeout` from now. A timeout too large to represent sets no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => {
                debug!("timeout of {timeout:?} is out of range, running without a deadline");
                self
            }
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn check(&self) -> Result<(), Interrupt> {
        if self.is_cancelled() {
            Err(Interrupt::Cancelled)
        } else if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            Err(Interrupt::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

/// The base resolver: reads registers from `source` at `block`.
pub fn remote_resolver(
    ctx: RunContext,
    block: BlockId,
    source: Rc<dyn RegisterSource>,
) -> BoxedResolver {
    Box::new(move |key: &RegisterKey| -> ResolveResult {
        match ctx.check() {
            Ok(()) => {}
            Err(Interrupt::Cancelled) => {
                return Err(ReplayError::Cancelled { key: key.to_string() })
            }
            Err(Interrupt::DeadlineExceeded) => {
                return Err(ReplayError::DeadlineExceeded { key: key.to_string() })
            }
        }

        trace!("fetching register {key} at block {block}");
        source
            .get_register(&ctx, &block, key)
            .map_err(|source| ReplayError::Connectivity { key: key.to_string(), source })
    })
}
