//! # rdb-backend
//!
//! RDB's core replay backend: resolves registers of a remote ledger on demand, layers a
//! speculative state view on top of them for the execution engine, and records what a run read
//! and reported.

#[macro_use]
extern crate tracing;

mod block;
mod core;
pub mod error;
pub mod instrumentation;
pub mod key;
pub mod resolver;
mod view;

pub use block::{BlockContext, BlockId};
pub use core::{ExecutionEngine, Payload, Replay, ReplayBuilder, RunOutcome, Target};
pub use error::{BoxError, DomainError, FormatError, MultiError, ReplayError};
pub use instrumentation::{Intensities, InstrumentationCollector};
pub use key::{ReadableKey, RegisterKey, RegisterValue};
pub use resolver::{
    CachingResolver, ContractCapture, Finalize, ReadTracker, RegisterResolver, RegisterSource,
    ResolverChain, ResolverWrapper, RunContext,
};
pub use view::{RemoteView, StateView};
