use std::{
    fs, io,
    path::{Path, PathBuf},
    rc::Rc,
    time::Duration,
};

use rdb_utils::cache::{is_path_component, RdbCachePath};

use crate::{
    block::{BlockContext, BlockId},
    error::{DomainError, FormatError, MultiError, ReplayError},
    instrumentation::InstrumentationCollector,
    key::{RegisterKey, RegisterValue},
    resolver::{
        remote_resolver, CachingResolver, ContractCapture, Finalize, ReadTracker, RegisterSource,
        ResolverChain, RunContext,
    },
    view::{RemoteView, StateView},
};

/// What a run executes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A transaction, re-run at the block it was originally executed in.
    Transaction { id: String },
    /// A script, run at an explicit block.
    Script { id: String, block: BlockId },
}

/// A transaction or script handed to the execution engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    pub target: Target,
    /// Source code of the payload.
    pub source: String,
    /// Encoded arguments, passed through to the engine untouched.
    pub arguments: Vec<Vec<u8>>,
}

impl Payload {
    pub fn transaction(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self { target: Target::Transaction { id: id.into() }, source: source.into(), arguments: vec![] }
    }

    pub fn script(id: impl Into<String>, block: BlockId, source: impl Into<String>) -> Self {
        Self {
            target: Target::Script { id: id.into(), block },
            source: source.into(),
            arguments: vec![],
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Vec<u8>>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn id(&self) -> &str {
        match &self.target {
            Target::Transaction { id } | Target::Script { id, .. } => id,
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self.target, Target::Transaction { .. })
    }

    /// Name of the run directory: `t_<id>` for transactions, `s_<id>` for scripts.
    pub fn directory_name(&self) -> Result<String, FormatError> {
        let id = self.id();
        if !is_path_component(id) {
            return Err(FormatError::PayloadId(id.to_string()));
        }
        Ok(match self.target {
            Target::Transaction { .. } => format!("t_{id}"),
            Target::Script { .. } => format!("s_{id}"),
        })
    }

    /// Name of the file the payload source is dumped to.
    pub fn source_file_name(&self) -> &'static str {
        match self.target {
            Target::Transaction { .. } => "transaction.cdc",
            Target::Script { .. } => "script.cdc",
        }
    }
}

/// The engine a payload is replayed with.
///
/// The engine sees state only through `view` and writes its diagnostics to `sink`. It returns
/// `Ok(Some(_))` when it rejects the payload, and `Err(_)` when the tooling itself failed.
pub trait ExecutionEngine {
    fn execute(
        &mut self,
        view: &mut dyn StateView,
        sink: &mut dyn io::Write,
        payload: &Payload,
        block: &BlockContext,
    ) -> Result<Option<DomainError>, ReplayError>;
}

#[derive(Debug, Default)]
pub struct ReplayBuilder {
    cache_root: Option<PathBuf>,
    no_cache: bool,
    output_root: Option<PathBuf>,
    timeout: Option<Duration>,
    context: Option<RunContext>,
}

impl ReplayBuilder {
    /// Set the cache root directory.
    /// If not set, the default cache directory will be used.
    pub fn cache_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(path.into());
        self
    }

    /// Keep the register cache in memory only.
    pub fn no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    /// Set the directory run directories are created in.
    /// If not set, the current directory will be used.
    pub fn output_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_root = Some(path.into());
        self
    }

    /// Set a deadline for every run, counted from its start.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the run context, e.g. to cancel runs from elsewhere.
    pub fn context(mut self, context: RunContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Result<Replay, ReplayError> {
        debug!("building replay with {:?}", self);

        let cache_root = if self.no_cache {
            None
        } else {
            let root = RdbCachePath::new(self.cache_root)
                .rdb_cache_dir()
                .ok_or(ReplayError::MissingCacheRoot)?;
            Some(root)
        };

        Ok(Replay {
            cache_root,
            output_root: self.output_root.unwrap_or_else(|| PathBuf::from(".")),
            timeout: self.timeout,
            context: self.context.unwrap_or_default(),
        })
    }
}

/// Replays payloads against remote state.
#[derive(Debug, Clone)]
pub struct Replay {
    // `None` disables the on-disk register cache
    cache_root: Option<PathBuf>,
    output_root: PathBuf,
    timeout: Option<Duration>,
    context: RunContext,
}

/// The outcome of a run.
///
/// The engine's verdict on the payload and failures of the tooling are kept apart: a run can
/// both reject the payload and fail to write its reports.
#[derive(Debug)]
pub struct RunOutcome {
    /// The block the payload ran at, if it could be resolved.
    pub block: Option<BlockId>,
    pub run_dir: PathBuf,
    pub domain_error: Option<DomainError>,
    /// Engine infrastructure failure and every finalize failure.
    pub error: Option<ReplayError>,
    /// Writes left in the root view once the engine returned, ordered by key.
    pub updates: Vec<(RegisterKey, Option<RegisterValue>)>,
}

impl RunOutcome {
    fn failed(run_dir: PathBuf, block: Option<BlockId>, error: ReplayError) -> Self {
        Self { block, run_dir, domain_error: None, error: Some(error), updates: vec![] }
    }

    pub fn is_success(&self) -> bool {
        self.domain_error.is_none() && self.error.is_none()
    }
}

impl Replay {
    pub fn builder() -> ReplayBuilder {
        ReplayBuilder::default()
    }

    pub fn cache_root(&self) -> Option<&Path> {
        self.cache_root.as_deref()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run `payload` once with `engine`, reading state from `source`.
    ///
    /// Every component of the run is finalized whatever the engine returns.
    pub fn run(
        &self,
        engine: &mut dyn ExecutionEngine,
        source: Rc<dyn RegisterSource>,
        payload: &Payload,
    ) -> RunOutcome {
        let ctx = match self.timeout {
            Some(timeout) => self.context.clone().with_timeout(timeout),
            None => self.context.clone(),
        };

        let run_dir = match payload.directory_name() {
            Ok(name) => self.output_root.join(name),
            Err(e) => return RunOutcome::failed(self.output_root.clone(), None, e.into()),
        };

        let block = match self.resolve_block(&ctx, source.as_ref(), payload) {
            Ok(block) => block,
            Err(e) => return RunOutcome::failed(run_dir, None, e),
        };

        let cache = match &self.cache_root {
            Some(root) => match CachingResolver::open(&block, root) {
                Ok(cache) => cache,
                Err(e) => return RunOutcome::failed(run_dir, Some(block), e),
            },
            None => CachingResolver::in_memory(&block),
        };
        let chain =
            ResolverChain::new(cache, ReadTracker::new(&run_dir), ContractCapture::new(&run_dir));
        let resolver = chain.wrap(remote_resolver(ctx, block.clone(), source));
        let mut view = RemoteView::new(resolver);
        let mut collector = InstrumentationCollector::new(&run_dir);

        let mut errors = MultiError::new();
        errors.record(dump_payload(&run_dir, payload));

        if payload.is_transaction() {
            warn!(
                tx = payload.id(),
                "re-running transaction: the result may differ from the original execution, since \
                 signature and sequence number checks are skipped and the transaction runs on the \
                 state at the beginning of its block"
            );
        }

        debug!("executing {} in {}", payload.id(), run_dir.display());
        let context = BlockContext { block: block.clone() };
        let domain_error = match engine.execute(&mut view, &mut collector, payload, &context) {
            Ok(domain_error) => domain_error,
            Err(e) => {
                error!("engine failed on {}: {e}", payload.id());
                errors.push(e);
                None
            }
        };
        if let Some(e) = &domain_error {
            info!("{} was rejected: {e}", payload.id());
        }

        errors.extend(chain.finalize().into_errors());
        if let Err(e) = collector.finalize() {
            warn!("failed to finalize {}: {e}", collector.component());
            errors.push(e);
        }

        RunOutcome {
            block: Some(block),
            run_dir,
            domain_error,
            error: errors.into_result().err(),
            updates: view.updates(),
        }
    }

    fn resolve_block(
        &self,
        ctx: &RunContext,
        source: &dyn RegisterSource,
        payload: &Payload,
    ) -> Result<BlockId, ReplayError> {
        match &payload.target {
            Target::Script { block, .. } => Ok(block.clone()),
            Target::Transaction { id } => {
                let block = source
                    .transaction_block(ctx, id)
                    .map_err(|source| ReplayError::BlockResolution { tx: id.clone(), source })?;
                info!(tx = id.as_str(), "resolved block {block}");
                Ok(block)
            }
        }
    }
}

fn dump_payload(run_dir: &Path, payload: &Payload) -> Result<(), ReplayError> {
    let file = run_dir.join(payload.source_file_name());
    debug!("dumping payload source: {}", file.display());
    fs::create_dir_all(run_dir)
        .and_then(|_| fs::write(&file, &payload.source))
        .map_err(|e| ReplayError::finalize("payload dump", e))
}
