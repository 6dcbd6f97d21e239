//! The take loop.

use crate::transitions::transition;
use std::sync::Arc;
use tracing::debug;
use weft_checker::{check_state, Context};
use weft_core::{PoolId, ProcessId, Result, WeftError};
use weft_store::PersistencePort;
use weft_types::Term;

/// Advances processes one communication action at a time.
///
/// Constructed with its persistence port; no ambient state.
pub struct Stepper {
    port: Arc<dyn PersistencePort>,
}

impl Stepper {
    /// Create a stepper over the given port.
    pub fn new(port: Arc<dyn PersistencePort>) -> Self {
        Self { port }
    }

    /// Advance `process` by the externally supplied `term`, looping while
    /// rendezvous keep producing continuations.
    ///
    /// Each iteration is one atomic step: load the configuration and
    /// environment, type-check, run the transition, commit. A check failure
    /// aborts the whole call before any mutation; a commit failure surfaces
    /// as a concurrency conflict with no partial state.
    pub async fn take(&self, pool: PoolId, process: ProcessId, term: Term) -> Result<()> {
        term.validate()?;
        let mut work = Some((pool, process, term));
        while let Some((pool, process, term)) = work {
            work = self.step(pool, process, term).await?;
        }
        Ok(())
    }

    async fn step(
        &self,
        pool: PoolId,
        process: ProcessId,
        term: Term,
    ) -> Result<Option<(PoolId, ProcessId, Term)>> {
        debug!(%pool, %process, kind = term.kind(), via = %term.via(), "taking step");
        let config = self.port.select_configuration(process).await?;
        if config.pool != pool {
            return Err(WeftError::unexpected_variant(format!(
                "process {process} is not owned by pool {pool}"
            )));
        }
        let env = self
            .port
            .select_environment(&config.type_roots(), &term.signature_names())
            .await?;
        let ctx = Context::from_configuration(pool, &config)?;
        check_state(pool, &env, ctx, &config, &term)?;
        let outcome = transition(self.port.as_ref(), &env, &config, term).await?;
        self.port.commit(outcome.batch).await?;
        if outcome.next.is_none() {
            debug!(%process, "step suspended or discharged");
        }
        Ok(outcome.next)
    }
}
