//! Generic graph walker for one turn
//!
//! Stages run strictly sequentially. A stage fault aborts the remaining
//! stages and leaves the context as of the last successful stage, so
//! completed expensive work (a finished transcription, say) survives a
//! downstream failure and gets persisted.

use super::graph::{Edge, StageGraph};
use crate::context::TurnContext;
use crate::services::ServiceRegistry;
use crate::{ParleyError, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on stage transitions per turn; guards conditional-edge cycles
const MAX_STEPS: usize = 64;

pub struct WorkflowEngine {
    graph: StageGraph,
    registry: Arc<ServiceRegistry>,
}

impl WorkflowEngine {
    pub fn new(graph: StageGraph, registry: Arc<ServiceRegistry>) -> Self {
        Self { graph, registry }
    }

    /// Run the graph over the context, mutating it stage by stage
    ///
    /// On error the context holds every update merged before the failing
    /// stage; the caller persists it as-is.
    pub fn run(&self, context: &mut TurnContext) -> Result<()> {
        let mut current = self.graph.entry().to_string();

        for step in 0..MAX_STEPS {
            let stage = self.graph.get(&current).ok_or_else(|| {
                ParleyError::WorkflowError(format!("unknown stage '{}'", current))
            })?;

            debug!("Running stage '{}' (step {})", stage.name, step);
            let update = (stage.run)(context, &self.registry).map_err(|e| {
                ParleyError::WorkflowError(format!("stage '{}' failed: {}", stage.name, e))
            })?;
            update.apply(context);

            match &stage.edge {
                Edge::End => {
                    info!("Workflow completed at stage '{}'", stage.name);
                    return Ok(());
                }
                Edge::Always(next) => current = next.clone(),
                Edge::Conditional(select) => {
                    current = select(context);
                    debug!("Stage '{}' routed to '{}'", stage.name, current);
                }
            }
        }

        Err(ParleyError::WorkflowError(format!(
            "no terminal stage reached within {} steps",
            MAX_STEPS
        )))
    }
}
