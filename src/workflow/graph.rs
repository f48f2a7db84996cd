//! The workflow graph as an explicit, inspectable data structure
//!
//! An ordered list of named stage descriptors with edge functions,
//! constructed once at startup and executed by the generic walker in
//! `engine`. Stages receive the full current context and return a
//! partial update; the engine merges the update before following the
//! stage's edge.

use crate::context::{Focus, TurnContext, TurnRecord};
use crate::services::ServiceRegistry;
use crate::{ParleyError, Result};
use std::collections::HashSet;
use std::path::PathBuf;

/// Partial context update produced by one stage
#[derive(Default)]
pub struct StageUpdate {
    pub transcript: Option<String>,
    pub response_text: Option<String>,
    pub output_audio_ref: Option<PathBuf>,
    pub focus: Option<Focus>,
    pub history: Vec<TurnRecord>,
}

impl StageUpdate {
    /// Merge this update into the context
    ///
    /// History entries append; every other field overwrites when set.
    pub fn apply(self, context: &mut TurnContext) {
        if let Some(transcript) = self.transcript {
            context.transcript = transcript;
        }
        if let Some(response_text) = self.response_text {
            context.response_text = response_text;
        }
        if let Some(audio_ref) = self.output_audio_ref {
            context.output_audio_ref = Some(audio_ref);
        }
        if let Some(focus) = self.focus {
            context.current_focus = Some(focus);
        }
        context.conversation_history.extend(self.history);
    }
}

pub type StageFn = Box<dyn Fn(&TurnContext, &ServiceRegistry) -> Result<StageUpdate> + Send + Sync>;
pub type ConditionFn = Box<dyn Fn(&TurnContext) -> String + Send + Sync>;

/// Where execution goes after a stage completes
pub enum Edge {
    /// Unconditionally continue with the named stage
    Always(String),
    /// Let the stage's outcome select the next stage
    Conditional(ConditionFn),
    /// Terminal stage
    End,
}

impl Edge {
    pub fn always(name: impl Into<String>) -> Self {
        Edge::Always(name.into())
    }

    pub fn conditional(f: impl Fn(&TurnContext) -> String + Send + Sync + 'static) -> Self {
        Edge::Conditional(Box::new(f))
    }
}

/// One node of the workflow graph
pub struct Stage {
    pub name: String,
    pub run: StageFn,
    pub edge: Edge,
}

/// A validated directed graph of stages with one entry point
pub struct StageGraph {
    entry: String,
    stages: Vec<Stage>,
}

impl std::fmt::Debug for StageGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageGraph")
            .field("entry", &self.entry)
            .field(
                "stages",
                &self.stages.iter().map(|s| &s.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl StageGraph {
    pub fn builder() -> StageGraphBuilder {
        StageGraphBuilder {
            entry: None,
            stages: Vec::new(),
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn get(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

pub struct StageGraphBuilder {
    entry: Option<String>,
    stages: Vec<Stage>,
}

impl StageGraphBuilder {
    /// Set the entry stage
    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Add a stage with its outgoing edge
    pub fn stage(
        mut self,
        name: impl Into<String>,
        run: impl Fn(&TurnContext, &ServiceRegistry) -> Result<StageUpdate> + Send + Sync + 'static,
        edge: Edge,
    ) -> Self {
        self.stages.push(Stage {
            name: name.into(),
            run: Box::new(run),
            edge,
        });
        self
    }

    /// Validate and build the graph
    ///
    /// Checks that stage names are unique, the entry stage exists, and
    /// every static edge targets a known stage. Conditional edges are
    /// checked at execution time.
    pub fn build(self) -> Result<StageGraph> {
        let entry = self
            .entry
            .ok_or_else(|| ParleyError::WorkflowError("graph has no entry stage".to_string()))?;

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(ParleyError::WorkflowError(format!(
                    "duplicate stage '{}'",
                    stage.name
                )));
            }
        }

        if !seen.contains(entry.as_str()) {
            return Err(ParleyError::WorkflowError(format!(
                "entry stage '{}' is not in the graph",
                entry
            )));
        }

        for stage in &self.stages {
            if let Edge::Always(target) = &stage.edge {
                if !seen.contains(target.as_str()) {
                    return Err(ParleyError::WorkflowError(format!(
                        "stage '{}' has an edge to unknown stage '{}'",
                        stage.name, target
                    )));
                }
            }
        }

        Ok(StageGraph {
            entry,
            stages: self.stages,
        })
    }
}
