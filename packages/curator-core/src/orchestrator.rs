use crate::change::{Change, PayloadSet};
use crate::changelog::Changelog;
use crate::dag::{execution_order, execution_plan, StageNode};
use crate::error::Result;
use crate::parallel::isolate;
use crate::pipeline::{Stage, StageContext};
use std::time::Instant;
use tracing::{debug, error, info};

/// Runs the registered stages in dependency order for every change.
pub struct StageOrchestrator {
    stages: Vec<Box<dyn Stage>>,
}

impl StageOrchestrator {
    /// Validates the stages and fixes their execution order.
    ///
    /// Fails with a configuration error when the stages cannot be ordered.
    pub fn new(stages: Vec<Box<dyn Stage>>, external: PayloadSet) -> Result<Self> {
        let nodes: Vec<StageNode> = stages
            .iter()
            .map(|stage| StageNode::new(stage.name(), stage.consumes(), stage.produces()))
            .collect();
        let order = execution_order(&nodes, external)?;

        let mut slots: Vec<Option<Box<dyn Stage>>> = stages.into_iter().map(Some).collect();
        let stages = order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();
        Ok(Self { stages })
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn execution_plan(&self) -> String {
        execution_plan(self.stage_names())
    }

    /// Runs one pass for `change` and returns every change it led to, the
    /// original change first.
    ///
    /// A stage only sees the changes it consumes and is skipped when there are
    /// none. A failing stage is logged and contributes nothing; the remaining
    /// stages still run. Output of a type the stage did not declare is
    /// discarded as a whole.
    pub fn run_for(&mut self, change: Change, context: &StageContext<'_>) -> Changelog {
        let mut changelog = Changelog::of(change);
        for stage in &mut self.stages {
            let input = changelog.filter(stage.consumes());
            if input.is_empty() {
                debug!("Skipping stage '{}': no relevant changes", stage.name());
                continue;
            }

            let started = Instant::now();
            let output = match isolate(|| stage.run(&input, context)) {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    error!("Stage '{}' failed: {}", stage.name(), e);
                    continue;
                }
                Err(panic) => {
                    error!("Stage '{}' panicked: {}", stage.name(), panic);
                    continue;
                }
            };

            let undeclared = output.payload_types().difference(stage.produces());
            if !undeclared.is_empty() {
                error!(
                    "Stage '{}' produced undeclared types {}; discarding its output",
                    stage.name(),
                    undeclared
                );
                continue;
            }

            info!(
                "Stage '{}' processed {} changes into {} in {:?}",
                stage.name(),
                input.len(),
                output.len(),
                started.elapsed()
            );
            changelog = changelog.append(&output);
        }
        changelog
    }
}
