//! Interpreter driver: one prepare pass, then one execute pass.

use crate::config::InterpretConfig;
use crate::context::Context;
use crate::random::{RandomSnapshot, RandomSource, RandomStream};
use crate::scene::SceneGraph;
use serde::Serialize;
use sprig_types::{EvalResult, InterpretError, NodeId, Op, Sequence};
use tracing::{debug, info, warn};

/// Read a JSON operation sequence.
pub fn parse_sequence(json: &str) -> Result<Sequence, serde_json::Error> {
    let ops: Vec<Op> = serde_json::from_str(json)?;
    Ok(ops.into())
}

/// Nodes and errors produced by one run against a caller-supplied random
/// source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Generation {
    /// Every instanced or copied node, in creation order.
    pub generated: Vec<NodeId>,
    pub errors: Vec<InterpretError>,
}

impl Generation {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of [`Interpreter::run`]: the generation plus the random stream
/// state to resume from on the next run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub generated: Vec<NodeId>,
    pub errors: Vec<InterpretError>,
    pub random_state: RandomSnapshot,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configured entry point for running grammars against a scene.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    config: InterpretConfig,
}

impl Interpreter {
    pub fn new(config: InterpretConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterpretConfig {
        &self.config
    }

    /// Run `ops` from `start` with a fresh stream seeded from the config,
    /// or continue from `prior` when given.
    ///
    /// Only a bad snapshot is returned as `Err`; everything else ends up in
    /// the outcome's error list.
    pub fn run(
        &self,
        scene: &mut dyn SceneGraph,
        ops: &[Op],
        start: NodeId,
        prior: Option<&RandomSnapshot>,
    ) -> EvalResult<RunOutcome> {
        let mut random = RandomStream::from_seed(self.config.seed);
        if let Some(snapshot) = prior {
            random.restore(snapshot)?;
            debug!("random stream restored from snapshot");
        }
        let generation = self.run_with(scene, &mut random, ops, start);
        Ok(RunOutcome {
            generated: generation.generated,
            errors: generation.errors,
            random_state: random.snapshot(),
        })
    }

    /// Run `ops` from `start`, drawing from `random`.
    pub fn run_with(
        &self,
        scene: &mut dyn SceneGraph,
        random: &mut dyn RandomSource,
        ops: &[Op],
        start: NodeId,
    ) -> Generation {
        if self.config.clear_children {
            if let Err(error) = clear_children(scene, start) {
                return Generation {
                    generated: Vec::new(),
                    errors: vec![error],
                };
            }
        }

        let mut ctx = match Context::new(scene, random, &self.config, start) {
            Ok(ctx) => ctx,
            Err(error) => {
                warn!(%start, %error, "cannot start generation");
                return Generation {
                    generated: Vec::new(),
                    errors: vec![error],
                };
            }
        };

        if prepare_pass(&mut ctx, ops) {
            execute_pass(&mut ctx, ops);
        }

        let (generated, errors) = ctx.into_output();
        info!(
            generated = generated.len(),
            errors = errors.len(),
            "generation finished"
        );
        Generation { generated, errors }
    }
}

/// Run a grammar with default settings and the given seed.
pub fn interpret(
    ops: &[Op],
    start_link: NodeId,
    scene: &mut dyn SceneGraph,
    seed: u64,
    prior: Option<&RandomSnapshot>,
) -> EvalResult<RunOutcome> {
    Interpreter::new(InterpretConfig::default().with_seed(seed)).run(scene, ops, start_link, prior)
}

fn clear_children(scene: &mut dyn SceneGraph, start: NodeId) -> EvalResult<()> {
    for child in scene.children(start) {
        scene.remove_subtree(child)?;
    }
    Ok(())
}

/// Prepare every top-level operation; returns whether execution may run.
#[tracing::instrument(level = "debug", skip_all, fields(ops = ops.len()))]
fn prepare_pass(ctx: &mut Context<'_>, ops: &[Op]) -> bool {
    for op in ops {
        if let Err(error) = ctx.prepare_op(op) {
            ctx.record_error(error);
        }
    }
    if ctx.has_errors() {
        warn!(errors = ctx.errors().len(), "prepare failed; skipping execution");
        return false;
    }
    true
}

#[tracing::instrument(level = "debug", skip_all, fields(ops = ops.len()))]
fn execute_pass(ctx: &mut Context<'_>, ops: &[Op]) {
    if let Err(error) = ctx.execute_sequence(ops) {
        warn!(%error, "generation aborted");
        ctx.record_error(error);
    }
}
