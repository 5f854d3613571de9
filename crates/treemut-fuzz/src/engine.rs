//! The mutation loop and deterministic replay.

use crate::finders::{finder_for, MutationFinder};
use crate::mutation::Mutation;
use crate::probability::ProbabilityContext;
use crate::random::RandomSource;
use crate::sequence::MutationSequence;
use std::collections::VecDeque;
use tracing::{debug, info, instrument, trace, warn};
use treemut_core::{Error, FinderSelection, MutationKind, MutatorConfig, Result};
use treemut_ir::{CloneContext, Diagnostic, NodeIdMap, Program, Validator};

/// Check `mutation` against `program`, then clone with its edits and validate the result.
///
/// Returns `None` if the mutation does not apply. The returned program may be invalid;
/// that is a bug in the mutation and is for the caller to report.
pub fn apply_mutation(
    program: &Program,
    ids: &NodeIdMap,
    mutation: &Mutation,
    validator: &dyn Validator,
) -> Option<(Program, NodeIdMap)> {
    if !mutation.is_applicable(program, ids) {
        trace!(%mutation, "not applicable");
        return None;
    }
    let mut ctx = CloneContext::new(program, ids);
    mutation.apply(&mut ctx);
    let (ast, new_ids) = ctx.finish();
    Some((Program::new(ast, validator), new_ids))
}

/// Re-apply recorded mutations in order, without randomness.
///
/// Starts from a fresh copy of `initial` numbered the way [`MutationEngine::new`] numbers
/// its input, so a sequence recorded by a run reproduces that run's program.
///
/// # Panics
///
/// If a mutation does not apply or yields an invalid program: the record does not belong
/// to `initial`, or a mutation is broken.
pub fn replay<'m>(
    initial: &Program,
    mutations: impl IntoIterator<Item = &'m Mutation>,
    validator: &dyn Validator,
) -> (Program, NodeIdMap) {
    let mut program = Program::new(initial.ast().clone(), validator);
    let mut ids = NodeIdMap::from_program(&program);
    for (step, mutation) in mutations.into_iter().enumerate() {
        let Some((next, next_ids)) = apply_mutation(&program, &ids, mutation, validator) else {
            panic!("replay step {}: {} is not applicable", step, mutation);
        };
        if !next.is_valid() {
            panic!(
                "replay step {}: {} produced an invalid program: {:?}",
                step,
                mutation,
                next.diagnostics()
            );
        }
        program = next;
        ids = next_ids;
    }
    (program, ids)
}

pub fn replay_sequence(
    initial: &Program,
    sequence: &MutationSequence,
    validator: &dyn Validator,
) -> (Program, NodeIdMap) {
    debug!(run = %sequence.header.run_id, mutations = sequence.len(), "replaying sequence");
    replay(initial, sequence, validator)
}

/// Where the loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Selecting,
    Finding,
    Applying,
    Validating,
    /// Too many consecutive cycles applied nothing
    Stuck,
    /// The mutation budget is spent or no finder is enabled
    Done,
    /// A mutation produced an invalid program
    Aborted,
}

impl EngineStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, EngineStatus::Stuck | EngineStatus::Done | EngineStatus::Aborted)
    }
}

enum State {
    Selecting,
    Finding {
        finder: usize,
    },
    Applying {
        finder: usize,
        pending: VecDeque<Mutation>,
        applied: usize,
    },
    Validating {
        finder: usize,
        pending: VecDeque<Mutation>,
        applied: usize,
        mutation: Mutation,
        candidate: Program,
        candidate_ids: NodeIdMap,
    },
    Stuck,
    Done,
    Aborted,
}

impl State {
    fn status(&self) -> EngineStatus {
        match self {
            State::Selecting => EngineStatus::Selecting,
            State::Finding { .. } => EngineStatus::Finding,
            State::Applying { .. } => EngineStatus::Applying,
            State::Validating { .. } => EngineStatus::Validating,
            State::Stuck => EngineStatus::Stuck,
            State::Done => EngineStatus::Done,
            State::Aborted => EngineStatus::Aborted,
        }
    }
}

/// Outcome of a finished run
pub struct MutationRun {
    /// Last valid program
    pub program: Program,
    pub ids: NodeIdMap,
    /// Every mutation applied, in order
    pub sequence: MutationSequence,
    pub status: EngineStatus,
    /// Validator output for the rejected program when the run aborted
    pub diagnostics: Vec<Diagnostic>,
}

/// Randomized mutation loop over one program
pub struct MutationEngine<'v, R: RandomSource> {
    program: Program,
    ids: NodeIdMap,
    validator: &'v dyn Validator,
    rng: R,
    finders: Vec<Box<dyn MutationFinder>>,
    probabilities: ProbabilityContext,
    selection: FinderSelection,
    max_mutations: usize,
    max_consecutive_failures: usize,
    consecutive_failures: usize,
    sequence: MutationSequence,
    diagnostics: Vec<Diagnostic>,
    state: State,
}

impl<'v, R: RandomSource> MutationEngine<'v, R> {
    /// Prepare a run: draw per-kind chances and the set of enabled finders.
    ///
    /// Fails if the configuration is inconsistent or `program` is not valid.
    #[instrument(skip_all, fields(seed = config.seed))]
    pub fn new(
        program: Program,
        config: &MutatorConfig,
        validator: &'v dyn Validator,
        mut rng: R,
    ) -> Result<Self> {
        config.validate()?;
        if !program.is_valid() {
            return Err(Error::Validation(format!(
                "cannot mutate an invalid program: {:?}",
                program.diagnostics()
            )));
        }

        let probabilities = ProbabilityContext::new(&config.probabilities, &mut rng);
        let mut configured: Vec<MutationKind> = Vec::new();
        for kind in &config.enabled_mutations {
            if !configured.contains(kind) {
                configured.push(*kind);
            }
        }
        let enabled = if configured.is_empty() || config.enable_all_mutations {
            configured
        } else {
            // each finder flips a coin; redraw until at least one is on
            loop {
                let subset: Vec<MutationKind> =
                    configured.iter().copied().filter(|_| rng.next_bool()).collect();
                if !subset.is_empty() {
                    break subset;
                }
            }
        };
        let finders: Vec<_> = enabled.iter().map(|k| finder_for(*k, config)).collect();
        info!(
            "Enabled finders: {:?}",
            enabled.iter().map(|k| k.name()).collect::<Vec<_>>()
        );

        let state = if finders.is_empty() {
            State::Done
        } else {
            State::Selecting
        };
        let ids = NodeIdMap::from_program(&program);
        Ok(Self {
            program,
            ids,
            validator,
            rng,
            finders,
            probabilities,
            selection: config.finder_selection,
            max_mutations: config.max_mutations,
            max_consecutive_failures: config.max_consecutive_failures,
            consecutive_failures: 0,
            sequence: MutationSequence::new(config.seed),
            diagnostics: Vec::new(),
            state,
        })
    }

    pub fn status(&self) -> EngineStatus {
        self.state.status()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn ids(&self) -> &NodeIdMap {
        &self.ids
    }

    pub fn sequence(&self) -> &MutationSequence {
        &self.sequence
    }

    pub fn enabled_kinds(&self) -> Vec<MutationKind> {
        self.finders.iter().map(|f| f.kind()).collect()
    }

    /// Advance by one state transition; a finished engine stays put
    pub fn step(&mut self) -> EngineStatus {
        let state = std::mem::replace(&mut self.state, State::Aborted);
        self.state = match state {
            State::Selecting => self.select(),
            State::Finding { finder } => self.find(finder),
            State::Applying {
                finder,
                pending,
                applied,
            } => self.try_next(finder, pending, applied),
            State::Validating {
                finder,
                pending,
                applied,
                mutation,
                candidate,
                candidate_ids,
            } => self.validate(finder, pending, applied, mutation, candidate, candidate_ids),
            finished @ (State::Stuck | State::Done | State::Aborted) => finished,
        };
        self.status()
    }

    /// Step until the run finishes
    #[instrument(skip(self), fields(program = %self.program.id()))]
    pub fn run(mut self) -> MutationRun {
        info!("Starting mutation run");
        while !self.status().is_finished() {
            self.step();
        }
        info!(
            "Mutation run finished: {:?} after {} mutations",
            self.status(),
            self.sequence.len()
        );
        self.into_result()
    }

    pub fn into_result(self) -> MutationRun {
        let status = self.status();
        MutationRun {
            program: self.program,
            ids: self.ids,
            sequence: self.sequence,
            status,
            diagnostics: self.diagnostics,
        }
    }

    fn select(&mut self) -> State {
        if self.sequence.len() >= self.max_mutations {
            return State::Done;
        }
        let finder = match self.selection {
            FinderSelection::Uniform => self.rng.pick_index(self.finders.len()),
            FinderSelection::Weighted => self.pick_weighted(),
        };
        trace!(finder = self.finders[finder].kind().name(), "finder selected");
        State::Finding { finder }
    }

    fn pick_weighted(&mut self) -> usize {
        let weights: Vec<u64> = self
            .finders
            .iter()
            .map(|f| u64::from(f.chance_of_applying(&self.probabilities)))
            .collect();
        let total: u64 = weights.iter().sum();
        if total == 0 {
            return self.rng.pick_index(self.finders.len());
        }
        let mut roll = self.rng.next_below(total);
        for (i, w) in weights.iter().enumerate() {
            if roll < *w {
                return i;
            }
            roll -= w;
        }
        self.finders.len() - 1
    }

    fn find(&mut self, finder: usize) -> State {
        let found = self.finders[finder].find_mutations(&self.program, &self.ids, &mut self.rng);
        debug!(
            kind = self.finders[finder].kind().name(),
            found = found.len(),
            "mutations found"
        );
        State::Applying {
            finder,
            pending: found.into(),
            applied: 0,
        }
    }

    fn try_next(
        &mut self,
        finder: usize,
        mut pending: VecDeque<Mutation>,
        applied: usize,
    ) -> State {
        let Some(mutation) = pending.pop_front() else {
            return self.end_cycle(applied);
        };
        let chance = self.finders[finder].chance_of_applying(&self.probabilities);
        if !self.rng.chance(chance) {
            trace!(%mutation, "skipped by chance");
            return State::Applying {
                finder,
                pending,
                applied,
            };
        }
        match apply_mutation(&self.program, &self.ids, &mutation, self.validator) {
            Some((candidate, candidate_ids)) => State::Validating {
                finder,
                pending,
                applied,
                mutation,
                candidate,
                candidate_ids,
            },
            None => State::Applying {
                finder,
                pending,
                applied,
            },
        }
    }

    fn validate(
        &mut self,
        finder: usize,
        pending: VecDeque<Mutation>,
        applied: usize,
        mutation: Mutation,
        candidate: Program,
        candidate_ids: NodeIdMap,
    ) -> State {
        if !candidate.is_valid() {
            warn!(
                "{} produced an invalid program; keeping {}",
                mutation,
                self.program.id()
            );
            self.diagnostics = candidate.diagnostics().to_vec();
            return State::Aborted;
        }
        debug!(%mutation, program = %candidate.id(), "mutation applied");
        self.program = candidate;
        self.ids = candidate_ids;
        self.sequence.push(mutation);
        if self.sequence.len() >= self.max_mutations {
            return State::Done;
        }
        State::Applying {
            finder,
            pending,
            applied: applied + 1,
        }
    }

    fn end_cycle(&mut self, applied: usize) -> State {
        if applied > 0 {
            self.consecutive_failures = 0;
            return State::Selecting;
        }
        self.consecutive_failures += 1;
        trace!(failures = self.consecutive_failures, "cycle applied nothing");
        if self.consecutive_failures >= self.max_consecutive_failures {
            info!(
                "Giving up after {} cycles without progress",
                self.consecutive_failures
            );
            State::Stuck
        } else {
            State::Selecting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ChaChaSource;
    use std::cell::Cell;
    use treemut_core::{ChanceRange, ProbabilityConfig};
    use treemut_ir::{
        Ast, BinaryOp, NodeKind, Printer, ProgramBuilder, Resolver, Severity, Type, UnaryOp,
        ValidationReport,
    };

    /// Resolver that starts failing every program after the first `limit`
    struct RejectAfter {
        limit: usize,
        seen: Cell<usize>,
    }

    impl Validator for RejectAfter {
        fn validate(&self, ast: &Ast) -> ValidationReport {
            let seen = self.seen.get();
            self.seen.set(seen + 1);
            let mut report = Resolver::new().validate(ast);
            if seen >= self.limit {
                report.diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    message: "rejected by test oracle".to_string(),
                    node: None,
                });
            }
            report
        }
    }

    fn flat_chances(chance: u32) -> ProbabilityConfig {
        let range = ChanceRange::new(chance, chance);
        ProbabilityConfig {
            change_binary_operator: range,
            change_unary_operator: range,
            delete_statement: range,
            replace_identifier: range,
            wrap_unary_operator: range,
        }
    }

    // fn f(a : i32, b : i32) -> i32 {
    //   var x = (a + b); var y = -(a); var ok = (x < y);
    //   if (ok) { x = (x * 2i); } else { y = (y - 1i); }
    //   x += y;
    //   return (x ^ y);
    // }
    fn sample() -> Program {
        let mut b = ProgramBuilder::new();
        let pa = b.param("a", Type::I32);
        let pb = b.param("b", Type::I32);
        let a1 = b.ident("a");
        let b1 = b.ident("b");
        let sum = b.add(a1, b1);
        let x_decl = b.var_decl("x", sum);
        let a2 = b.ident("a");
        let neg = b.unary(UnaryOp::Negation, a2);
        let y_decl = b.var_decl("y", neg);
        let x1 = b.ident("x");
        let y1 = b.ident("y");
        let lt = b.less_than(x1, y1);
        let ok_decl = b.var_decl("ok", lt);
        let ok = b.ident("ok");
        let x2 = b.ident("x");
        let x3 = b.ident("x");
        let two = b.lit_i32(2);
        let prod = b.binary(BinaryOp::Multiply, x3, two);
        let then_assign = b.assign(x2, prod);
        let then_b = b.block(vec![then_assign]);
        let y2 = b.ident("y");
        let y3 = b.ident("y");
        let one = b.lit_i32(1);
        let diff = b.binary(BinaryOp::Subtract, y3, one);
        let else_assign = b.assign(y2, diff);
        let else_b = b.block(vec![else_assign]);
        let iff = b.if_stmt(ok, then_b, Some(else_b));
        let x4 = b.ident("x");
        let y4 = b.ident("y");
        let acc = b.compound_assign(BinaryOp::Add, x4, y4);
        let x5 = b.ident("x");
        let y5 = b.ident("y");
        let xor = b.binary(BinaryOp::Xor, x5, y5);
        let ret = b.return_stmt(Some(xor));
        let body = b.block(vec![x_decl, y_decl, ok_decl, iff, acc, ret]);
        let f = b.function("f", vec![pa, pb], Some(Type::I32), body);
        let program = b.build(vec![f], &Resolver::new());
        assert!(program.is_valid(), "{:?}", program.diagnostics());
        program
    }

    fn config(seed: u64) -> MutatorConfig {
        MutatorConfig {
            seed,
            max_mutations: 8,
            enable_all_mutations: true,
            ..MutatorConfig::default()
        }
    }

    #[test]
    fn test_replay_reproduces_run() {
        let validator = Resolver::new();
        for seed in 0..8 {
            let initial = sample();
            let engine = MutationEngine::new(
                Program::new(initial.ast().clone(), &validator),
                &config(seed),
                &validator,
                ChaChaSource::seeded(seed),
            )
            .unwrap();
            let run = engine.run();
            assert_ne!(run.status, EngineStatus::Aborted, "{:?}", run.diagnostics);
            assert!(run.program.is_valid());

            let (replayed, replayed_ids) = replay_sequence(&initial, &run.sequence, &validator);
            assert!(replayed.structurally_eq(&run.program), "seed {}", seed);
            assert_eq!(replayed_ids.entries().len(), run.ids.entries().len());
            let printer = Printer::default();
            assert_eq!(printer.print(&replayed), printer.print(&run.program));
        }
    }

    #[test]
    fn test_same_seed_same_run() {
        let validator = Resolver::new();
        let run = |seed| {
            MutationEngine::new(sample(), &config(seed), &validator, ChaChaSource::seeded(seed))
                .unwrap()
                .run()
        };
        let first = run(21);
        let second = run(21);
        assert_eq!(first.sequence.mutations(), second.sequence.mutations());
        assert!(first.program.structurally_eq(&second.program));
    }

    #[test]
    fn test_budget_ends_run() {
        let validator = Resolver::new();
        let cfg = MutatorConfig {
            max_mutations: 1,
            ..config(3)
        };
        let run = MutationEngine::new(sample(), &cfg, &validator, ChaChaSource::seeded(3))
            .unwrap()
            .run();
        assert!(run.sequence.len() <= 1);
        if run.sequence.len() == 1 {
            assert_eq!(run.status, EngineStatus::Done);
        }
    }

    #[test]
    fn test_no_finders_is_done() {
        let validator = Resolver::new();
        let cfg = MutatorConfig {
            enabled_mutations: Vec::new(),
            ..config(1)
        };
        let engine =
            MutationEngine::new(sample(), &cfg, &validator, ChaChaSource::seeded(1)).unwrap();
        assert_eq!(engine.status(), EngineStatus::Done);
        let run = engine.run();
        assert!(run.sequence.is_empty());
    }

    #[test]
    fn test_nothing_to_find_gets_stuck() {
        let validator = Resolver::new();
        let mut b = ProgramBuilder::new();
        let body = b.block(vec![]);
        let f = b.function("f", vec![], None, body);
        let program = b.build(vec![f], &validator);
        let cfg = MutatorConfig {
            max_consecutive_failures: 3,
            ..config(0)
        };
        let mut engine =
            MutationEngine::new(program, &cfg, &validator, ChaChaSource::seeded(0)).unwrap();
        let mut steps = 0;
        while !engine.step().is_finished() {
            steps += 1;
            assert!(steps < 100);
        }
        assert_eq!(engine.status(), EngineStatus::Stuck);
        // select, find, and an empty apply per cycle
        assert_eq!(steps + 1, 3 * 3);
    }

    #[test]
    fn test_finder_subset_is_never_empty() {
        let validator = Resolver::new();
        for seed in 0..16 {
            let cfg = MutatorConfig {
                enable_all_mutations: false,
                ..config(seed)
            };
            let rng = ChaChaSource::seeded(seed);
            let engine = MutationEngine::new(sample(), &cfg, &validator, rng).unwrap();
            let kinds = engine.enabled_kinds();
            assert!(!kinds.is_empty());
            assert!(kinds.iter().all(|k| cfg.enabled_mutations.contains(k)));
        }
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let validator = Resolver::new();
        let mut b = ProgramBuilder::new();
        let x = b.ident("missing");
        let one = b.lit_i32(1);
        let assign = b.assign(x, one);
        let body = b.block(vec![assign]);
        let f = b.function("f", vec![], None, body);
        let program = b.build(vec![f], &validator);
        assert!(matches!(
            MutationEngine::new(program, &config(0), &validator, ChaChaSource::seeded(0)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_apply_then_replay_matches_live_applies() {
        let validator = Resolver::new();
        let initial = sample();
        let mut program = Program::new(initial.ast().clone(), &validator);
        let mut ids = NodeIdMap::from_program(&program);
        let mut rng = ChaChaSource::seeded(99);
        let mut applied = Vec::new();
        for kind in MutationKind::ALL {
            let finder = finder_for(kind, &MutatorConfig::default());
            let found = finder.find_mutations(&program, &ids, &mut rng);
            if let Some(m) = found.into_iter().next() {
                if let Some((next, next_ids)) = apply_mutation(&program, &ids, &m, &validator) {
                    assert!(next.is_valid(), "{}: {:?}", m, next.diagnostics());
                    program = next;
                    ids = next_ids;
                    applied.push(m);
                }
            }
        }
        assert!(!applied.is_empty());
        let (replayed, _) = replay(&initial, &applied, &validator);
        assert!(replayed.structurally_eq(&program));
    }

    #[test]
    #[should_panic(expected = "is not applicable")]
    fn test_replay_panics_on_foreign_record() {
        let validator = Resolver::new();
        let initial = sample();
        let bogus = Mutation::DeleteStatement(crate::mutations::DeleteStatement {
            statement_id: treemut_core::NodeId(10_000),
        });
        replay(&initial, [&bogus], &validator);
    }

    #[test]
    fn test_wrapper_ids_survive_replay() {
        let validator = Resolver::new();
        let initial = sample();
        let ids = NodeIdMap::from_program(&initial);
        let finder = finder_for(MutationKind::WrapUnaryOperator, &MutatorConfig::default());
        let mut rng = ChaChaSource::seeded(7);
        let found = finder.find_mutations(&initial, &ids, &mut rng);
        let Some(Mutation::WrapUnaryOperator(w)) = found.first() else {
            panic!("expected a wrap candidate");
        };
        let m = Mutation::WrapUnaryOperator(w.clone());
        let (program, out_ids) = replay(&initial, [&m], &validator);
        let wrapper = out_ids.get_node(w.fresh_id).unwrap();
        assert!(matches!(program.kind(wrapper), NodeKind::Unary { op, .. } if *op == w.unary_op));
    }

    #[test]
    fn test_invalid_result_aborts_with_last_good_program() {
        for seed in 0..4 {
            let validator = RejectAfter {
                limit: 2,
                seen: Cell::new(0),
            };
            let cfg = MutatorConfig {
                probabilities: flat_chances(100),
                ..config(seed)
            };
            let initial = sample();
            let engine = MutationEngine::new(
                Program::new(initial.ast().clone(), &Resolver::new()),
                &cfg,
                &validator,
                ChaChaSource::seeded(seed),
            )
            .unwrap();
            let run = engine.run();

            assert_eq!(run.status, EngineStatus::Aborted, "seed {}", seed);
            assert_eq!(run.sequence.len(), 2);
            assert!(run.program.is_valid());
            assert!(run
                .diagnostics
                .iter()
                .any(|d| d.message == "rejected by test oracle"));
            let (expected, _) = replay_sequence(&initial, &run.sequence, &Resolver::new());
            assert!(expected.structurally_eq(&run.program), "seed {}", seed);
        }
    }

    #[test]
    fn test_weighted_selection_skips_zero_chance_finders() {
        let validator = Resolver::new();
        let mut probabilities = flat_chances(0);
        probabilities.replace_identifier = ChanceRange::new(100, 100);
        let cfg = MutatorConfig {
            finder_selection: FinderSelection::Weighted,
            probabilities,
            ..config(6)
        };
        let mut engine =
            MutationEngine::new(sample(), &cfg, &validator, ChaChaSource::seeded(6)).unwrap();
        assert_eq!(engine.enabled_kinds().len(), MutationKind::ALL.len());
        for _ in 0..50 {
            let State::Finding { finder } = engine.select() else {
                panic!("selection should lead to finding");
            };
            assert_eq!(engine.finders[finder].kind(), MutationKind::ReplaceIdentifier);
        }
    }

    #[test]
    fn test_weighted_selection_with_all_zero_weights_is_uniform() {
        let validator = Resolver::new();
        let cfg = MutatorConfig {
            finder_selection: FinderSelection::Weighted,
            probabilities: flat_chances(0),
            ..config(8)
        };
        let mut engine =
            MutationEngine::new(sample(), &cfg, &validator, ChaChaSource::seeded(8)).unwrap();
        let mut picked = std::collections::HashSet::new();
        for _ in 0..50 {
            let State::Finding { finder } = engine.select() else {
                panic!("selection should lead to finding");
            };
            picked.insert(engine.finders[finder].kind());
        }
        assert!(picked.len() > 1, "{:?}", picked);
    }
}
