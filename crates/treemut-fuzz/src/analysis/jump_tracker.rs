//! Which statements contain a loop break or a return.

use super::parents::ParentMap;
use std::collections::HashSet;
use treemut_ir::{NodeIndex, NodeKind, NodeTag, Program};

/// Jump facts for every statement of one program
#[derive(Debug, Clone, Default)]
pub struct JumpTracker {
    contains_break_for_innermost_loop: HashSet<NodeIndex>,
    contains_return: HashSet<NodeIndex>,
    loops_with_break: HashSet<NodeIndex>,
}

impl JumpTracker {
    pub fn new(program: &Program, parents: &ParentMap) -> Self {
        let mut tracker = Self::default();
        for idx in program.reachable_nodes() {
            match program.kind(idx) {
                NodeKind::Break | NodeKind::BreakIf { .. } => {
                    tracker.track_break(program, parents, idx)
                }
                NodeKind::Return { .. } => tracker.track_return(program, parents, idx),
                _ => {}
            }
        }
        tracker
    }

    fn track_break(&mut self, program: &Program, parents: &ParentMap, brk: NodeIndex) {
        // a plain break inside a switch leaves the switch, not the loop
        let is_break_if = matches!(program.kind(brk), NodeKind::BreakIf { .. });
        let target = parents.ancestors(brk).find(|a| {
            let tag = program.kind(*a).tag();
            tag.is_loop() || (!is_break_if && tag == NodeTag::Switch)
        });
        let Some(target) = target else {
            return;
        };
        if !program.kind(target).tag().is_loop() {
            return;
        }
        self.loops_with_break.insert(target);
        self.contains_break_for_innermost_loop.insert(brk);
        for a in parents.ancestors(brk).take_while(|a| *a != target) {
            self.contains_break_for_innermost_loop.insert(a);
        }
    }

    fn track_return(&mut self, program: &Program, parents: &ParentMap, ret: NodeIndex) {
        self.contains_return.insert(ret);
        for a in parents.ancestors(ret) {
            if program.kind(a).tag() == NodeTag::Function {
                break;
            }
            self.contains_return.insert(a);
        }
    }

    /// True if `stmt` is or contains a break that leaves its innermost enclosing loop.
    /// A loop's own breaks do not count for the loop statement itself.
    pub fn contains_break_for_innermost_loop(&self, stmt: NodeIndex) -> bool {
        self.contains_break_for_innermost_loop.contains(&stmt)
    }

    pub fn contains_return(&self, stmt: NodeIndex) -> bool {
        self.contains_return.contains(&stmt)
    }

    /// True if some break or break-if targets the loop statement `stmt`
    pub fn loop_has_break(&self, stmt: NodeIndex) -> bool {
        self.loops_with_break.contains(&stmt)
    }
}
