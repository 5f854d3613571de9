//! Deep cloning of a program under an edit plan.
//!
//! A [`CloneContext`] borrows a source program and its id map, collects edits, then
//! [`finish`](CloneContext::finish)es by cloning every reachable node into a fresh arena.
//! At each source node the plan is consulted in order: an explicit substitution, then a
//! typed replacement handler, then the default field-by-field clone. List fields also get
//! their insertions and removals applied.
//!
//! Sharing is broken: a node reachable through two parent slots is cloned once per slot.
//! The first clone keeps the source id and later clones receive fresh ids. Use
//! [`CloneContext::realias`] to keep two slots pointing at one clone.
//!
//! Misuse of the plan (overlapping handlers, a replacement of the wrong node family,
//! an anchor that is not in its list) panics; these are bugs in the caller.

use crate::builder::ProgramBuilder;
use crate::node::{ChildMapper, ListField, NodeFamily, NodeIndex, NodeTag};
use crate::node_id_map::NodeIdMap;
use crate::program::{Ast, Program};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, trace};

/// Builds a destination node on demand
pub type Thunk<'a> = Rc<dyn Fn(&mut CloneContext<'a>) -> NodeIndex + 'a>;

/// Typed replacement callback; `None` falls back to the default clone
pub type Handler<'a> = Rc<dyn Fn(&mut CloneContext<'a>, NodeIndex) -> Option<NodeIndex> + 'a>;

/// What to emit in place of a source node, or to insert into a list
#[derive(Clone)]
pub enum Replacement<'a> {
    /// Clone this source node (with the plan applied)
    Source(NodeIndex),
    /// Use this already-built destination node verbatim
    Dest(NodeIndex),
    /// Build the node when its slot is reached
    Deferred(Thunk<'a>),
    /// Share the single clone of this source node
    AliasOf(NodeIndex),
}

pub type Insertion<'a> = Replacement<'a>;

impl<'a> Replacement<'a> {
    pub fn deferred(f: impl Fn(&mut CloneContext<'a>) -> NodeIndex + 'a) -> Self {
        Replacement::Deferred(Rc::new(f))
    }
}

impl std::fmt::Debug for Replacement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Replacement::Source(idx) => write!(f, "Source({})", idx),
            Replacement::Dest(idx) => write!(f, "Dest({})", idx),
            Replacement::Deferred(_) => write!(f, "Deferred"),
            Replacement::AliasOf(idx) => write!(f, "AliasOf({})", idx),
        }
    }
}

/// Which source nodes a typed handler claims
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    Family(NodeFamily),
    Tag(NodeTag),
}

impl KindFilter {
    pub fn matches(&self, tag: NodeTag) -> bool {
        match self {
            KindFilter::Family(f) => tag.family() == *f,
            KindFilter::Tag(t) => *t == tag,
        }
    }

    /// True if some node kind would be claimed by both filters
    pub fn overlaps(&self, other: &KindFilter) -> bool {
        match (self, other) {
            (KindFilter::Family(a), KindFilter::Family(b)) => a == b,
            (KindFilter::Tag(a), KindFilter::Tag(b)) => a == b,
            (KindFilter::Family(f), KindFilter::Tag(t))
            | (KindFilter::Tag(t), KindFilter::Family(f)) => t.family() == *f,
        }
    }
}

#[derive(Clone, Default)]
struct ListEdits<'a> {
    front: Vec<Insertion<'a>>,
    back: Vec<Insertion<'a>>,
    before: HashMap<NodeIndex, Vec<Insertion<'a>>>,
    after: HashMap<NodeIndex, Vec<Insertion<'a>>>,
    removed: HashSet<NodeIndex>,
}

pub struct CloneContext<'a> {
    src: &'a Program,
    src_ids: &'a NodeIdMap,
    dst: ProgramBuilder,
    dst_ids: NodeIdMap,
    substitutions: HashMap<NodeIndex, Replacement<'a>>,
    handlers: Vec<(KindFilter, Handler<'a>)>,
    list_edits: HashMap<(NodeIndex, ListField), ListEdits<'a>>,
    omitted: HashSet<NodeIndex>,
    alias_targets: HashSet<NodeIndex>,
    memo: HashMap<NodeIndex, NodeIndex>,
}

impl<'a> CloneContext<'a> {
    pub fn new(src: &'a Program, src_ids: &'a NodeIdMap) -> Self {
        Self {
            src,
            src_ids,
            dst: ProgramBuilder::new(),
            dst_ids: src_ids.successor(),
            substitutions: HashMap::new(),
            handlers: Vec::new(),
            list_edits: HashMap::new(),
            omitted: HashSet::new(),
            alias_targets: HashSet::new(),
            memo: HashMap::new(),
        }
    }

    pub fn src(&self) -> &'a Program {
        self.src
    }

    pub fn src_ids(&self) -> &'a NodeIdMap {
        self.src_ids
    }

    /// Destination arena, for synthesizing replacement nodes
    pub fn dst(&mut self) -> &mut ProgramBuilder {
        &mut self.dst
    }

    /// Destination id map, for giving synthesized nodes explicit ids
    pub fn dst_ids(&mut self) -> &mut NodeIdMap {
        &mut self.dst_ids
    }

    // Plan registration

    /// Emit `with` wherever `what` would have been cloned.
    ///
    /// # Panics
    ///
    /// If `what` already has a substitution, or is substituted by a clone of itself.
    pub fn replace(&mut self, what: NodeIndex, with: Replacement<'a>) {
        if let Replacement::Source(s) | Replacement::AliasOf(s) = &with {
            assert!(*s != what, "node {} cannot be replaced by itself", what);
        }
        if let Replacement::AliasOf(target) = &with {
            self.alias_targets.insert(*target);
        }
        trace!(node = %what, replacement = ?with, "substitution registered");
        if self.substitutions.insert(what, with).is_some() {
            panic!("node {} already has a substitution", what);
        }
    }

    pub fn replace_with(
        &mut self,
        what: NodeIndex,
        f: impl Fn(&mut CloneContext<'a>) -> NodeIndex + 'a,
    ) {
        self.replace(what, Replacement::deferred(f));
    }

    /// Make the slot holding `slot` share the clone made for `target`
    pub fn realias(&mut self, slot: NodeIndex, target: NodeIndex) {
        self.replace(slot, Replacement::AliasOf(target));
    }

    /// Route every node matching `filter` through `handler`.
    ///
    /// # Panics
    ///
    /// If a registered handler already claims an overlapping set of kinds.
    pub fn replace_all(
        &mut self,
        filter: KindFilter,
        handler: impl Fn(&mut CloneContext<'a>, NodeIndex) -> Option<NodeIndex> + 'a,
    ) {
        if let Some((existing, _)) = self.handlers.iter().find(|(f, _)| f.overlaps(&filter)) {
            panic!(
                "replacement handler for {:?} overlaps existing handler for {:?}",
                filter, existing
            );
        }
        self.handlers.push((filter, Rc::new(handler)));
    }

    fn list_edits_mut(&mut self, owner: NodeIndex, field: ListField) -> &mut ListEdits<'a> {
        assert!(
            self.src.kind(owner).list(field).is_some(),
            "node {} ({:?}) has no {:?} list",
            owner,
            self.src.kind(owner).tag(),
            field
        );
        self.list_edits.entry((owner, field)).or_default()
    }

    fn assert_in_list(&self, owner: NodeIndex, field: ListField, item: NodeIndex) {
        let list = self.src.kind(owner).list(field).unwrap_or(&[]);
        assert!(
            list.contains(&item),
            "node {} is not in the {:?} list of node {}",
            item,
            field,
            owner
        );
    }

    pub fn insert_front(&mut self, owner: NodeIndex, field: ListField, item: Insertion<'a>) {
        self.list_edits_mut(owner, field).front.push(item);
    }

    pub fn insert_back(&mut self, owner: NodeIndex, field: ListField, item: Insertion<'a>) {
        self.list_edits_mut(owner, field).back.push(item);
    }

    pub fn insert_before(
        &mut self,
        owner: NodeIndex,
        field: ListField,
        anchor: NodeIndex,
        item: Insertion<'a>,
    ) {
        self.list_edits_mut(owner, field);
        self.assert_in_list(owner, field, anchor);
        self.list_edits_mut(owner, field)
            .before
            .entry(anchor)
            .or_default()
            .push(item);
    }

    pub fn insert_after(
        &mut self,
        owner: NodeIndex,
        field: ListField,
        anchor: NodeIndex,
        item: Insertion<'a>,
    ) {
        self.list_edits_mut(owner, field);
        self.assert_in_list(owner, field, anchor);
        self.list_edits_mut(owner, field)
            .after
            .entry(anchor)
            .or_default()
            .push(item);
    }

    /// Drop `item` from the list; insertions anchored on it still happen
    pub fn remove(&mut self, owner: NodeIndex, field: ListField, item: NodeIndex) {
        self.list_edits_mut(owner, field);
        self.assert_in_list(owner, field, item);
        self.list_edits_mut(owner, field).removed.insert(item);
    }

    /// Empty the optional slot that holds `child`
    pub fn omit(&mut self, child: NodeIndex) {
        self.omitted.insert(child);
    }

    // Cloning

    /// Clone a source node with the plan applied
    pub fn clone_node(&mut self, idx: NodeIndex) -> NodeIndex {
        let tracks_alias = self.alias_targets.contains(&idx);
        if tracks_alias {
            if let Some(out) = self.memo.get(&idx) {
                return *out;
            }
        }

        let src = self.src;
        let tag = src.kind(idx).tag();
        let out = if let Some(rep) = self.substitutions.get(&idx).cloned() {
            let out = self.resolve(rep);
            self.inherit_id(idx, out);
            out
        } else if let Some(handler) = self
            .handlers
            .iter()
            .find(|(f, _)| f.matches(tag))
            .map(|(_, h)| Rc::clone(h))
        {
            match handler(self, idx) {
                Some(out) => {
                    self.inherit_id(idx, out);
                    out
                }
                None => self.clone_without_transform(idx),
            }
        } else {
            self.clone_without_transform(idx)
        };
        self.expect_family(out, tag.family(), idx);

        if tracks_alias {
            self.memo.entry(idx).or_insert(out);
        }
        out
    }

    /// Clone a source node ignoring any substitution or handler for the node itself.
    /// Its descendants still go through the plan.
    pub fn clone_without_transform(&mut self, idx: NodeIndex) -> NodeIndex {
        let src = self.src;
        let node = src.node(idx);
        let kind = node.kind.map_children(&mut ChildCloner {
            ctx: self,
            owner: idx,
        });
        let out = self.dst.push_spanned(kind, node.span);
        self.inherit_id(idx, out);
        out
    }

    fn resolve(&mut self, rep: Replacement<'a>) -> NodeIndex {
        match rep {
            Replacement::Source(s) | Replacement::AliasOf(s) => self.clone_node(s),
            Replacement::Dest(d) => {
                assert!(
                    d.index() < self.dst.len(),
                    "replacement {} is not a destination node",
                    d
                );
                d
            }
            Replacement::Deferred(f) => f(self),
        }
    }

    fn clone_list(
        &mut self,
        owner: NodeIndex,
        field: ListField,
        items: &[NodeIndex],
    ) -> Vec<NodeIndex> {
        let edits = match self.list_edits.get(&(owner, field)) {
            Some(edits) => edits.clone(),
            None => return items.iter().map(|c| self.clone_node(*c)).collect(),
        };
        let family = field.element_family();
        let mut out = Vec::with_capacity(items.len() + edits.front.len() + edits.back.len());

        for ins in &edits.front {
            out.push(self.insert(ins, family, owner));
        }
        for item in items {
            if let Some(before) = edits.before.get(item) {
                for ins in before {
                    out.push(self.insert(ins, family, owner));
                }
            }
            if !edits.removed.contains(item) {
                out.push(self.clone_node(*item));
            }
            if let Some(after) = edits.after.get(item) {
                for ins in after {
                    out.push(self.insert(ins, family, owner));
                }
            }
        }
        for ins in &edits.back {
            out.push(self.insert(ins, family, owner));
        }
        out
    }

    fn insert(&mut self, ins: &Insertion<'a>, family: NodeFamily, owner: NodeIndex) -> NodeIndex {
        let out = self.resolve(ins.clone());
        self.expect_family(out, family, owner);
        out
    }

    fn expect_family(&self, out: NodeIndex, expected: NodeFamily, context: NodeIndex) {
        let got = self.dst.kind(out).family();
        if got != expected {
            panic!(
                "clone of source node {} produced a {:?} node ({:?}) where a {:?} was expected",
                context,
                got,
                self.dst.kind(out).tag(),
                expected
            );
        }
    }

    /// Give `out` the id of `src_idx` unless it already has one or the id is taken
    fn inherit_id(&mut self, src_idx: NodeIndex, out: NodeIndex) {
        let id = self.src_ids.get_id(src_idx);
        if id.is_valid() && !self.dst_ids.contains_id(id) && !self.dst_ids.get_id(out).is_valid() {
            self.dst_ids.add(out, id);
        }
    }

    /// Clone the whole program and return the new arena with its id map.
    ///
    /// Reachable nodes without an id get fresh ones in pre-order; ids of nodes that
    /// ended up unreachable are dropped.
    pub fn finish(mut self) -> (Ast, NodeIdMap) {
        let root = self.clone_node(self.src.root());
        let CloneContext {
            src, dst, mut dst_ids, ..
        } = self;
        let ast = dst.into_ast(root);

        let reachable = ast.reachable_nodes();
        let live: HashSet<NodeIndex> = reachable.iter().copied().collect();
        dst_ids.retain(|n| live.contains(&n));
        let mut minted = 0usize;
        for idx in reachable {
            if !dst_ids.get_id(idx).is_valid() {
                let id = dst_ids.take_fresh_id();
                dst_ids.add(idx, id);
                minted += 1;
            }
        }
        debug!(
            source = %src.id(),
            nodes = live.len(),
            fresh_ids = minted,
            "clone finished"
        );
        (ast, dst_ids)
    }
}

struct ChildCloner<'c, 'a> {
    ctx: &'c mut CloneContext<'a>,
    owner: NodeIndex,
}

impl ChildMapper for ChildCloner<'_, '_> {
    fn map_child(&mut self, child: NodeIndex) -> NodeIndex {
        assert!(
            !self.ctx.omitted.contains(&child),
            "node {} fills a required slot of node {} and cannot be omitted",
            child,
            self.owner
        );
        self.ctx.clone_node(child)
    }

    fn map_optional(&mut self, child: NodeIndex) -> Option<NodeIndex> {
        if self.ctx.omitted.contains(&child) {
            None
        } else {
            Some(self.ctx.clone_node(child))
        }
    }

    fn map_list(&mut self, field: ListField, items: &[NodeIndex]) -> Vec<NodeIndex> {
        self.ctx.clone_list(self.owner, field, items)
    }
}

/// Clone `program` with an empty plan
pub fn clone_program(program: &Program, ids: &NodeIdMap) -> (Ast, NodeIdMap) {
    CloneContext::new(program, ids).finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Literal, NodeKind};
    use crate::ops::BinaryOp;
    use crate::validation::Resolver;
    use proptest::prelude::*;
    use treemut_core::NodeId;

    fn tree_size(ast: &Ast, idx: NodeIndex) -> usize {
        1 + ast
            .kind(idx)
            .children()
            .into_iter()
            .map(|c| tree_size(ast, c))
            .sum::<usize>()
    }

    /// fn main() { let a = f(1i, 2i, 3i); } with the call's index
    fn call_program() -> (Program, NodeIndex, Vec<NodeIndex>) {
        let mut b = ProgramBuilder::new();
        let args = vec![b.lit_i32(1), b.lit_i32(2), b.lit_i32(3)];
        let call = b.call("f", args.clone());
        let decl = b.let_decl("a", call);
        let body = b.block(vec![decl]);
        let main = b.function("main", vec![], None, body);
        (b.build(vec![main], &Resolver::new()), call, args)
    }

    fn shared_program() -> (Program, NodeIndex) {
        let mut b = ProgramBuilder::new();
        let shared = b.lit_i32(7);
        let sum = b.add(shared, shared);
        let decl = b.let_decl("a", sum);
        let body = b.block(vec![decl]);
        let main = b.function("main", vec![], None, body);
        (b.build(vec![main], &Resolver::new()), shared)
    }

    fn call_args(ast: &Ast) -> Vec<NodeIndex> {
        ast.reachable_nodes()
            .into_iter()
            .find_map(|n| match ast.kind(n) {
                NodeKind::Call { args, .. } => Some(args.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_empty_plan_round_trip() {
        let (program, _, _) = call_program();
        let ids = NodeIdMap::from_program(&program);
        let (ast, new_ids) = clone_program(&program, &ids);

        assert!(ast.structurally_eq(program.ast()));
        let before = program.reachable_nodes();
        let after = ast.reachable_nodes();
        assert_eq!(before.len(), after.len());
        for (s, d) in before.iter().zip(after.iter()) {
            assert_eq!(ids.get_id(*s), new_ids.get_id(*d));
        }
    }

    #[test]
    fn test_shared_child_is_dealiased() {
        let (program, shared) = shared_program();
        let ids = NodeIdMap::from_program(&program);
        let watermark = ids.len() as u32;
        let (ast, new_ids) = clone_program(&program, &ids);

        let (lhs, rhs) = ast
            .reachable_nodes()
            .into_iter()
            .find_map(|n| match ast.kind(n) {
                NodeKind::Binary { lhs, rhs, .. } => Some((*lhs, *rhs)),
                _ => None,
            })
            .unwrap();
        assert_ne!(lhs, rhs);
        assert_eq!(ast.kind(lhs), ast.kind(rhs));
        assert_eq!(ast.kind(lhs), &NodeKind::Literal(Literal::I32(7)));

        assert_eq!(new_ids.get_id(lhs), ids.get_id(shared));
        assert!(new_ids.get_id(rhs).0 > watermark);
        assert!(ast.structurally_eq(program.ast()));
    }

    #[test]
    fn test_realias_keeps_sharing() {
        let mut b = ProgramBuilder::new();
        let x = b.lit_i32(1);
        let y = b.lit_i32(1);
        let sum = b.add(x, y);
        let decl = b.let_decl("a", sum);
        let body = b.block(vec![decl]);
        let main = b.function("main", vec![], None, body);
        let program = b.build(vec![main], &Resolver::new());
        let ids = NodeIdMap::from_program(&program);

        let mut ctx = CloneContext::new(&program, &ids);
        ctx.realias(y, x);
        let (ast, new_ids) = ctx.finish();

        let (lhs, rhs) = ast
            .reachable_nodes()
            .into_iter()
            .find_map(|n| match ast.kind(n) {
                NodeKind::Binary { lhs, rhs, .. } => Some((*lhs, *rhs)),
                _ => None,
            })
            .unwrap();
        assert_eq!(lhs, rhs);
        assert_eq!(new_ids.get_id(lhs), ids.get_id(x));
        assert_eq!(new_ids.get_node(ids.get_id(y)), None);
    }

    #[test]
    fn test_list_edit_composition() {
        let (program, call, args) = call_program();
        let ids = NodeIdMap::from_program(&program);
        let b_arg = args[1];

        let mut ctx = CloneContext::new(&program, &ids);
        let x = ctx.dst().lit_i32(10);
        ctx.insert_before(call, ListField::Args, b_arg, Replacement::Dest(x));
        ctx.insert_after(
            call,
            ListField::Args,
            b_arg,
            Replacement::deferred(|ctx| ctx.dst().lit_i32(20)),
        );
        ctx.remove(call, ListField::Args, b_arg);
        let (ast, new_ids) = ctx.finish();

        let values: Vec<_> = call_args(&ast)
            .into_iter()
            .map(|a| ast.kind(a).clone())
            .collect();
        assert_eq!(
            values,
            vec![
                NodeKind::Literal(Literal::I32(1)),
                NodeKind::Literal(Literal::I32(10)),
                NodeKind::Literal(Literal::I32(20)),
                NodeKind::Literal(Literal::I32(3)),
            ]
        );
        // the removed node's id is retired, the inserted ones are fresh
        assert_eq!(new_ids.get_node(ids.get_id(b_arg)), None);
        let new_args = call_args(&ast);
        assert!(new_ids.get_id(new_args[1]).0 > ids.len() as u32);
        assert_eq!(new_ids.get_id(new_args[0]), ids.get_id(args[0]));
    }

    #[test]
    fn test_front_and_back_insertions() {
        let (program, call, _) = call_program();
        let ids = NodeIdMap::from_program(&program);
        let mut ctx = CloneContext::new(&program, &ids);
        let first = ctx.dst().lit_i32(0);
        let last = ctx.dst().lit_i32(4);
        ctx.insert_front(call, ListField::Args, Replacement::Dest(first));
        ctx.insert_back(call, ListField::Args, Replacement::Dest(last));
        let (ast, _) = ctx.finish();

        let values: Vec<_> = call_args(&ast)
            .into_iter()
            .map(|a| match ast.kind(a) {
                NodeKind::Literal(Literal::I32(v)) => *v,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_substitution_keeps_id() {
        let (program, _, args) = call_program();
        let ids = NodeIdMap::from_program(&program);
        let mut ctx = CloneContext::new(&program, &ids);
        ctx.replace_with(args[0], |ctx| ctx.dst().lit_i32(100));
        let (ast, new_ids) = ctx.finish();

        let new_args = call_args(&ast);
        assert_eq!(ast.kind(new_args[0]), &NodeKind::Literal(Literal::I32(100)));
        assert_eq!(new_ids.get_id(new_args[0]), ids.get_id(args[0]));
    }

    #[test]
    fn test_typed_handler() {
        let (program, _, _) = call_program();
        let ids = NodeIdMap::from_program(&program);
        let mut ctx = CloneContext::new(&program, &ids);
        ctx.replace_all(KindFilter::Tag(NodeTag::Literal), |ctx, idx| {
            match ctx.src().kind(idx) {
                NodeKind::Literal(Literal::I32(2)) => Some(ctx.dst().lit_i32(-2)),
                _ => None,
            }
        });
        let (ast, _) = ctx.finish();

        let values: Vec<_> = call_args(&ast)
            .into_iter()
            .map(|a| ast.kind(a).clone())
            .collect();
        assert_eq!(values[1], NodeKind::Literal(Literal::I32(-2)));
        assert_eq!(values[2], NodeKind::Literal(Literal::I32(3)));
    }

    #[test]
    fn test_omit_optional_child() {
        let mut b = ProgramBuilder::new();
        let cond = b.lit_bool(true);
        let then_body = b.block(vec![]);
        let else_body = b.block(vec![]);
        let if_stmt = b.if_stmt(cond, then_body, Some(else_body));
        let body = b.block(vec![if_stmt]);
        let main = b.function("main", vec![], None, body);
        let program = b.build(vec![main], &Resolver::new());
        let ids = NodeIdMap::from_program(&program);

        let mut ctx = CloneContext::new(&program, &ids);
        ctx.omit(else_body);
        let (ast, new_ids) = ctx.finish();
        let found = ast
            .reachable_nodes()
            .into_iter()
            .any(|n| matches!(ast.kind(n), NodeKind::If { else_branch: None, .. }));
        assert!(found);
        assert_eq!(new_ids.get_node(ids.get_id(else_body)), None);
    }

    #[test]
    #[should_panic(expected = "overlaps existing handler")]
    fn test_overlapping_handlers_panic() {
        let (program, _, _) = call_program();
        let ids = NodeIdMap::from_program(&program);
        let mut ctx = CloneContext::new(&program, &ids);
        ctx.replace_all(KindFilter::Family(NodeFamily::Expression), |_, _| None);
        ctx.replace_all(KindFilter::Tag(NodeTag::Binary), |_, _| None);
    }

    #[test]
    #[should_panic(expected = "where a Expression was expected")]
    fn test_wrong_family_substitution_panics() {
        let (program, _, args) = call_program();
        let ids = NodeIdMap::from_program(&program);
        let mut ctx = CloneContext::new(&program, &ids);
        let stmt = ctx.dst().break_stmt();
        ctx.replace(args[0], Replacement::Dest(stmt));
        ctx.finish();
    }

    #[test]
    #[should_panic(expected = "is not in the Args list")]
    fn test_anchor_outside_list_panics() {
        let (program, call, _) = call_program();
        let ids = NodeIdMap::from_program(&program);
        let mut ctx = CloneContext::new(&program, &ids);
        let x = ctx.dst().lit_i32(0);
        ctx.insert_before(call, ListField::Args, call, Replacement::Dest(x));
    }

    #[test]
    fn test_kind_filter_overlap() {
        let expr = KindFilter::Family(NodeFamily::Expression);
        assert!(expr.overlaps(&KindFilter::Tag(NodeTag::Ident)));
        assert!(!expr.overlaps(&KindFilter::Tag(NodeTag::Block)));
        assert!(!KindFilter::Tag(NodeTag::Ident).overlaps(&KindFilter::Tag(NodeTag::Binary)));
        assert!(expr.matches(NodeTag::Index));
    }

    /// Builds an expression DAG from a script; later nodes may share earlier ones
    fn build_dag(script: &[(u8, u32, u32)]) -> Program {
        let mut b = ProgramBuilder::new();
        let mut made: Vec<NodeIndex> = Vec::new();
        for (op, x, y) in script {
            let idx = if made.is_empty() || *op == 0 {
                b.lit_i32(*x as i32)
            } else {
                let lhs = made[*x as usize % made.len()];
                let rhs = made[*y as usize % made.len()];
                let op = if *op == 1 {
                    BinaryOp::Add
                } else {
                    BinaryOp::Multiply
                };
                b.binary(op, lhs, rhs)
            };
            made.push(idx);
        }
        let root = *made.last().unwrap();
        let decl = b.let_decl("v", root);
        let body = b.block(vec![decl]);
        let main = b.function("main", vec![], None, body);
        b.build(vec![main], &Resolver::new())
    }

    proptest! {
        #[test]
        fn prop_clone_dealiases_and_preserves_structure(
            script in prop::collection::vec((0u8..3, any::<u32>(), any::<u32>()), 1..12)
        ) {
            let program = build_dag(&script);
            let ids = NodeIdMap::from_program(&program);
            let (ast, new_ids) = clone_program(&program, &ids);

            prop_assert!(ast.structurally_eq(program.ast()));

            // one clone per reference occurrence
            let reachable = ast.reachable_nodes();
            prop_assert_eq!(reachable.len(), tree_size(program.ast(), program.root()));

            // every clone has a distinct valid id, and source ids are kept where present
            let mut seen = HashSet::new();
            for idx in &reachable {
                let id = new_ids.get_id(*idx);
                prop_assert!(id.is_valid());
                prop_assert!(seen.insert(id));
            }
            for (id, _) in ids.entries() {
                prop_assert!(new_ids.get_node(id).is_some());
            }
            prop_assert!(new_ids.get_node(NodeId(0)).is_none());
        }
    }
}
