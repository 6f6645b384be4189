use indexmap::{IndexMap, IndexSet};

use crate::ast::{AstArena, NodeId, NodeKind};
use crate::values::{TriggerEvent, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReactiveKind {
    Trigger(TriggerEvent),
    Constraint,
}

#[derive(Debug)]
pub(crate) struct Registered {
    pub(crate) id: ValueId,
    pub(crate) kind: ReactiveKind,
    /// Names extracted from the condition plus the action/healing body.
    pub(crate) watched: IndexSet<String>,
}

/// Watched-name index over registered triggers and constraints, kept in
/// global registration order so moment firing is deterministic.
#[derive(Debug, Default)]
pub(crate) struct DependencyIndex {
    registered: IndexMap<String, Registered>,
}

impl DependencyIndex {
    /// Registers or refreshes a reactive handle. Re-registering the same
    /// handle under the same name is a no-op; a different handle under an
    /// existing name takes that name's slot (and registration order).
    pub(crate) fn register(
        &mut self,
        name: impl Into<String>,
        id: ValueId,
        kind: ReactiveKind,
        watched: IndexSet<String>,
    ) {
        let name = name.into();
        if let Some(existing) = self.registered.get(&name) {
            if existing.id == id {
                return;
            }
        }
        self.registered.insert(name, Registered { id, kind, watched });
    }

    /// Removes the handle registered under `name` from every watched set.
    pub(crate) fn unregister(&mut self, name: &str, kind: ReactiveKind) -> bool {
        let matches_kind = self
            .registered
            .get(name)
            .is_some_and(|entry| match (entry.kind, kind) {
                (ReactiveKind::Trigger(_), ReactiveKind::Trigger(_)) => true,
                (ReactiveKind::Constraint, ReactiveKind::Constraint) => true,
                _ => false,
            });
        if !matches_kind {
            return false;
        }
        self.registered.shift_remove(name).is_some()
    }

    /// Constraints whose watched names contain `name`, registration order.
    /// `None` asks for every constraint (pessimistic writes).
    pub(crate) fn constraints_watching(&self, name: Option<&str>) -> Vec<ValueId> {
        self.registered
            .values()
            .filter(|entry| matches!(entry.kind, ReactiveKind::Constraint))
            .filter(|entry| name.is_none_or(|name| entry.watched.contains(name)))
            .map(|entry| entry.id)
            .collect()
    }

    /// All registered triggers in registration order, with their event kind
    /// and watched names.
    pub(crate) fn triggers(&self) -> Vec<(String, ValueId, TriggerEvent, IndexSet<String>)> {
        self.registered
            .iter()
            .filter_map(|(name, entry)| match entry.kind {
                ReactiveKind::Trigger(event) => {
                    Some((name.clone(), entry.id, event, entry.watched.clone()))
                }
                ReactiveKind::Constraint => None,
            })
            .collect()
    }

    pub(crate) fn trigger_handle(&self, name: &str) -> Option<ValueId> {
        self.registered.get(name).and_then(|entry| match entry.kind {
            ReactiveKind::Trigger(_) => Some(entry.id),
            ReactiveKind::Constraint => None,
        })
    }
}

/// Extracts the watched names of a condition or action expression with a
/// single recursive walk:
/// - an identifier contributes its name;
/// - member access on a plain identifier contributes `object.member`, any
///   deeper base contributes only the base's names;
/// - indexing a plain identifier with a constant number contributes
///   `identifier[index]`, mirroring the write-side affected-name rule;
/// - operators, calls, and statements contribute the union of their
///   children; literals contribute nothing.
pub(crate) fn extract_watched_names(arena: &AstArena, root: NodeId) -> IndexSet<String> {
    let mut names = IndexSet::new();
    walk(arena, root, &mut names);
    names
}

fn walk(arena: &AstArena, id: NodeId, names: &mut IndexSet<String>) {
    match &arena.get(id).kind {
        NodeKind::Ident { name } => {
            names.insert(name.clone());
        }
        NodeKind::Member { object, field } => {
            if let NodeKind::Ident { name } = &arena.get(*object).kind {
                names.insert(format!("{name}.{field}"));
            } else {
                walk(arena, *object, names);
            }
        }
        NodeKind::Index { base, index } => {
            match (&arena.get(*base).kind, constant_index(arena, *index)) {
                (NodeKind::Ident { name }, Some(offset)) => {
                    names.insert(format!("{name}[{offset}]"));
                }
                _ => {
                    walk(arena, *base, names);
                    walk(arena, *index, names);
                }
            }
        }
        NodeKind::Unary { expr, .. } => walk(arena, *expr, names),
        NodeKind::Binary { left, right, .. } => {
            walk(arena, *left, names);
            walk(arena, *right, names);
        }
        NodeKind::Call { callee, args } => {
            walk(arena, *callee, names);
            for arg in args {
                walk(arena, *arg, names);
            }
        }
        NodeKind::Assign { target, value } => {
            walk(arena, *target, names);
            walk(arena, *value, names);
        }
        NodeKind::Block { items } => {
            for item in items {
                walk(arena, *item, names);
            }
        }
        NodeKind::ExprStmt { expr } => walk(arena, *expr, names),
        NodeKind::Let { init, .. } => {
            if let Some(init) = init {
                walk(arena, *init, names);
            }
        }
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            walk(arena, *cond, names);
            walk(arena, *then_branch, names);
            if let Some(else_branch) = else_branch {
                walk(arena, *else_branch, names);
            }
        }
        NodeKind::While { cond, body } => {
            walk(arena, *cond, names);
            walk(arena, *body, names);
        }
        NodeKind::For {
            init,
            cond,
            update,
            body,
        } => {
            for child in [init, cond, update].into_iter().flatten() {
                walk(arena, *child, names);
            }
            walk(arena, *body, names);
        }
        NodeKind::ForIn { iterable, body, .. } => {
            walk(arena, *iterable, names);
            walk(arena, *body, names);
        }
        NodeKind::Return { value } => {
            if let Some(value) = value {
                walk(arena, *value, names);
            }
        }
        NodeKind::FunctionDef { body, .. } => walk(arena, *body, names),
        NodeKind::ListLit { items } => {
            for item in items {
                walk(arena, *item, names);
            }
        }
        NodeKind::RecordLit { fields } => {
            for field in fields {
                walk(arena, field.value, names);
            }
        }
        NodeKind::LitNumber { .. }
        | NodeKind::LitText { .. }
        | NodeKind::LitMoney { .. }
        | NodeKind::LitDate { .. }
        | NodeKind::LitTime { .. }
        | NodeKind::LitDateTime { .. }
        | NodeKind::LitPercentage { .. }
        | NodeKind::LitRatio { .. }
        | NodeKind::LitBoolean { .. }
        | NodeKind::LitUnknown
        | NodeKind::LitNil
        | NodeKind::Param { .. } => {}
    }
}

/// A non-negative integer literal usable as a static index.
pub(crate) fn constant_index(arena: &AstArena, id: NodeId) -> Option<i64> {
    let NodeKind::LitNumber { text } = &arena.get(id).kind else {
        return None;
    };
    let value: f64 = text.parse().ok()?;
    if value.fract() != 0.0 || value < 0.0 {
        return None;
    }
    Some(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;
    use crate::diagnostics::Position;

    fn ident(arena: &mut AstArena, name: &str) -> NodeId {
        arena
            .push(
                NodeKind::Ident {
                    name: name.to_string(),
                },
                Position::SYNTHETIC,
            )
            .unwrap()
    }

    #[test]
    fn member_access_on_identifier_emits_dotted_name() {
        let mut arena = AstArena::new();
        let account = ident(&mut arena, "account");
        let balance = arena
            .push(
                NodeKind::Member {
                    object: account,
                    field: "balance".to_string(),
                },
                Position::SYNTHETIC,
            )
            .unwrap();
        let limit = ident(&mut arena, "limit");
        let cmp = arena
            .push(
                NodeKind::Binary {
                    op: BinaryOp::Gt,
                    left: balance,
                    right: limit,
                },
                Position::SYNTHETIC,
            )
            .unwrap();

        let names = extract_watched_names(&arena, cmp);
        let collected: Vec<&String> = names.iter().collect();
        assert_eq!(collected, ["account.balance", "limit"]);
    }

    #[test]
    fn deep_member_chain_emits_object_names_only() {
        let mut arena = AstArena::new();
        let a = ident(&mut arena, "a");
        let ab = arena
            .push(
                NodeKind::Member {
                    object: a,
                    field: "b".to_string(),
                },
                Position::SYNTHETIC,
            )
            .unwrap();
        let abc = arena
            .push(
                NodeKind::Member {
                    object: ab,
                    field: "c".to_string(),
                },
                Position::SYNTHETIC,
            )
            .unwrap();

        let names = extract_watched_names(&arena, abc);
        let collected: Vec<&String> = names.iter().collect();
        assert_eq!(collected, ["a.b"]);
    }

    #[test]
    fn constant_list_index_emits_bracketed_name() {
        let mut arena = AstArena::new();
        let xs = ident(&mut arena, "xs");
        let zero = arena
            .push(
                NodeKind::LitNumber {
                    text: "0".to_string(),
                },
                Position::SYNTHETIC,
            )
            .unwrap();
        let indexed = arena
            .push(NodeKind::Index { base: xs, index: zero }, Position::SYNTHETIC)
            .unwrap();

        let names = extract_watched_names(&arena, indexed);
        assert!(names.contains("xs[0]"));
    }

    #[test]
    fn registration_is_idempotent_per_handle() {
        let mut index = DependencyIndex::default();
        let watched: IndexSet<String> = ["x".to_string()].into_iter().collect();
        index.register("c1", ValueId(1), ReactiveKind::Constraint, watched.clone());
        index.register("c1", ValueId(1), ReactiveKind::Constraint, watched);
        assert_eq!(index.constraints_watching(Some("x")), vec![ValueId(1)]);

        assert!(index.unregister("c1", ReactiveKind::Constraint));
        assert!(!index.unregister("c1", ReactiveKind::Constraint));
        assert!(index.constraints_watching(Some("x")).is_empty());
    }

    #[test]
    fn pessimistic_lookup_returns_every_constraint() {
        let mut index = DependencyIndex::default();
        index.register(
            "c1",
            ValueId(1),
            ReactiveKind::Constraint,
            ["x".to_string()].into_iter().collect(),
        );
        index.register(
            "c2",
            ValueId(2),
            ReactiveKind::Constraint,
            ["y".to_string()].into_iter().collect(),
        );
        assert_eq!(
            index.constraints_watching(None),
            vec![ValueId(1), ValueId(2)]
        );
        assert_eq!(index.constraints_watching(Some("y")), vec![ValueId(2)]);
    }
}
