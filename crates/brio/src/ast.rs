use serde::{Deserialize, Serialize};

use crate::diagnostics::{Position, RuntimeError};

/// Handle into an [`AstArena`]. Stable for the arena's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

/// One field initializer in a record literal. The literal keeps its keys in
/// source order so evaluation order is observable; the resulting record does
/// not preserve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFieldInit {
    pub name: String,
    pub value: NodeId,
}

/// Tagged AST node payload, one arm per syntactic form. Literals carry their
/// raw lexeme; the evaluator parses canonical forms at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    LitNumber { text: String },
    LitText { text: String },
    LitMoney { text: String },
    LitDate { text: String },
    LitTime { text: String },
    LitDateTime { text: String },
    LitPercentage { text: String },
    LitRatio { numerator: f64, denominator: f64 },
    LitBoolean { value: bool },
    LitUnknown,
    LitNil,
    Ident { name: String },
    Unary { op: UnaryOp, expr: NodeId },
    Binary { op: BinaryOp, left: NodeId, right: NodeId },
    Member { object: NodeId, field: String },
    Index { base: NodeId, index: NodeId },
    Call { callee: NodeId, args: Vec<NodeId> },
    Assign { target: NodeId, value: NodeId },
    Block { items: Vec<NodeId> },
    ExprStmt { expr: NodeId },
    Let { name: String, init: Option<NodeId> },
    If { cond: NodeId, then_branch: NodeId, else_branch: Option<NodeId> },
    While { cond: NodeId, body: NodeId },
    For { init: Option<NodeId>, cond: Option<NodeId>, update: Option<NodeId>, body: NodeId },
    ForIn { name: String, iterable: NodeId, body: NodeId },
    Return { value: Option<NodeId> },
    Param { name: String },
    FunctionDef { name: String, params: Vec<NodeId>, body: NodeId },
    ListLit { items: Vec<NodeId> },
    RecordLit { fields: Vec<RecordFieldInit> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstNode {
    pub kind: NodeKind,
    pub pos: Position,
}

/// A complete tree as handed over by a parser: an arena plus its root.
/// The runtime takes ownership on execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstProgram {
    pub arena: AstArena,
    pub root: NodeId,
}

/// Append-only arena owning every AST node. Nodes are immutable once pushed.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AstArena {
    nodes: Vec<AstNode>,
}

const MAX_NODES: usize = (u32::MAX / 2) as usize;

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NodeKind, pos: Position) -> Result<NodeId, RuntimeError> {
        if self.nodes.len() >= MAX_NODES {
            return Err(RuntimeError::ResourceExhausted(
                "AST arena is full".to_string(),
            ));
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(AstNode { kind, pos });
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Moves every node of `other` into this arena, returning the id offset
    /// that was applied. All intra-tree handles are rebased.
    pub fn absorb(&mut self, other: AstArena) -> Result<u32, RuntimeError> {
        if self.nodes.len() + other.nodes.len() > MAX_NODES {
            return Err(RuntimeError::ResourceExhausted(
                "AST arena is full".to_string(),
            ));
        }
        let offset = self.nodes.len() as u32;
        for mut node in other.nodes {
            rebase_kind(&mut node.kind, offset);
            self.nodes.push(node);
        }
        Ok(offset)
    }
}

fn rebase(id: &mut NodeId, offset: u32) {
    id.0 += offset;
}

fn rebase_opt(id: &mut Option<NodeId>, offset: u32) {
    if let Some(id) = id {
        rebase(id, offset);
    }
}

fn rebase_kind(kind: &mut NodeKind, offset: u32) {
    match kind {
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
        | NodeKind::Ident { .. }
        | NodeKind::Param { .. } => {}
        NodeKind::Unary { expr, .. } => rebase(expr, offset),
        NodeKind::Binary { left, right, .. } => {
            rebase(left, offset);
            rebase(right, offset);
        }
        NodeKind::Member { object, .. } => rebase(object, offset),
        NodeKind::Index { base, index } => {
            rebase(base, offset);
            rebase(index, offset);
        }
        NodeKind::Call { callee, args } => {
            rebase(callee, offset);
            for arg in args {
                rebase(arg, offset);
            }
        }
        NodeKind::Assign { target, value } => {
            rebase(target, offset);
            rebase(value, offset);
        }
        NodeKind::Block { items } => {
            for item in items {
                rebase(item, offset);
            }
        }
        NodeKind::ExprStmt { expr } => rebase(expr, offset),
        NodeKind::Let { init, .. } => rebase_opt(init, offset),
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            rebase(cond, offset);
            rebase(then_branch, offset);
            rebase_opt(else_branch, offset);
        }
        NodeKind::While { cond, body } => {
            rebase(cond, offset);
            rebase(body, offset);
        }
        NodeKind::For {
            init,
            cond,
            update,
            body,
        } => {
            rebase_opt(init, offset);
            rebase_opt(cond, offset);
            rebase_opt(update, offset);
            rebase(body, offset);
        }
        NodeKind::ForIn { iterable, body, .. } => {
            rebase(iterable, offset);
            rebase(body, offset);
        }
        NodeKind::Return { value } => rebase_opt(value, offset),
        NodeKind::FunctionDef { params, body, .. } => {
            for param in params {
                rebase(param, offset);
            }
            rebase(body, offset);
        }
        NodeKind::ListLit { items } => {
            for item in items {
                rebase(item, offset);
            }
        }
        NodeKind::RecordLit { fields } => {
            for field in fields {
                rebase(&mut field.value, offset);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_get_round_trip() {
        let mut arena = AstArena::new();
        let id = arena
            .push(
                NodeKind::Ident {
                    name: "total".to_string(),
                },
                Position::new(1, 1),
            )
            .unwrap();
        let node = arena.get(id);
        assert!(matches!(&node.kind, NodeKind::Ident { name } if name == "total"));
        assert_eq!(node.pos, Position::new(1, 1));
    }

    #[test]
    fn absorb_rebases_child_handles() {
        let mut target = AstArena::new();
        target
            .push(NodeKind::LitNil, Position::SYNTHETIC)
            .unwrap();

        let mut other = AstArena::new();
        let left = other
            .push(
                NodeKind::LitNumber {
                    text: "1".to_string(),
                },
                Position::SYNTHETIC,
            )
            .unwrap();
        let right = other
            .push(
                NodeKind::LitNumber {
                    text: "2".to_string(),
                },
                Position::SYNTHETIC,
            )
            .unwrap();
        let sum = other
            .push(
                NodeKind::Binary {
                    op: BinaryOp::Add,
                    left,
                    right,
                },
                Position::SYNTHETIC,
            )
            .unwrap();

        let offset = target.absorb(other).unwrap();
        assert_eq!(offset, 1);
        let rebased = NodeId(sum.0 + offset);
        let NodeKind::Binary { left, right, .. } = &target.get(rebased).kind else {
            panic!("expected binary node");
        };
        assert_eq!(left.0, 1);
        assert_eq!(right.0, 2);
    }

    #[test]
    fn ast_serializes_with_tagged_kinds() {
        let mut arena = AstArena::new();
        arena
            .push(
                NodeKind::LitMoney {
                    text: "$12.34".to_string(),
                },
                Position::new(2, 5),
            )
            .unwrap();
        let json = serde_json::to_string(&arena).unwrap();
        assert!(json.contains("\"kind\":\"lit_money\""));
        let back: AstArena = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
    }
}
