//! Boolean expression algebra
//!
//! Expressions are immutable and reference counted, so one sub-expression
//! can be shared by many parents and the whole network forms a DAG.
//! They are built with the `&`, `|`, `^` and `!` operators on [`Expr`]
//! and [`SlotId`], or with the free functions [`and`], [`or`], [`xor`]
//! and [`not`].
//!
//! Dropping an expression releases its nodes with an explicit work list,
//! so arbitrarily long operand chains never recurse on the native stack.

use std::mem;
use std::ops::{BitAnd, BitOr, BitXor, Not};
use std::rc::Rc;

use crate::model::SlotId;

/// One expression node
#[derive(Debug)]
pub enum Node {
    /// Reads one state slot of the previous generation
    Ref(SlotId),
    Not(Expr),
    And(Expr, Expr),
    Or(Expr, Expr),
    Xor(Expr, Expr),
}

/// Shared handle to an immutable expression node
#[derive(Debug, Clone)]
pub struct Expr(Rc<Node>);

impl Expr {
    fn new(node: Node) -> Self {
        Expr(Rc::new(node))
    }

    pub fn reference(slot: SlotId) -> Self {
        Expr::new(Node::Ref(slot))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    /// True when both handles point at the same node
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

thread_local! {
    /// Placeholder swapped into operands that are being released
    static DETACHED: Rc<Node> = Rc::new(Node::Ref(SlotId::ROOT));
}

impl Node {
    /// Move the operands of this node into `out`, leaving placeholders
    fn detach_operands(&mut self, out: &mut Vec<Rc<Node>>) {
        let Ok(placeholder) = DETACHED.try_with(Rc::clone) else {
            // Thread teardown; fall back to the recursive drop
            return;
        };
        let mut take = |operand: &mut Expr| {
            if !Rc::ptr_eq(&operand.0, &placeholder) {
                out.push(mem::replace(&mut operand.0, Rc::clone(&placeholder)));
            }
        };
        match self {
            Node::Ref(_) => {}
            Node::Not(operand) => take(operand),
            Node::And(lhs, rhs) | Node::Or(lhs, rhs) | Node::Xor(lhs, rhs) => {
                take(lhs);
                take(rhs);
            }
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_operands(&mut pending);
        while let Some(rc) = pending.pop() {
            // Shared operands are still alive elsewhere and stop the walk
            if let Ok(mut node) = Rc::try_unwrap(rc) {
                node.detach_operands(&mut pending);
            }
        }
    }
}

impl From<SlotId> for Expr {
    fn from(slot: SlotId) -> Self {
        Expr::reference(slot)
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}

pub fn and(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Expr {
    Expr::new(Node::And(lhs.into(), rhs.into()))
}

pub fn or(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Expr {
    Expr::new(Node::Or(lhs.into(), rhs.into()))
}

pub fn xor(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Expr {
    Expr::new(Node::Xor(lhs.into(), rhs.into()))
}

pub fn not(operand: impl Into<Expr>) -> Expr {
    Expr::new(Node::Not(operand.into()))
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $build:ident) => {
        impl<R: Into<Expr>> $trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                $build(self, rhs)
            }
        }

        impl<R: Into<Expr>> $trait<R> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                $build(self.clone(), rhs)
            }
        }

        impl<R: Into<Expr>> $trait<R> for SlotId {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                $build(self, rhs)
            }
        }
    };
}

binary_operator!(BitAnd, bitand, and);
binary_operator!(BitOr, bitor, or);
binary_operator!(BitXor, bitxor, xor);

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        not(self)
    }
}

impl Not for &Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        not(self.clone())
    }
}

impl Not for SlotId {
    type Output = Expr;

    fn not(self) -> Expr {
        not(self)
    }
}
