//! Lowers a [`Model`] into stack bytecode
//!
//! Slots are emitted depth-first in child registration order. A defined
//! slot becomes `<operand code> Store idx`; an operand is either
//! `Load idx` for a slot reference or the post-order code of its
//! sub-expression. Shared sub-expressions are re-emitted at every use and
//! nothing is memoized, so the output stays a single-pass stack program.
//! Input slots never appear as store targets.

use crate::bytecode::{Instr, Program};
use crate::error::{Error, Result};
use crate::expr::{Expr, Node};
use crate::model::{Model, SlotId};

/// Compile the subtree rooted at `root`
///
/// The declared size is the model's allocation counter at this point, so
/// it covers every index handed out so far, including slots outside `root`.
pub fn compile(model: &Model, root: SlotId) -> Result<Program> {
    let mut emitter = Emitter {
        model,
        program: Program::with_size(model.peek_next_index()),
    };
    emitter.emit_slot(root)?;

    let program = emitter.program;
    log::debug!(
        "compiled '{}': {} slots, {} instructions, {} bytes",
        model.name(root),
        program.size(),
        program.instructions().len(),
        program.as_bytes().len()
    );
    Ok(program)
}

struct Emitter<'a> {
    model: &'a Model,
    program: Program,
}

enum SlotStep<'a> {
    Enter(SlotId),
    Store(SlotId, &'a Expr),
}

enum OperandStep<'e> {
    Operand(&'e Expr),
    Apply(Instr),
}

impl<'a> Emitter<'a> {
    /// Depth-first over the slot tree with an explicit work list
    fn emit_slot(&mut self, root: SlotId) -> Result<()> {
        let model = self.model;
        let mut work = vec![SlotStep::Enter(root)];

        while let Some(step) = work.pop() {
            match step {
                SlotStep::Enter(slot) => {
                    let children = model.children(slot);
                    match model.definition(slot) {
                        Some(def) => work.push(SlotStep::Store(slot, def)),
                        // Namespaces and inputs have nothing of their own to store
                        None if !children.is_empty() || model.is_input(slot) => {}
                        None => {
                            return Err(Error::Undefined {
                                name: model.name(slot).to_string(),
                            })
                        }
                    }
                    work.extend(children.iter().rev().map(|&(_, child)| SlotStep::Enter(child)));
                }
                SlotStep::Store(slot, def) => {
                    self.emit_operand(def)?;
                    self.program.push(Instr::Store(model.index_of(slot)?));
                }
            }
        }
        Ok(())
    }

    /// Post-order operand code; operands are pushed right to left so the
    /// left one is emitted first
    fn emit_operand(&mut self, expr: &Expr) -> Result<()> {
        let mut work = vec![OperandStep::Operand(expr)];

        while let Some(step) = work.pop() {
            let expr = match step {
                OperandStep::Apply(instr) => {
                    self.program.push(instr);
                    continue;
                }
                OperandStep::Operand(expr) => expr,
            };
            match expr.node() {
                Node::Ref(slot) => {
                    let idx = self.model.index_of(*slot)?;
                    self.program.push(Instr::Load(idx));
                }
                Node::Not(operand) => {
                    work.push(OperandStep::Apply(Instr::Not));
                    work.push(OperandStep::Operand(operand));
                }
                Node::And(lhs, rhs) => work.extend(binary(lhs, rhs, Instr::And)),
                Node::Or(lhs, rhs) => work.extend(binary(lhs, rhs, Instr::Or)),
                Node::Xor(lhs, rhs) => work.extend(binary(lhs, rhs, Instr::Xor)),
            }
        }
        Ok(())
    }
}

fn binary<'e>(lhs: &'e Expr, rhs: &'e Expr, op: Instr) -> [OperandStep<'e>; 3] {
    [
        OperandStep::Apply(op),
        OperandStep::Operand(rhs),
        OperandStep::Operand(lhs),
    ]
}
