//! ABC - a tiny boolean network DSL with a bytecode tick engine
//!
//! Networks are described as a tree of named slots whose definitions are
//! boolean expressions over other slots. The compiler lowers the tree into
//! a compact stack bytecode and the interpreter evaluates it once per tick
//! over double-buffered state, so every slot advances synchronously.
//!
//! The module is organized as:
//! - expr.rs: Expression algebra and operator overloads
//! - model.rs: Node graph with lazy, dense slot indexing
//! - compiler.rs: Model to bytecode lowering
//! - bytecode.rs: Instruction set, wire format and program validation
//! - core.rs: Tick interpreter
//! - jit.rs: Cranelift native evaluator (`jit` feature)
//! - netlist.rs: JSON network descriptions
//! - ffi.rs: C ABI function exports
//!
//! ```
//! use abc_sim::{Interpreter, Model};
//!
//! let mut m = Model::new();
//! let a = m.input("a") as usize;
//! let b = m.input("b") as usize;
//! let (sa, sb) = (m.slot("a"), m.slot("b"));
//! let out = m.slot("out");
//! m.assign(out, sa & !sb).unwrap();
//!
//! let mut sim = Interpreter::new(m.compile().unwrap()).unwrap();
//! sim.poke(a, 1).unwrap();
//! sim.poke(b, 0).unwrap();
//! let out_idx = m.index_of(out).unwrap() as usize;
//! assert_eq!(sim.tick()[out_idx], 1);
//! ```

pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod core;
pub mod error;
pub mod expr;
mod ffi;
#[cfg(feature = "jit")]
pub mod jit;
pub mod model;
pub mod netlist;

pub use bytecode::{Instr, Program, ProgramStats};
pub use compiler::compile;
pub use config::{Backend, SimConfig};
pub use crate::core::Interpreter;
pub use error::{Error, Result};
pub use expr::{and, not, or, xor, Expr, Node};
pub use model::{Assignment, Key, Model, SlotId, SlotIndex};

// Re-export FFI functions at crate root for easier linking
pub use ffi::*;
