//! Cranelift-based native evaluator for compiled programs
//!
//! The bytecode is straight-line, so its evaluation stack can be replayed
//! at compile time as a stack of SSA values: `Load` becomes a masked
//! memory load from `current`, the logic opcodes become single ALU instructions and
//! `Store` becomes a memory store into `next`. The result is one function
//! with no dispatch at all.

use std::mem;

use cranelift::prelude::*;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};

use crate::bytecode::{Instr, Program};
use crate::error::{Error, Result};

/// fn(current: *const u64, next: *mut u64, lane_mask: u64)
type TickFn = unsafe extern "C" fn(*const u64, *mut u64, u64);

/// Native code for one program; the module owns the code memory
pub struct JitKernel {
    _module: JITModule,
    tick_fn: TickFn,
    size: usize,
}

impl JitKernel {
    pub fn compile(program: &Program) -> Result<Self> {
        let mut flag_builder = settings::builder();
        flag_builder.set("opt_level", "speed").map_err(jit_err)?;
        flag_builder.set("is_pic", "false").map_err(jit_err)?;

        let isa_builder = cranelift_native::builder()
            .map_err(|e| Error::Jit(format!("failed to create ISA builder: {e}")))?;
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| Error::Jit(format!("failed to create ISA: {e}")))?;

        let builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        let mut module = JITModule::new(builder);

        let mut ctx = module.make_context();
        let pointer_type = module.target_config().pointer_type();

        let mut sig = module.make_signature();
        sig.params.push(AbiParam::new(pointer_type)); // current
        sig.params.push(AbiParam::new(pointer_type)); // next
        sig.params.push(AbiParam::new(types::I64)); // lane_mask
        ctx.func.signature = sig;

        let func_id = module
            .declare_function("tick", Linkage::Export, &ctx.func.signature)
            .map_err(jit_err)?;

        let mut builder_ctx = FunctionBuilderContext::new();
        let mut builder = FunctionBuilder::new(&mut ctx.func, &mut builder_ctx);

        let entry_block = builder.create_block();
        builder.append_block_params_for_function_params(entry_block);
        builder.switch_to_block(entry_block);
        builder.seal_block(entry_block);

        let current_ptr = builder.block_params(entry_block)[0];
        let next_ptr = builder.block_params(entry_block)[1];
        let lane_mask = builder.block_params(entry_block)[2];

        let mut stack: Vec<Value> = Vec::new();
        for (pc, instr) in program.instructions().iter().enumerate() {
            match *instr {
                Instr::Load(slot) => {
                    let offset = slot_offset(slot)?;
                    let value = builder
                        .ins()
                        .load(types::I64, MemFlags::trusted(), current_ptr, offset);
                    stack.push(builder.ins().band(value, lane_mask));
                }
                Instr::And | Instr::Or | Instr::Xor => {
                    let rhs = stack.pop().ok_or(Error::StackUnderflow { pc })?;
                    let lhs = stack.pop().ok_or(Error::StackUnderflow { pc })?;
                    let value = match *instr {
                        Instr::And => builder.ins().band(lhs, rhs),
                        Instr::Or => builder.ins().bor(lhs, rhs),
                        _ => builder.ins().bxor(lhs, rhs),
                    };
                    stack.push(value);
                }
                Instr::Not => {
                    let operand = stack.pop().ok_or(Error::StackUnderflow { pc })?;
                    let inverted = builder.ins().bnot(operand);
                    stack.push(builder.ins().band(inverted, lane_mask));
                }
                Instr::Store(slot) => {
                    let value = stack.pop().ok_or(Error::StackUnderflow { pc })?;
                    let offset = slot_offset(slot)?;
                    builder.ins().store(MemFlags::trusted(), value, next_ptr, offset);
                }
            }
        }

        builder.ins().return_(&[]);
        builder.finalize();

        module.define_function(func_id, &mut ctx).map_err(jit_err)?;
        module.clear_context(&mut ctx);
        module.finalize_definitions().map_err(jit_err)?;

        let code_ptr = module.get_finalized_function(func_id);
        let tick_fn = unsafe { mem::transmute::<*const u8, TickFn>(code_ptr) };

        log::debug!(
            "jit compiled {} instructions for {} slots",
            program.instructions().len(),
            program.size()
        );

        Ok(Self {
            _module: module,
            tick_fn,
            size: program.size() as usize,
        })
    }

    /// Evaluate one generation from `current` into `next`
    pub fn run(&self, current: &[u64], next: &mut [u64], lane_mask: u64) {
        assert!(current.len() >= self.size && next.len() >= self.size);
        // Every offset baked into the code is below `size`, checked above
        unsafe { (self.tick_fn)(current.as_ptr(), next.as_mut_ptr(), lane_mask) }
    }
}

fn slot_offset(slot: u32) -> Result<i32> {
    i32::try_from(slot as u64 * 8)
        .map_err(|_| Error::Jit(format!("slot {slot} is beyond the addressable range")))
}

fn jit_err(e: impl std::fmt::Display) -> Error {
    Error::Jit(e.to_string())
}
