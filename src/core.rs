//! Tick engine: runs a compiled program over double-buffered state
//!
//! Each `tick()` executes the whole instruction stream once. Every `Load`
//! reads the `current` generation and every `Store` writes the `next`
//! one, so all reads in a tick observe the pre-tick state no matter in
//! which order slots were emitted. Slots that no `Store` targets (inputs)
//! are carried into `next` unchanged. The buffers are then swapped.
//!
//! Loads and carries apply the lane mask, so after one tick no slot holds
//! bits outside the configured lanes.

use std::sync::Arc;

use crate::bytecode::{Instr, Program};
use crate::config::{Backend, SimConfig};
use crate::error::{Error, Result};
use crate::model::SlotIndex;

#[cfg(feature = "jit")]
use crate::jit::JitKernel;

enum Evaluator {
    Bytecode,
    #[cfg(feature = "jit")]
    Native(JitKernel),
}

pub struct Interpreter {
    program: Arc<Program>,
    /// Generation read during a tick and exposed between ticks
    current: Vec<u64>,
    /// Generation written during a tick
    next: Vec<u64>,
    /// Evaluation stack, sized to the program's proven maximum depth
    stack: Vec<u64>,
    /// Slots never stored by the program
    carried: Vec<usize>,
    lanes: usize,
    lane_mask: u64,
    ticks: u64,
    evaluator: Evaluator,
}

impl Interpreter {
    pub fn new(program: impl Into<Arc<Program>>) -> Result<Self> {
        Self::with_config(program, &SimConfig::default())
    }

    /// Validate the program's stack discipline and allocate zeroed buffers
    pub fn with_config(program: impl Into<Arc<Program>>, config: &SimConfig) -> Result<Self> {
        config.validate()?;
        let program = program.into();
        let size = program.size() as usize;
        if size > config.max_slots {
            return Err(Error::TooManySlots {
                size,
                limit: config.max_slots,
            });
        }
        let depth = program.max_stack_depth(config.stack_limit)?;

        let stored = program.stored_slots();
        let carried: Vec<usize> = (0..size)
            .filter(|&idx| !stored.contains(&(idx as SlotIndex)))
            .collect();

        let evaluator = match config.backend {
            Backend::Interpreter => Evaluator::Bytecode,
            #[cfg(feature = "jit")]
            Backend::Jit => Evaluator::Native(JitKernel::compile(&program)?),
            #[cfg(not(feature = "jit"))]
            Backend::Jit => {
                return Err(Error::InvalidConfig("jit backend is not available".into()))
            }
        };

        log::debug!(
            "interpreter ready: {} slots, {} carried, stack depth {}, {:?} backend",
            size,
            carried.len(),
            depth,
            config.backend
        );

        Ok(Self {
            program,
            current: zeroed(size)?,
            next: zeroed(size)?,
            stack: zeroed(depth)?,
            carried,
            lanes: config.lanes,
            lane_mask: config.lane_mask(),
            ticks: 0,
            evaluator,
        })
    }

    /// Load a persisted program and build an interpreter for it
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, config: &SimConfig) -> Result<Self> {
        Self::with_config(Program::from_bytes(bytes)?, config)
    }

    /// Advance one generation and return the new current state
    pub fn tick(&mut self) -> &[u64] {
        match &self.evaluator {
            Evaluator::Bytecode => execute(
                self.program.instructions(),
                &self.current,
                &mut self.next,
                &mut self.stack,
                self.lane_mask,
            ),
            #[cfg(feature = "jit")]
            Evaluator::Native(kernel) => kernel.run(&self.current, &mut self.next, self.lane_mask),
        }

        for &idx in &self.carried {
            self.next[idx] = self.current[idx] & self.lane_mask;
        }
        std::mem::swap(&mut self.current, &mut self.next);
        self.ticks += 1;
        log::trace!("tick {} done", self.ticks);
        &self.current
    }

    pub fn run_ticks(&mut self, n: usize) -> &[u64] {
        for _ in 0..n {
            self.tick();
        }
        &self.current
    }

    pub fn state(&self) -> &[u64] {
        &self.current
    }

    /// Direct write access to the current generation
    ///
    /// Writes are not masked here: lanes outside the lane mask are dropped
    /// when the next tick loads or carries the slot. Values written to
    /// computed slots are replaced on the next tick.
    pub fn state_mut(&mut self) -> &mut [u64] {
        &mut self.current
    }

    pub fn peek(&self, index: usize) -> Result<u64> {
        self.current
            .get(index)
            .copied()
            .ok_or(Error::SlotOutOfRange {
                slot: index,
                size: self.current.len(),
            })
    }

    pub fn poke(&mut self, index: usize, value: u64) -> Result<()> {
        let size = self.current.len();
        let slot = self
            .current
            .get_mut(index)
            .ok_or(Error::SlotOutOfRange { slot: index, size })?;
        *slot = value & self.lane_mask;
        Ok(())
    }

    /// Zero both generations
    pub fn reset(&mut self) {
        self.current.fill(0);
        self.next.fill(0);
        self.ticks = 0;
    }

    pub fn size(&self) -> usize {
        self.current.len()
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }
}

/// Zero-filled buffer, reporting allocation failure instead of aborting
fn zeroed(len: usize) -> Result<Vec<u64>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory { slots: len })?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Run the instruction stream once; the stack discipline was proven at construction
#[inline(always)]
fn execute(instrs: &[Instr], current: &[u64], next: &mut [u64], stack: &mut [u64], lane_mask: u64) {
    let mut sp = 0usize;
    for instr in instrs {
        match *instr {
            Instr::Load(slot) => {
                stack[sp] = current[slot as usize] & lane_mask;
                sp += 1;
            }
            Instr::And => {
                sp -= 1;
                stack[sp - 1] &= stack[sp];
            }
            Instr::Or => {
                sp -= 1;
                stack[sp - 1] |= stack[sp];
            }
            Instr::Xor => {
                sp -= 1;
                stack[sp - 1] ^= stack[sp];
            }
            Instr::Not => {
                stack[sp - 1] = !stack[sp - 1] & lane_mask;
            }
            Instr::Store(slot) => {
                sp -= 1;
                next[slot as usize] = stack[sp];
            }
        }
    }
}
