//! C ABI exports for front-ends
//!
//! A visualization front-end creates a simulator once, then per frame
//! calls `abc_sim_tick` and reads slots from the returned state pointer
//! (or through `abc_sim_peek`). Inputs are seeded with `abc_sim_poke`.
//! Persisted bytecode is reloaded with `abc_sim_create`.

use std::collections::BTreeMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;

use crate::config::SimConfig;
use crate::core::Interpreter;
use crate::model::SlotIndex;
use crate::netlist;

// ============================================================================
// Simulator Context
// ============================================================================

/// Opaque simulator context passed to all FFI functions
pub struct AbcSimContext {
    pub sim: Interpreter,
    /// Slot names, known only when the context was built from a netlist
    pub symbols: BTreeMap<String, SlotIndex>,
}

impl AbcSimContext {
    pub fn from_bytecode(code: &[u8], config: &SimConfig) -> crate::Result<Self> {
        Ok(Self {
            sim: Interpreter::from_bytes(code, config)?,
            symbols: BTreeMap::new(),
        })
    }

    pub fn from_netlist(json: &str, config: &SimConfig) -> crate::Result<Self> {
        let model = netlist::load_model(json)?;
        let program = model.compile()?;
        Ok(Self {
            sim: Interpreter::with_config(program, config)?,
            symbols: model.symbols(),
        })
    }
}

unsafe fn write_error(error_out: *mut *mut c_char, msg: String) {
    if !error_out.is_null() {
        let msg = CString::new(msg).unwrap_or_default();
        *error_out = msg.into_raw();
    }
}

/// Parse an optional JSON config; null means defaults
unsafe fn read_config(config_json: *const c_char) -> crate::Result<SimConfig> {
    if config_json.is_null() {
        return Ok(SimConfig::default());
    }
    let text = CStr::from_ptr(config_json)
        .to_str()
        .map_err(|e| crate::Error::InvalidConfig(format!("invalid UTF-8 in config: {e}")))?;
    SimConfig::from_json(text)
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Create a simulator from compiled bytecode
/// Returns null on error, error message written to error_out if provided
#[no_mangle]
pub unsafe extern "C" fn abc_sim_create(
    code: *const u8,
    code_len: usize,
    config_json: *const c_char,
    error_out: *mut *mut c_char,
) -> *mut AbcSimContext {
    if code.is_null() {
        write_error(error_out, "bytecode pointer is null".into());
        return ptr::null_mut();
    }
    let code = slice::from_raw_parts(code, code_len);

    let result = read_config(config_json).and_then(|config| AbcSimContext::from_bytecode(code, &config));
    match result {
        Ok(ctx) => Box::into_raw(Box::new(ctx)),
        Err(e) => {
            write_error(error_out, e.to_string());
            ptr::null_mut()
        }
    }
}

/// Create a simulator from a JSON netlist, compiling it first
#[no_mangle]
pub unsafe extern "C" fn abc_sim_create_from_json(
    json: *const c_char,
    json_len: usize,
    config_json: *const c_char,
    error_out: *mut *mut c_char,
) -> *mut AbcSimContext {
    if json.is_null() {
        write_error(error_out, "netlist pointer is null".into());
        return ptr::null_mut();
    }
    let json_slice = slice::from_raw_parts(json as *const u8, json_len);
    let json_str = match std::str::from_utf8(json_slice) {
        Ok(s) => s,
        Err(e) => {
            write_error(error_out, format!("Invalid UTF-8 in JSON: {e}"));
            return ptr::null_mut();
        }
    };

    let result = read_config(config_json).and_then(|config| AbcSimContext::from_netlist(json_str, &config));
    match result {
        Ok(ctx) => Box::into_raw(Box::new(ctx)),
        Err(e) => {
            write_error(error_out, e.to_string());
            ptr::null_mut()
        }
    }
}

/// Destroy a simulator
#[no_mangle]
pub unsafe extern "C" fn abc_sim_destroy(ctx: *mut AbcSimContext) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

/// Free an error string returned by a create function
#[no_mangle]
pub unsafe extern "C" fn abc_sim_free_error(error: *mut c_char) {
    if !error.is_null() {
        drop(CString::from_raw(error));
    }
}

// ============================================================================
// Execution and state access
// ============================================================================

/// Run one tick; returns the current state (valid until the next call that mutates ctx)
#[no_mangle]
pub unsafe extern "C" fn abc_sim_tick(ctx: *mut AbcSimContext) -> *const u64 {
    if ctx.is_null() {
        return ptr::null();
    }
    (*ctx).sim.tick().as_ptr()
}

#[no_mangle]
pub unsafe extern "C" fn abc_sim_run_ticks(ctx: *mut AbcSimContext, n: usize) -> *const u64 {
    if ctx.is_null() {
        return ptr::null();
    }
    (*ctx).sim.run_ticks(n).as_ptr()
}

/// Current state vector, `abc_sim_size` elements long
#[no_mangle]
pub unsafe extern "C" fn abc_sim_state(ctx: *const AbcSimContext) -> *const u64 {
    if ctx.is_null() {
        return ptr::null();
    }
    (*ctx).sim.state().as_ptr()
}

#[no_mangle]
pub unsafe extern "C" fn abc_sim_size(ctx: *const AbcSimContext) -> usize {
    if ctx.is_null() {
        return 0;
    }
    (*ctx).sim.size()
}

/// Read a slot; returns 0 on success, -1 on error
#[no_mangle]
pub unsafe extern "C" fn abc_sim_peek(ctx: *const AbcSimContext, index: usize, out: *mut u64) -> c_int {
    if ctx.is_null() || out.is_null() {
        return -1;
    }
    match (*ctx).sim.peek(index) {
        Ok(value) => {
            *out = value;
            0
        }
        Err(_) => -1,
    }
}

/// Write a slot; returns 0 on success, -1 on error
#[no_mangle]
pub unsafe extern "C" fn abc_sim_poke(ctx: *mut AbcSimContext, index: usize, value: u64) -> c_int {
    if ctx.is_null() {
        return -1;
    }
    match (*ctx).sim.poke(index, value) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn abc_sim_reset(ctx: *mut AbcSimContext) {
    if !ctx.is_null() {
        (*ctx).sim.reset();
    }
}

/// Index of a named slot, or -1 if unknown
#[no_mangle]
pub unsafe extern "C" fn abc_sim_index_of(ctx: *const AbcSimContext, name: *const c_char) -> i64 {
    if ctx.is_null() || name.is_null() {
        return -1;
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return -1;
    };
    (*ctx)
        .symbols
        .get(name)
        .map_or(-1, |&idx| idx as i64)
}
