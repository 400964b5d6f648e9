//! Shared helpers for VM integration tests.
//!
//! Thin wrappers that verify a module and execute it through the VM,
//! capturing exit values, instruction counts, and trap diagnostics.
//! Each test binary uses a different subset of these.
#![allow(dead_code)]

use viper_il::{Module, verify};
use viper_vm::{DispatchStrategy, RunConfig, Vm, VmError};

/// Verify `module` and run it with default configuration.
pub fn verify_and_run(module: &Module) -> Result<i64, VmError> {
    verify(module).unwrap_or_else(|d| panic!("module failed verification: {}", d));
    Vm::new(module, None, RunConfig::default()).run()
}

/// Run under an explicit strategy and step cap, returning the instruction
/// count alongside the result.
pub fn run_counted(
    module: &Module,
    strategy: DispatchStrategy,
    max_steps: u64,
) -> (Result<i64, VmError>, u64) {
    verify(module).unwrap_or_else(|d| panic!("module failed verification: {}", d));
    let mut vm = Vm::new(
        module,
        None,
        RunConfig {
            dispatch: Some(strategy),
            max_steps,
            ..RunConfig::default()
        },
    );
    let result = vm.run();
    let count = vm.instruction_count();
    (result, count)
}

/// Run expecting an unhandled trap; returns the formatted diagnostic.
pub fn capture_trap(module: &Module) -> String {
    match verify_and_run(module) {
        Ok(v) => panic!("expected trap, program exited with {}", v),
        Err(e) => e.to_string(),
    }
}

/// Parse IL text, failing the test on diagnostics.
pub fn parse(text: &str) -> Module {
    viper_il::io::parse_module(text, 1).unwrap_or_else(|d| panic!("parse failed: {}", d))
}
