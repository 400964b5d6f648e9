//! Viper VM: interpreter for verified IL modules.
//!
//! Executes a `Module` with a single-threaded fetch–decode–execute loop.
//! Structured exception handling (EH stack, resume tokens), checked
//! arithmetic traps, a deterministic step cap, tracing, and the debug
//! controller all live here. Three dispatch backends (`table`, `switch`,
//! `threaded`) share one execution core and are selectable per VM instance
//! or through `VIPER_DISPATCH`.
//!
//! The VM assumes its input passed the verifier; where that assumption is
//! violated it raises `InvalidOperation` rather than aborting.

mod debug;
mod dispatch;
mod eh;
mod frame;
mod trace;
mod trap;
mod vm;

pub use debug::{Breakpoint, DebugAction, DebugCtrl, DebugScript, MemWatchHit};
pub use eh::{EhFrame, ResumeTok};
pub use frame::{Frame, Slot};
pub use trace::{TraceConfig, TraceMode, TraceSink};
pub use trap::{ErrCode, ErrorValue, TrapInfo, TrapKind, map_err_to_trap, map_trap_to_err};
pub use vm::{Control, DispatchStrategy, RunConfig, TrapDiagnostic, Vm, VmError};
