// Parameter compilation module
//
// - coercion: type-directed conversion of raw user input
// - report:   builds the per-binding SerializationReport from parameters + value store
//
//   coercion.rs (leaf)
//       ↑
//   report.rs (walks parameters, dispatches on schema kind)

pub mod coercion;
pub mod report;

pub use coercion::*;
pub use report::*;
