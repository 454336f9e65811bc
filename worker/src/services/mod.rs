//! Worker services implementations

pub mod model_invoker;
pub mod mysql_store;
pub mod task_coordinator;

#[cfg(test)]
pub mod tests;

pub use model_invoker::*;
pub use mysql_store::*;
pub use task_coordinator::*;
