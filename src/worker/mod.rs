// Worker module - AFTER THE COMMIT
// Asynchronous bookkeeping decoupled from the atomic transfer commit

mod stats;

pub use stats::*;
