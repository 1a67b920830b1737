// Lock module - HOLDER SERIALISATION
// Try-only locks shared by transfers and skill edits

mod holder;

pub use holder::*;
