// Identity module - Holder names (a holder's name is also its coin's name)

mod holder;

pub use holder::*;
