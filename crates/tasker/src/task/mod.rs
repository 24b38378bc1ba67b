//! Tasks and the record store protocol that persists them.

mod manager;
mod model;
mod request;

pub use manager::*;
pub use model::*;
pub use request::*;
