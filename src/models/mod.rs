//! Data models

mod definition;
mod instance;
mod net;

pub use definition::*;
pub use instance::*;
pub use net::*;
