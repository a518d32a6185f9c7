//! Request handlers.

pub mod debug;
pub mod generate;
pub mod health;
pub mod outputs;

pub use debug::*;
pub use generate::*;
pub use health::*;
pub use outputs::*;
