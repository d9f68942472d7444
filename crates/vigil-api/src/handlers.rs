//! Request handlers.

pub mod detect;
pub mod health;
pub mod page;

pub use detect::*;
pub use health::*;
pub use page::*;
