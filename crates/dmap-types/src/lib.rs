pub mod variable;
pub mod assignment;
pub mod config;
pub mod errors;

pub use variable::*;
pub use assignment::*;
pub use config::*;
pub use errors::*;
