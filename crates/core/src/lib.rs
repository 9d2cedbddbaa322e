pub mod errors;
pub mod survey;
pub mod sync;

pub use errors::{Error, Result};
