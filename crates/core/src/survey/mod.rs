//! Survey domain: canonical entities and the transfer records clients send.

mod survey_model;
mod survey_traits;
mod transfer_model;

pub use survey_model::*;
pub use survey_traits::*;
pub use transfer_model::*;
