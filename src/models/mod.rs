//! Data models

mod audit;
mod campaign;
mod campaign_object;
mod generation;
mod publication;
mod social_account;

pub use audit::*;
pub use campaign::*;
pub use campaign_object::*;
pub use generation::*;
pub use publication::*;
pub use social_account::*;
