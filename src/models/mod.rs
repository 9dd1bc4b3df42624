//! Data models for persisted tokens and service responses

mod grant;
mod token;

pub use grant::*;
pub use token::*;
