//! API request handlers

mod health;
mod sms;

pub use health::*;
pub use sms::*;
