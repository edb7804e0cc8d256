mod micropi;

pub mod op;

mod helpers;
mod secret;

pub use helpers::parse_boolean_flag;
pub use micropi::{MicroPi, MicroPiConversionError, PI_CURRENCY_CODE, PI_CURRENCY_CODE_LOWER};
pub use secret::Secret;
