pub mod health;

pub use health::{handle_health, status_code_for};
