pub mod error;
pub mod logger;
pub mod output;
pub mod progress;
pub mod validation;
