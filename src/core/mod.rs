pub mod config;
pub mod i18n;

pub use config::{AppConfig, UpdateConfig};
pub use i18n::{Language, Translator};
