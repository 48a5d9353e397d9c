pub mod settings;

pub use settings::{AppConfig, MonitorConfig, ServerConfig, ServiceConfig};
