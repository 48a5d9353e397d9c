pub mod checks;
pub mod manager;
pub mod models;
pub mod runner;


pub use checks::FilesystemCheck;
pub use manager::{HealthCheckManager, ManagerConfig, ServiceInfo, DEFAULT_CHECK_DELAY, UPTIME_CHECK_KEY};
pub use models::{aggregate_status, ComponentHealth, ComponentType, HealthStatus, SystemHealth};
pub use runner::{blocking, BlockingCheck, CheckFunction, CheckRunner, CHECK_FAILURE_OUTPUT};
