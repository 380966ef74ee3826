pub mod cache;
pub mod health;
pub mod metrics;
pub mod story;

pub use cache::CacheClient;
pub use health::{ComponentStatus, HealthReport, HealthService};
pub use metrics::{get_metrics, init_metrics};
pub use story::StoryService;
