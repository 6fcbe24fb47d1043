pub mod analytics;
pub mod auth;
pub mod completion;
pub mod model;
pub mod store;
pub mod streaming;
pub mod template;

pub use analytics::AnalyticsHandle;
pub use auth::{AuthService, StaticTokenAuth};
pub use completion::CompletionSideChannel;
pub use model::CompletionModel;
pub use store::{ChatStore, MemoryStore};
pub use streaming::{StreamRegistry, StreamingBuffer};
pub use template::TemplateEngine;
