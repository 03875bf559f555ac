//! dealflow: the agentic tool-orchestration engine behind a sales-automation
//! backend. Turns one high-level request into a bounded multi-turn exchange
//! with a model backend, routing the model's tool calls to skill servers,
//! syncing qualifying results to the CRM off the response path, and parsing
//! the final free-form answer into structured fields.

pub mod context;
pub mod errors;
pub mod executor;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod persona;
pub mod providers;
pub mod registry;
pub mod skills;
pub mod sync;

pub use models::request::{Request, RequestOptions, TaskType};
pub use models::response::Response;
pub use orchestrator::Orchestrator;
pub use registry::{Category, SkillRegistry};
