//! These models represent the objects passed around by the engine
//!
//! There are several related formats to interact with:
//! - caller requests/responses, the crate's public surface
//! - engine messages/tools, accumulated across the turn loop
//! - model-backend wire messages/tools, sent to the provider
//! - skill-server requests, sent to the services providing capabilities
//!
//! These overlap to varying degrees. Wire formats are converted to and from
//! the internal structs at the provider boundary; nothing downstream of the
//! turn loop sees a provider-specific shape.

pub mod content;
pub mod message;
pub mod request;
pub mod response;
pub mod role;
pub mod tool;
