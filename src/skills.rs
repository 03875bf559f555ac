pub mod server;

pub use server::SkillServer;
