pub mod backend;
pub mod backends;
pub mod factory;
pub mod parser;
pub mod plan;
pub mod prompt;
pub mod types;
