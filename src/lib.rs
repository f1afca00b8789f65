pub mod commands;
pub mod config;
pub mod error;
pub mod grouper;
pub mod hierarchy;
pub mod host;
pub mod logging;
pub mod model;
pub mod presenter;
pub mod registry;
pub mod render;
pub mod scanner;
pub mod session;
pub mod syntax;
pub mod workspace_host;
