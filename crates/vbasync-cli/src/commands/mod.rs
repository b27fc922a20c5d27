pub mod common;
pub mod config;
pub mod edit;
pub mod export;
pub mod import;

pub use common::CommandOptions;
pub use config::Config;
pub use edit::{Edit, EditArgs};
pub use export::Export;
pub use import::Import;
