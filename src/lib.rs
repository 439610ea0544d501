pub mod cli;
pub mod error;
pub mod format;
pub mod guard;
pub mod matchers;
pub mod migrations;
pub mod tree;
pub mod walk;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
