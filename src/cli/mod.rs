//! CLI subcommand implementations for the oddsfeed binary.

pub mod fetch;
pub mod start;
pub mod status;
pub mod stop;
