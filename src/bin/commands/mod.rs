pub mod build_cmd;
pub mod config_cmd;
pub mod fetch_cmd;
pub mod inspect_cmd;
pub mod query_cmd;
pub mod validate_cmd;

pub use build_cmd::cmd_build;
pub use config_cmd::cmd_config;
pub use fetch_cmd::cmd_fetch;
pub use inspect_cmd::cmd_inspect;
pub use query_cmd::cmd_query;
pub use validate_cmd::cmd_validate;
