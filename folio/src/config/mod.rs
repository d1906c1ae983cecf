pub mod parser;
pub mod types;

pub use parser::{load_or_default, parse_config, parse_config_str};
pub use types::*;
