pub mod runner;
pub mod test_utils;

pub use runner::{parse_module, syntax_for_path, ParseError, ParseOptions, ParsedModule};
