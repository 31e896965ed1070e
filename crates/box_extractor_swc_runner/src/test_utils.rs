use std::path::Path;

use crate::runner::{parse_module, ParseOptions, ParsedModule};

/// Parse `code` as a TSX module for tests.
///
/// Panics when the code does not parse.
pub fn parse_test_module(code: &str) -> ParsedModule {
  parse_module(ParseOptions {
    path: Path::new("test.tsx"),
    code,
    syntax: None,
  })
  .unwrap()
}
