use std::path::{Path, PathBuf};

use swc_core::common::input::StringInput;
use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, Globals, Mark, SourceMap, GLOBALS};
use swc_core::ecma::ast::Module;
use swc_core::ecma::parser::lexer::Lexer;
use swc_core::ecma::parser::{EsSyntax, Parser, Syntax, TsSyntax};
use swc_core::ecma::transforms::base::resolver;
use swc_core::ecma::visit::VisitMutWith;

/// A module parsed and resolved by SWC.
///
/// Every identifier in `module` carries the `SyntaxContext` assigned by the SWC
/// resolver, so `(sym, ctxt)` pairs uniquely name a binding within the file.
pub struct ParsedModule {
  pub module: Module,
  /// Source-map owning the spans of `module`
  pub source_map: Lrc<SourceMap>,
}

pub struct ParseOptions<'a> {
  pub path: &'a Path,
  pub code: &'a str,
  /// Overrides the syntax inferred from the file extension
  pub syntax: Option<Syntax>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
  #[error("Failed to parse module {path}")]
  SwcParse {
    path: PathBuf,
    error: swc_core::ecma::parser::error::Error,
  },
}

/// Pick a parser syntax from the file extension.
///
/// TypeScript files get `tsx` only for `.tsx`; everything else is parsed as
/// ECMAScript with JSX enabled.
pub fn syntax_for_path(path: &Path) -> Syntax {
  match path.extension().and_then(|ext| ext.to_str()) {
    Some("ts") | Some("mts") | Some("cts") => Syntax::Typescript(TsSyntax {
      tsx: false,
      ..Default::default()
    }),
    Some("tsx") => Syntax::Typescript(TsSyntax {
      tsx: true,
      ..Default::default()
    }),
    _ => Syntax::Es(EsSyntax {
      jsx: true,
      ..Default::default()
    }),
  }
}

/// Parse `code` with SWC and run the resolver over it.
pub fn parse_module(options: ParseOptions<'_>) -> Result<ParsedModule, ParseError> {
  let ParseOptions { path, code, syntax } = options;
  let syntax = syntax.unwrap_or_else(|| syntax_for_path(path));
  let is_typescript = matches!(syntax, Syntax::Typescript(_));

  let source_map = Lrc::new(SourceMap::default());
  let source_file =
    source_map.new_source_file(Lrc::new(FileName::Real(path.to_path_buf())), code.into());

  let lexer = Lexer::new(
    syntax,
    Default::default(),
    StringInput::from(&*source_file),
    None,
  );

  let mut parser = Parser::new_from(lexer);
  let mut module = parser
    .parse_module()
    .map_err(|error| ParseError::SwcParse {
      path: path.to_path_buf(),
      error,
    })?;

  let recovered = parser.take_errors();
  if !recovered.is_empty() {
    tracing::debug!(
      "Recovered from {} syntax errors in {}",
      recovered.len(),
      path.display()
    );
  }

  GLOBALS.set(&Globals::new(), || {
    let global_mark = Mark::new();
    let unresolved_mark = Mark::new();
    module.visit_mut_with(&mut resolver(unresolved_mark, global_mark, is_typescript));
  });

  Ok(ParsedModule {
    module,
    source_map,
  })
}
