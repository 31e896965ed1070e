use std::path::PathBuf;

use crate::node_ref::NodeRef;

/// Failures that abort extraction of a single file.
///
/// Evaluation problems are never errors: they are reported as `Unresolvable`
/// boxes instead.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
  #[error("Matcher `{matcher}` failed on {node} in {}", file.display())]
  MatcherFailure {
    matcher: &'static str,
    file: PathBuf,
    node: NodeRef,
    #[source]
    source: anyhow::Error,
  },
  #[error("File {} is not part of the project index", file.display())]
  FileNotFound { file: PathBuf },
}

impl ExtractError {
  pub fn file(&self) -> &PathBuf {
    match self {
      ExtractError::MatcherFailure { file, .. } => file,
      ExtractError::FileNotFound { file } => file,
    }
  }
}
