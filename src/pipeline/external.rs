//! Running external command-line tools (`magic-pdf`, `soffice`, `tesseract`).

use crate::error::DocParseError;
use std::process::{Command, Output};
use tracing::debug;

/// Longest stderr excerpt carried into an error message.
const MAX_STDERR_CHARS: usize = 2000;

/// Run `cmd` to completion; spawn failures and non-zero exits become errors.
pub fn run_tool(mut cmd: Command, tool: &str) -> Result<Output, DocParseError> {
    debug!("Running {:?}", cmd);
    let output = cmd.output().map_err(|e| DocParseError::ToolNotFound {
        tool: tool.to_string(),
        source: e,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .chars()
            .rev()
            .take(MAX_STDERR_CHARS)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return Err(DocParseError::ExternalTool {
            tool: tool.to_string(),
            detail: format!("{}: {}", output.status, tail.trim()),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_tool_not_found() {
        let err = run_tool(Command::new("definitely-not-a-real-tool-xyz"), "xyz").unwrap_err();
        assert!(matches!(err, DocParseError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_carries_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        let err = run_tool(cmd, "sh").unwrap_err();
        match err {
            DocParseError::ExternalTool { tool, detail } => {
                assert_eq!(tool, "sh");
                assert!(detail.contains("boom"), "got {detail}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn success_returns_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf ok"]);
        assert_eq!(run_tool(cmd, "sh").unwrap().stdout, b"ok");
    }
}
