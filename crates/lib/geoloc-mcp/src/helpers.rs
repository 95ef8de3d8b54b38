use geoloc_core::control::ControlError;
use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

/// Converts a control-plane outcome into a tool result.
///
/// Pipeline failures become `{ "error": message }` with `isError` set, so the
/// caller sees them as tool errors rather than protocol errors.
pub fn tool_result<T: Serialize>(
    tool: &'static str,
    result: Result<T, ControlError>,
) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(value) => Ok(CallToolResult::success(vec![Content::json(value)?])),
        Err(err) => {
            if matches!(err, ControlError::Input(_) | ControlError::NotFound(_)) {
                debug!(tool, error = %err, "tool call rejected");
            } else {
                warn!(tool, error = %err, "tool call failed");
            }
            Ok(CallToolResult::error(vec![Content::json(
                json!({ "error": err.to_string() }),
            )?]))
        }
    }
}
