use std::borrow::Cow;

use haloscan_core::{ClientError, ControlError};
use rmcp::ErrorData;
use rmcp::model::ErrorCode;

pub fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

/// Caller mistakes map to `INVALID_PARAMS`; upstream trouble to `INTERNAL_ERROR`.
pub fn map_control_err(err: &ControlError) -> ErrorData {
    match err {
        ControlError::InvalidTarget(_) | ControlError::Validation(_) => {
            mcp_err(ErrorCode::INVALID_PARAMS, err.to_string())
        }
        ControlError::Client(ClientError::InvalidConfig(_)) => {
            mcp_err(ErrorCode::INTERNAL_ERROR, format!("server misconfigured: {err}"))
        }
        ControlError::Client(_) | ControlError::AllStepsFailed(_) => {
            mcp_err(ErrorCode::INTERNAL_ERROR, err.to_string())
        }
    }
}
