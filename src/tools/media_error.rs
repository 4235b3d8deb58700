use std::path::PathBuf;
use thiserror::Error;

/// 單一檔案處理失敗的原因
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("找不到輸入檔案: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("{tool} 執行失敗: {message}")]
    ExternalToolFailure { tool: &'static str, message: String },

    #[error("無法解碼代理片段 {}: {message}", .path.display())]
    DecodeFailure { path: PathBuf, message: String },

    #[error("操作已取消")]
    Cancelled,
}

impl MediaError {
    pub fn tool_failure(tool: &'static str, message: impl Into<String>) -> Self {
        Self::ExternalToolFailure {
            tool,
            message: message.into(),
        }
    }
}

/// 失敗分類，用於摘要與失敗清單
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InputNotFound,
    ExternalToolFailure,
    DecodeFailure,
    Cancelled,
    Other,
}

impl FailureKind {
    /// 沿著 anyhow 錯誤鏈找出 `MediaError` 並分類
    #[must_use]
    pub fn classify(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<MediaError>() {
            Some(MediaError::InputNotFound(_)) => Self::InputNotFound,
            Some(MediaError::ExternalToolFailure { .. }) => Self::ExternalToolFailure,
            Some(MediaError::DecodeFailure { .. }) => Self::DecodeFailure,
            Some(MediaError::Cancelled) => Self::Cancelled,
            None => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_classify_through_context() {
        let result: anyhow::Result<()> = Err(MediaError::tool_failure("ffmpeg", "exit 1"))
            .context("產生代理片段失敗");
        let error = result.unwrap_err();
        assert_eq!(FailureKind::classify(&error), FailureKind::ExternalToolFailure);
    }

    #[test]
    fn test_classify_plain_error() {
        let error = anyhow::anyhow!("其他錯誤");
        assert_eq!(FailureKind::classify(&error), FailureKind::Other);
    }
}
