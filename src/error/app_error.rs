use thiserror::Error;

/// 应用错误
#[derive(Error, Debug)]
pub enum AppError {
    /// 业务错误
    #[error("业务错误: {0}")]
    BizError(String),

    /// 资源不存在
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 存储错误
    #[error("存储错误: {0}")]
    StoreError(String),

    /// 配置输入非法
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("Bitget API错误: {0}")]
    BitgetApiError(String),

    /// 未知错误
    #[error("未知错误: {0}")]
    Unknown(String),
}

impl AppError {
    /// 是否为调用方可直接修正的输入类错误
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::NotFound(_) | AppError::ConfigError(_))
    }
}
