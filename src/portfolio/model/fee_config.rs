use serde::{Deserialize, Serialize};

/// 手续费配置，进程级单例，不区分资产组
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeConfig {
    /// 单边费率百分比，合法范围 [0, 10]
    pub trading_fee_percent: f64,
    pub enabled: bool,
}

impl FeeConfig {
    pub const MAX_FEE_PERCENT: f64 = 10.0;

    /// 校验费率范围，越界时拒绝，不做部分更新
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.trading_fee_percent.is_finite()
            || self.trading_fee_percent < 0.0
            || self.trading_fee_percent > Self::MAX_FEE_PERCENT
        {
            anyhow::bail!(
                "手续费率必须在 [0, {}] 之间: {}",
                Self::MAX_FEE_PERCENT,
                self.trading_fee_percent
            );
        }
        Ok(())
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            trading_fee_percent: 0.1,
            enabled: false,
        }
    }
}
