pub mod bitget_client;
pub mod order_executor;
pub mod price_oracle;

pub use bitget_client::{normalize_symbol, BitgetClient};
pub use order_executor::{BitgetOrderExecutor, OrderExecutor, OrderOutcome, ScriptedExecutor};
pub use price_oracle::{refresh_asset_prices, BitgetPriceOracle, FixedPriceOracle, PriceOracle};

use crate::portfolio::model::TradingMode;

/// 交易模式在启动时一次性确定：配置了有效凭据且关闭沙盒才走实盘，
/// 运行期不再按凭据存在与否反复推断。
pub fn select_trading_mode(has_credentials: bool, sandbox: bool) -> TradingMode {
    if has_credentials && !sandbox {
        TradingMode::Real
    } else {
        TradingMode::Simulated
    }
}
