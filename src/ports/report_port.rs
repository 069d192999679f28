//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::TradekitError;
use crate::domain::strategy::BacktestStrategy;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        strategy: &BacktestStrategy,
        output_path: &str,
    ) -> Result<(), TradekitError>;
}
