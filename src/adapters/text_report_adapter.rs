//! Plain-text backtest report writer.
//!
//! Presentation lives out here in the adapter layer; the core never
//! formats anything for display.

use std::fs;

use crate::domain::backtest::{BacktestResult, BacktestStatus};
use crate::domain::error::TradekitError;
use crate::domain::strategy::BacktestStrategy;
use crate::ports::report_port::ReportPort;

pub struct TextReportAdapter;

impl TextReportAdapter {
    pub fn render(result: &BacktestResult, strategy: &BacktestStrategy) -> String {
        let m = &result.metrics;
        let status = match result.status {
            BacktestStatus::Completed => "completed",
            BacktestStatus::Cancelled => "cancelled (partial)",
        };

        let mut out = String::new();
        out.push_str(&format!("Backtest report: {}\n", strategy.name));
        out.push_str(&format!("Status:           {}\n", status));
        out.push_str(&format!("Initial balance:  {:.2}\n", result.initial_balance));
        out.push_str(&format!("Final balance:    {:.2}\n", result.final_balance));
        out.push_str(&format!("Total commission: {:.2}\n", result.total_commission));
        out.push('\n');
        out.push_str(&format!(
            "Trades: {} ({} won / {} lost / {} breakeven)\n",
            m.total_trades, m.wins, m.losses, m.breakeven
        ));
        out.push_str(&format!("Win rate:          {:.1}%\n", m.win_rate));
        out.push_str(&format!("Profit factor:     {:.2}\n", m.profit_factor));
        out.push_str(&format!("Expectancy:        {:.2}\n", m.expectancy));
        out.push_str(&format!("Total return:      {:.2}%\n", m.total_return_pct));
        out.push_str(&format!("Annualized return: {:.2}%\n", m.annualized_return_pct));
        out.push_str(&format!("Max drawdown:      {:.2}%\n", m.max_drawdown_pct));
        out.push_str(&format!("Sharpe ratio:      {:.2}\n", m.sharpe_ratio));
        out.push_str(&format!("Sortino ratio:     {:.2}\n", m.sortino_ratio));
        out.push_str(&format!("Calmar ratio:      {:.2}\n", m.calmar_ratio));
        out.push_str(&format!("Avg holding:       {:.1}h\n", m.avg_holding_hours));
        out
    }
}

impl ReportPort for TextReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        strategy: &BacktestStrategy,
        output_path: &str,
    ) -> Result<(), TradekitError> {
        fs::write(output_path, Self::render(result, strategy))?;
        Ok(())
    }
}
