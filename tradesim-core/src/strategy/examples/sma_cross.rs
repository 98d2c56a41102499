//! Moving-average crossover.
//!
//! Goes long when the fast SMA crosses above the slow SMA and short on the
//! opposite cross, closing any open position first. Optional SL/TP are set
//! as percentages of the signal bar's close.

use serde::{Deserialize, Serialize};

use crate::domain::{OrderRequest, FULL_EQUITY};
use crate::indicators::{IndicatorId, Sma};
use crate::strategy::{crossover, Context, InitContext, Strategy, StrategyError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaCrossParams {
    pub fast: usize,
    pub slow: usize,
    /// Stop-loss distance as a fraction of the close, e.g. 0.05.
    pub sl_pct: Option<f64>,
    /// Take-profit distance as a fraction of the close.
    pub tp_pct: Option<f64>,
    pub size: f64,
}

impl Default for SmaCrossParams {
    fn default() -> Self {
        Self {
            fast: 10,
            slow: 20,
            sl_pct: None,
            tp_pct: None,
            size: FULL_EQUITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmaCross {
    params: SmaCrossParams,
    fast: Option<IndicatorId>,
    slow: Option<IndicatorId>,
}

impl SmaCross {
    pub fn params(&self) -> &SmaCrossParams {
        &self.params
    }

    fn request(&self, close: f64, long: bool) -> OrderRequest {
        let side = if long { 1.0 } else { -1.0 };
        let mut req = OrderRequest::new().size(self.params.size);
        if let Some(pct) = self.params.sl_pct {
            req = req.sl(close * (1.0 - side * pct));
        }
        if let Some(pct) = self.params.tp_pct {
            req = req.tp(close * (1.0 + side * pct));
        }
        req
    }
}

impl Strategy for SmaCross {
    type Params = SmaCrossParams;

    fn from_params(params: Self::Params) -> Self {
        Self {
            params,
            fast: None,
            slow: None,
        }
    }

    fn name(&self) -> &str {
        "sma_cross"
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<(), StrategyError> {
        self.fast = Some(ctx.indicator(&Sma::new(self.params.fast))?);
        self.slow = Some(ctx.indicator(&Sma::new(self.params.slow))?);
        Ok(())
    }

    fn next(&mut self, ctx: &mut Context<'_>) -> Result<(), StrategyError> {
        let (Some(fast_id), Some(slow_id)) = (self.fast, self.slow) else {
            return Err(StrategyError::Custom("next() called before init()".into()));
        };
        let indicators = ctx.indicators();
        let (Some(fast), Some(slow)) = (indicators.values(fast_id), indicators.values(slow_id))
        else {
            return Ok(());
        };
        let Some(close) = ctx.data().last_close() else {
            return Ok(());
        };

        if crossover(fast, slow) {
            ctx.close_position(1.0)?;
            ctx.open_long(self.request(close, true))?;
        } else if crossover(slow, fast) {
            ctx.close_position(1.0)?;
            ctx.open_short(self.request(close, false))?;
        }
        Ok(())
    }
}
