//! Buy on the first tradable bar and hold until the run ends.

use serde::{Deserialize, Serialize};

use crate::domain::{OrderRequest, FULL_EQUITY};
use crate::strategy::{Context, InitContext, Strategy, StrategyError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyAndHoldParams {
    /// Fraction of margin in (0, 1) or a whole unit count.
    pub size: f64,
}

impl Default for BuyAndHoldParams {
    fn default() -> Self {
        Self { size: FULL_EQUITY }
    }
}

#[derive(Debug, Clone)]
pub struct BuyAndHold {
    params: BuyAndHoldParams,
    ordered: bool,
}

impl Strategy for BuyAndHold {
    type Params = BuyAndHoldParams;

    fn from_params(params: Self::Params) -> Self {
        Self {
            params,
            ordered: false,
        }
    }

    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), StrategyError> {
        self.ordered = false;
        Ok(())
    }

    fn next(&mut self, ctx: &mut Context<'_>) -> Result<(), StrategyError> {
        if !self.ordered {
            ctx.open_long(OrderRequest::new().size(self.params.size))?;
            self.ordered = true;
        }
        Ok(())
    }
}
