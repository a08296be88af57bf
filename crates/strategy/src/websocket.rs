//! Feed-driven strategy
//!
//! Updates arrive through the exchange feeds, so this driver only brackets
//! the run: `setup` (which is expected to call `feed_connect`), park until
//! shutdown, `tear_down`.

use crate::error::StrategyResult;
use crate::strategy::{Strategy, StrategyContext, StrategyModel};
use async_trait::async_trait;
use log::{error, info};

pub struct WebsocketStrategy<M> {
    name: String,
    model: M,
}

impl<M: StrategyModel> WebsocketStrategy<M> {
    pub fn new(name: impl Into<String>, model: M) -> Self {
        Self {
            name: name.into(),
            model,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

#[async_trait]
impl<M: StrategyModel> Strategy for WebsocketStrategy<M> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, ctx: StrategyContext) -> StrategyResult<()> {
        info!(
            "[{}] Websocket strategy started on {} market(s)",
            self.name,
            ctx.markets.len()
        );

        let setup = self.model.setup(&ctx).await;
        match &setup {
            Ok(()) => ctx.shutdown.clone().wait().await,
            Err(e) => {
                error!("[{}] Setup failed: {}", self.name, e);
                let _ = self.model.on_error(e);
            }
        }

        if let Err(e) = self.model.tear_down(&ctx).await {
            error!("[{}] Tear down failed: {}", self.name, e);
            let _ = self.model.on_error(&e);
            setup?;
            return Err(e);
        }

        info!("[{}] Websocket strategy stopped", self.name);
        setup
    }
}
