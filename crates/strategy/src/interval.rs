//! Timer-driven strategy loop

use crate::error::StrategyResult;
use crate::strategy::{Strategy, StrategyContext, StrategyModel};
use async_trait::async_trait;
use log::{debug, error, info};
use std::time::Duration;

/// Runs `setup`, then `on_update` every `interval` until shutdown, then
/// `tear_down`
///
/// An `on_update` error is handed to [`StrategyModel::on_error`]; the loop
/// keeps going unless that returns `Break`. A failed `setup` skips the loop
/// but still runs `tear_down`.
pub struct IntervalStrategy<M> {
    name: String,
    interval: Duration,
    model: M,
}

impl<M: StrategyModel> IntervalStrategy<M> {
    pub fn new(name: impl Into<String>, interval: Duration, model: M) -> Self {
        Self {
            name: name.into(),
            interval,
            model,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    async fn run_loop(&self, ctx: &StrategyContext) {
        let mut shutdown = ctx.shutdown.clone();
        let mut cycles = 0u64;

        while !shutdown.is_shutdown() {
            cycles += 1;
            if let Err(e) = self.model.on_update(ctx).await {
                error!("[{}] Update {} failed: {}", self.name, cycles, e);
                if self.model.on_error(&e).is_break() {
                    info!("[{}] Loop stopped by error hook", self.name);
                    return;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => {}
            }
        }
        debug!("[{}] Loop exited after {} update(s)", self.name, cycles);
    }
}

#[async_trait]
impl<M: StrategyModel> Strategy for IntervalStrategy<M> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, ctx: StrategyContext) -> StrategyResult<()> {
        info!(
            "[{}] Strategy started on {} market(s), every {:?}",
            self.name,
            ctx.markets.len(),
            self.interval
        );

        let setup = self.model.setup(&ctx).await;
        match &setup {
            Ok(()) => self.run_loop(&ctx).await,
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

        info!("[{}] Strategy stopped", self.name);
        setup
    }
}
