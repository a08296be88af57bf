use log::{debug, warn};
use meridian_ports::{ExchangeError, ExchangeResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{ExchangeAdapter, RestRequest};
use crate::transport::Transport;

/// Adapter plus transport, with the request deadline applied
pub(crate) struct RestClient<A> {
    pub(crate) adapter: Arc<A>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl<A> Clone for RestClient<A> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            transport: Arc::clone(&self.transport),
            timeout: self.timeout,
        }
    }
}

impl<A: ExchangeAdapter> RestClient<A> {
    pub(crate) fn new(adapter: Arc<A>, transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            adapter,
            transport,
            timeout,
        }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Perform `request`, failing with `Timeout` past the deadline
    pub(crate) async fn fetch(&self, request: RestRequest<'_>) -> ExchangeResult<Value> {
        let call = self.adapter.rest_call(&request)?;
        debug!("{} {}", self.adapter.name(), call);

        let payload = tokio::time::timeout(self.timeout, self.transport.call(call))
            .await
            .map_err(|_| {
                warn!(
                    "{} {} request timed out after {:?}",
                    self.adapter.name(),
                    request.label(),
                    self.timeout
                );
                ExchangeError::Timeout
            })??;

        self.adapter.check_error(&payload)?;
        Ok(payload)
    }
}
