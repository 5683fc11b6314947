//! Connection bootstrap
//!
//! `RocketConnector` turns queue settings into a ready [`RocketQueue`]. The
//! broker client itself comes from a caller-supplied factory, so the same
//! connector serves the real transport and the in-process broker.

use std::sync::Arc;

use tracing::info;

use crate::broker::{BrokerClient, BrokerError, Credentials};
use crate::config::QueueSettings;
use crate::jobs::JobFramework;
use crate::queue::RocketQueue;
use crate::utils::{QueueError, QueueResult};

pub struct RocketConnector<M> {
    make_client: M,
    connection_name: Option<String>,
}

impl<M, C> RocketConnector<M>
where
    M: Fn(&Credentials) -> Result<C, BrokerError>,
    C: BrokerClient,
{
    pub fn new(make_client: M) -> Self {
        Self {
            make_client,
            connection_name: None,
        }
    }

    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    /// Validate `settings`, open a broker client and build the driver.
    pub fn connect<F: JobFramework>(
        &self,
        settings: &QueueSettings,
        framework: Arc<F>,
    ) -> QueueResult<RocketQueue<C, F>> {
        settings.validate()?;

        let credentials = settings.credentials();
        let client = (self.make_client)(&credentials).map_err(|e| {
            QueueError::configuration(
                "endpoint",
                format!("cannot open broker client for {}: {e}", credentials.endpoint),
            )
        })?;

        info!(
            endpoint = %credentials.endpoint,
            instance_id = %settings.instance_id,
            group_id = %settings.group_id,
            queue = %settings.queue,
            use_message_tag = settings.use_message_tag,
            plain = settings.plain.enable,
            "connected queue driver"
        );

        let queue = RocketQueue::new(client, settings.clone(), framework);
        Ok(match &self.connection_name {
            Some(name) => queue.with_connection_name(name.clone()),
            None => queue,
        })
    }
}
