//! Wait for an uploaded deploy to finish processing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::app::options::ReadinessOptions;
use crate::errors::SyncError;
use crate::http::DeployApi;
use crate::models::deploy::Deploy;
use crate::sync::FailedSync;

/// Poll the deploy until it is `ready`.
///
/// A zero `timeout` uses `options.default_timeout`. The remote `error` state
/// and any fetch error end the wait immediately. Either way the last deploy
/// seen is handed back to the caller.
pub async fn wait_for_ready(
    api: Arc<dyn DeployApi>,
    deploy: Deploy,
    timeout: Duration,
    options: &ReadinessOptions,
) -> Result<Deploy, FailedSync> {
    if deploy.state.is_ready() {
        return Ok(deploy);
    }

    let timeout = options.effective_timeout(timeout);
    info!(
        "Waiting up to {:?} for deploy {} to be ready...",
        timeout, deploy.id
    );

    let timed_out = Arc::new(AtomicBool::new(false));
    let timer = {
        let timed_out = Arc::clone(&timed_out);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            timed_out.store(true, Ordering::SeqCst);
        })
    };

    let (tx, rx) = oneshot::channel();
    let poller = Poller {
        api,
        interval: options.poll_interval,
        timeout,
        timed_out,
    };
    tokio::spawn(async move {
        let result = poller.run(deploy).await;
        let _ = tx.send(result);
    });

    let result = rx.await;
    timer.abort();

    match result {
        Ok(result) => result,
        Err(_) => Err(FailedSync::from(SyncError::Internal(
            "readiness poller stopped without a result".to_string(),
        ))),
    }
}

struct Poller {
    api: Arc<dyn DeployApi>,
    interval: Duration,
    timeout: Duration,
    timed_out: Arc<AtomicBool>,
}

impl Poller {
    async fn run(self, mut deploy: Deploy) -> Result<Deploy, FailedSync> {
        loop {
            tokio::time::sleep(self.interval).await;

            if self.timed_out.load(Ordering::SeqCst) {
                warn!("Deploy {} not ready after {:?}", deploy.id, self.timeout);
                return Err(FailedSync::new(SyncError::ReadinessTimeout(self.timeout), deploy));
            }

            match self.api.fetch(&deploy.id).await {
                Ok(latest) => deploy = latest,
                Err(e) => return Err(FailedSync::new(e, deploy)),
            }
            debug!("Deploy {} state: {}", deploy.id, deploy.state);

            if deploy.state.is_ready() {
                info!("Deploy {} is ready", deploy.id);
                return Ok(deploy);
            }
            if deploy.state.is_error() {
                let message = deploy.failure_message();
                return Err(FailedSync::new(SyncError::RemoteProcessing(message), deploy));
            }
        }
    }
}
