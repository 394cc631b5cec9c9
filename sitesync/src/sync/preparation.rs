//! Preparation polling for asynchronously submitted deploys

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app::options::PreparationOptions;
use crate::errors::SyncError;
use crate::http::DeployApi;
use crate::models::deploy::Deploy;

/// Poll until the deploy is `prepared` or `ready`.
///
/// Fetch errors are tolerated and retried after `retry_delay`; only the
/// overall timeout or a remote `error` state ends the loop early. `deploy`
/// is refreshed in place with every successful poll.
pub async fn wait_for_preparation(
    api: &dyn DeployApi,
    deploy: &mut Deploy,
    options: &PreparationOptions,
) -> Result<(), SyncError> {
    info!("Waiting for deploy {} to be prepared...", deploy.id);
    let started_at = Instant::now();

    loop {
        match api.fetch(&deploy.id).await {
            Ok(latest) => {
                *deploy = latest;
                debug!("Deploy state: {}", deploy.state);

                if deploy.state.is_prepared() {
                    info!(
                        "Deploy {} prepared after {:?}",
                        deploy.id,
                        started_at.elapsed()
                    );
                    return Ok(());
                }
                if deploy.state.is_error() {
                    return Err(SyncError::PreparationFailed(deploy.failure_message()));
                }
            }
            Err(e) => {
                warn!("Error fetching deploy {}: {}", deploy.id, e);
                tokio::time::sleep(options.retry_delay).await;
            }
        }

        if started_at.elapsed() >= options.timeout {
            return Err(SyncError::PreparationTimeout(options.timeout));
        }

        tokio::time::sleep(options.poll_interval).await;
    }
}
