//! Readiness probe run before load starts

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::error::{LoadgenError, LoadgenResult};
use crate::generator::RequestGenerator;

/// Delay between readiness polls
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll the target's health endpoint until it answers 200
///
/// A zero `health_timeout_secs` skips the probe entirely.
pub async fn wait_for_service(generator: &RequestGenerator) -> LoadgenResult<()> {
    let target = generator.target();
    if target.health_timeout_secs == 0 {
        info!("Readiness probe disabled");
        return Ok(());
    }

    let url = target.url(&target.health_path);
    let deadline = Instant::now() + Duration::from_secs(target.health_timeout_secs);
    info!("Waiting for {} to become ready", url);

    loop {
        match generator.probe(&target.health_path).await {
            Some(200) => {
                info!("Target is ready");
                return Ok(());
            }
            Some(status) => warn!("Health check returned status {}", status),
            None => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(LoadgenError::TargetUnavailable(format!(
                "{} not ready after {}s",
                url, target.health_timeout_secs
            )));
        }
        // The last wait is cut short so one poll lands on the deadline
        sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}
