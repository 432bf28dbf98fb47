// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::Result;
use kube::{discovery::Discovery, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const CORE_GROUP: &str = "core.gardener.cloud";

/// Wait for the Gardener core API group to be served.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_gardener_crds(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match check_gardener_crds_exist(client).await {
            Ok(true) => {
                info!("Gardener API group {} is available", CORE_GROUP);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "Gardener API group {} not yet available, waiting {} seconds...",
                    CORE_GROUP, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for Gardener API group: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;
        interval = next_interval(interval);
    }
}

fn next_interval(interval: u64) -> u64 {
    (interval * 2).min(POLL_MAX_INTERVAL_SECS)
}

/// Shoots and Seeds must both be discoverable
async fn check_gardener_crds_exist(client: &Client) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[CORE_GROUP])
        .run()
        .await?;

    let mut kinds = Vec::new();
    for group in discovery.groups() {
        if group.name() == CORE_GROUP {
            for (ar, _) in group.recommended_resources() {
                kinds.push(ar.kind);
            }
        }
    }
    Ok(["Shoot", "Seed"]
        .iter()
        .all(|k| kinds.iter().any(|found| found == k)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(next_interval(POLL_INTERVAL_SECS), 20);
        assert_eq!(next_interval(40), POLL_MAX_INTERVAL_SECS);
        assert_eq!(next_interval(POLL_MAX_INTERVAL_SECS), POLL_MAX_INTERVAL_SECS);
    }
}
