use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{RunSummary, Service};
use crate::policy::{cleanup_service, CleanupOptions};
use crate::registry::ImageRegistry;
use crate::run_api::{ControlPlane, Pager};

/// Clean every service in the configured project and region, one at a time.
/// The first failure aborts the run; work already done is not rolled back.
pub async fn run_cleanup(
    config: &Config,
    control_plane: &dyn ControlPlane,
    registry: &dyn ImageRegistry,
    options: CleanupOptions,
) -> Result<RunSummary> {
    let parent = config.location_parent();
    info!(%parent, dry_run = options.dry_run, "listing services");

    let mut summary = RunSummary::default();
    let mut services: Pager<'_, Service> = Pager::new(control_plane, parent.as_str());

    while let Some(service) = services
        .next()
        .await
        .with_context(|| format!("Failed to list services in {}", parent))?
    {
        let report = cleanup_service(control_plane, registry, config, &service, options).await?;
        debug!(
            service = %report.service,
            revisions_deleted = report.revisions_deleted,
            images_deleted = report.images_deleted,
            "service done"
        );
        summary.add(&report);
    }

    Ok(summary)
}
