//! Keep/delete decisions for revisions and images of one service.
//!
//! A service is processed in two phases. The revision phase walks every
//! revision, deletes the inactive ones and collects the images of the active
//! ones into an [`ActiveImages`] set. The image phase lists the service's
//! repository and deletes every image that is neither in that set nor tagged
//! `latest`. [`ActiveImages`] can only be obtained from a completed revision
//! phase, so no image decision is ever made against a partial set.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Config;
use crate::models::{service_short_name, RegistryImage, Revision, Service, ServiceReport};
use crate::output::{print_image, print_repository, print_revision, print_service};
use crate::registry::{repository_path, ImageRegistry};
use crate::run_api::{ControlPlane, Pager};

/// Images carrying this tag are never deleted.
pub const PROTECTED_TAG: &str = "latest";

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    pub dry_run: bool,
}

/// Image references used by the active revisions of one service.
#[derive(Debug, Default)]
pub struct ActiveImages(HashSet<String>);

impl ActiveImages {
    pub fn contains(&self, image_ref: &str) -> bool {
        self.0.contains(image_ref)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    fn extend_from(&mut self, revision: &Revision) {
        self.0.extend(revision.image_refs().map(str::to_string));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionDecision {
    Keep,
    Delete,
}

pub fn decide_revision(revision: &Revision) -> RevisionDecision {
    if revision.is_active() {
        RevisionDecision::Keep
    } else {
        RevisionDecision::Delete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDecision {
    KeepActive,
    KeepTagged,
    Delete,
}

pub fn decide_image(image: &RegistryImage, active: &ActiveImages) -> ImageDecision {
    if active.contains(&image.image_ref()) {
        ImageDecision::KeepActive
    } else if image.is_tagged(PROTECTED_TAG) {
        ImageDecision::KeepTagged
    } else {
        ImageDecision::Delete
    }
}

/// Delete every inactive revision of `service` and return the images the
/// active ones still use.
pub async fn revision_phase(
    control_plane: &dyn ControlPlane,
    service: &str,
    options: CleanupOptions,
    report: &mut ServiceReport,
) -> Result<ActiveImages> {
    let mut active = ActiveImages::default();
    let mut revisions: Pager<'_, Revision> = Pager::new(control_plane, service);

    while let Some(revision) = revisions
        .next()
        .await
        .with_context(|| format!("Failed to list revisions of {}", service))?
    {
        let decision = decide_revision(&revision);
        print_revision(&revision, decision, options.dry_run);

        match decision {
            RevisionDecision::Keep => {
                active.extend_from(&revision);
                report.revisions_kept += 1;
            }
            RevisionDecision::Delete => {
                if !options.dry_run {
                    control_plane
                        .delete_revision(&revision.name)
                        .await
                        .with_context(|| format!("Failed to delete revision {}", revision.name))?;
                }
                report.revisions_deleted += 1;
            }
        }
    }

    debug!(service, active_images = active.len(), "revision phase complete");
    Ok(active)
}

/// Delete every image of the service's repository that is not protected.
pub async fn image_phase(
    registry: &dyn ImageRegistry,
    config: &Config,
    service: &str,
    active: &ActiveImages,
    options: CleanupOptions,
    report: &mut ServiceReport,
) -> Result<()> {
    let short_name = service_short_name(service)?;
    let repository = repository_path(&config.region, &config.project, &short_name);
    print_repository(&short_name, &repository);

    let images = registry
        .list_images(&repository)
        .await
        .with_context(|| format!("Failed to list images in {}", repository))?;

    for image in &images {
        let image_ref = image.image_ref();
        let decision = decide_image(image, active);
        print_image(&image_ref, decision, options.dry_run);

        if decision != ImageDecision::Delete {
            report.images_kept += 1;
            continue;
        }
        if !options.dry_run {
            registry
                .delete_image(&image_ref)
                .await
                .with_context(|| format!("Failed to delete image {}", image_ref))?;
        }
        report.images_deleted += 1;
    }

    Ok(())
}

/// Run both phases for one service.
pub async fn cleanup_service(
    control_plane: &dyn ControlPlane,
    registry: &dyn ImageRegistry,
    config: &Config,
    service: &Service,
    options: CleanupOptions,
) -> Result<ServiceReport> {
    print_service(&service.name, options.dry_run);

    let mut report = ServiceReport {
        service: service.name.clone(),
        ..Default::default()
    };
    let active = revision_phase(control_plane, &service.name, options, &mut report).await?;
    image_phase(registry, config, &service.name, &active, options, &mut report).await?;

    Ok(report)
}
