use colored::Colorize;

use crate::models::{Revision, RunSummary};
use crate::policy::{ImageDecision, RevisionDecision};

fn dry_run_header(dry_run: bool) -> String {
    if dry_run {
        format!(" {} ", "DRY RUN".yellow().bold())
    } else {
        String::new()
    }
}

/// Print the header for a service about to be inspected
pub fn print_service(name: &str, dry_run: bool) {
    println!(
        "\n{}Service: {}{}",
        dry_run_header(dry_run),
        name.bold(),
        if dry_run { " (no changes will be made)" } else { "" }
    );
    println!("{}", "─".repeat(60));
}

pub fn print_revision(revision: &Revision, decision: RevisionDecision, dry_run: bool) {
    let created_str = match &revision.create_time {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "unknown".to_string(),
    };
    println!("  Revision: {} {}", revision.name, created_str.dimmed());

    match decision {
        RevisionDecision::Keep => {
            println!("    [{}] active revision, skipping", "  KEEP".green().bold())
        }
        RevisionDecision::Delete => println!(
            "    [{}] {}",
            "DELETE".red().bold(),
            if dry_run {
                "inactive revision, would delete"
            } else {
                "inactive revision, deleting"
            }
        ),
    }
}

pub fn print_repository(service: &str, repository: &str) {
    println!("  Images of {}: {}", service.bold(), repository.dimmed());
}

pub fn print_image(image_ref: &str, decision: ImageDecision, dry_run: bool) {
    let (label, reason) = match decision {
        ImageDecision::KeepActive => ("  KEEP".green().bold(), "used by an active revision"),
        ImageDecision::KeepTagged => ("  KEEP".green().bold(), "tagged latest"),
        ImageDecision::Delete if dry_run => ("DELETE".red().bold(), "would delete"),
        ImageDecision::Delete => ("DELETE".red().bold(), "deleting"),
    };
    println!("    [{}] {} {}", label, image_ref, reason.dimmed());
}

/// Print final summary
pub fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!("\n{}", "═".repeat(60));
    let (title, verb, keep_verb) = if dry_run {
        ("DRY RUN SUMMARY:".yellow().bold(), "Would delete", "keep")
    } else {
        ("SUMMARY:".bold(), "Deleted", "kept")
    };
    println!(
        "{} {} {} revisions and {} images across {} services, {} {} revisions and {} images",
        title,
        verb,
        summary.revisions_deleted.to_string().red().bold(),
        summary.images_deleted.to_string().red().bold(),
        summary.services,
        keep_verb,
        summary.revisions_kept.to_string().green().bold(),
        summary.images_kept.to_string().green().bold(),
    );
}
