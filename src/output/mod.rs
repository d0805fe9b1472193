//! Output module for reporting on the archive
//!
//! This module handles:
//! - Per-job statistics
//! - Listings of archived sites and of the jobs of one host

pub mod stats;

pub use stats::{load_statistics, print_statistics, JobStatistics};

use crate::storage::{JobRecord, SiteSummary};

/// Prints every archived site, most recently archived first
pub fn print_sites(sites: &[SiteSummary]) {
    if sites.is_empty() {
        println!("No archived sites");
        return;
    }

    println!("{:<40} {:>6} {:>8}  {}", "HOST", "JOBS", "PAGES", "LATEST");
    for site in sites {
        println!(
            "{:<40} {:>6} {:>8}  {}",
            site.host, site.job_count, site.page_count, site.latest_job_time
        );
    }
}

/// Prints the jobs of one host, newest first
pub fn print_jobs(host: &str, jobs: &[JobRecord]) {
    if jobs.is_empty() {
        println!("No jobs for {}", host);
        return;
    }

    println!("Jobs for {}:", host);
    println!("{:>6}  {:<10} {:>8}  {}", "ID", "STATUS", "PAGES", "STARTED");
    for job in jobs {
        println!(
            "{:>6}  {:<10} {:>8}  {}",
            job.id, job.status, job.page_count, job.started_at
        );
    }
}
