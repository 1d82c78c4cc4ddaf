//! The install command: spec parsing, progress rendering, summary.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::display::{arrow, format_count};
use fp_core::{Error, PackageSpec};
use fp_io::{InstallMode, InstallProgress, Installer, ProgressCallback, ProjectLayout, RegistryClient};

pub async fn run(
    layout: ProjectLayout,
    registry_url: String,
    concurrency: usize,
    packages: Vec<String>,
) -> Result<i32, Error> {
    let specs = packages
        .iter()
        .map(|token| PackageSpec::parse(token))
        .collect::<Result<Vec<_>, _>>()?;

    let mode = if specs.is_empty() {
        InstallMode::ManifestDriven
    } else {
        InstallMode::ArgumentDriven
    };

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(80));

    let render = bar.clone();
    let progress: ProgressCallback = Arc::new(move |event| match event {
        InstallProgress::Resolved { name, version } => {
            render.set_message(format!("resolving {name}@{version}"));
        }
        InstallProgress::FetchStarted { name, version } => {
            render.set_message(format!("fetching {name}@{version}"));
        }
        InstallProgress::Materialized { name, version } => {
            render.println(format!("  {} {name}@{version}", style("+").green().bold()));
        }
        InstallProgress::Linked { name, bins } if bins > 0 => {
            render.println(format!(
                "    linked {} for {name}",
                format_count(bins, "executable")
            ));
        }
        _ => {}
    });

    let installer = Installer::new(
        layout,
        RegistryClient::with_base_url(registry_url),
        concurrency,
    )
    .with_progress(progress);

    let report = installer.install(mode, specs).await?;
    bar.finish_and_clear();

    if report.success() {
        println!(
            "{} Installed {}",
            arrow(),
            format_count(report.installed, "package")
        );
        Ok(0)
    } else {
        eprintln!(
            "{} {} failed to install ({} succeeded)",
            style("error:").red().bold(),
            format_count(report.failed, "package"),
            report.installed
        );
        match report.first_error {
            Some(e) => {
                eprintln!("{} {}", style("error:").red().bold(), e);
                Ok(e.exit_code())
            }
            None => Ok(2),
        }
    }
}
