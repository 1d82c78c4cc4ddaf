//! The project initializer.
//!
//! Writes a default manifest and an empty lockfile, creating the cache
//! and install-tree directories alongside. Without `-y`, each manifest
//! field is prompted on stdin; empty input keeps the default.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::display::arrow;
use fp_core::{Error, Lockfile, Manifest, to_snake_case};
use fp_io::ProjectLayout;

pub fn run(dir: &Path, yes: bool) -> Result<(), Error> {
    fs::create_dir_all(dir).map_err(|e| Error::Filesystem {
        message: format!("failed to create {}: {e}", dir.display()),
    })?;

    let layout = ProjectLayout::new(dir);
    layout.ensure_dirs()?;

    let base_name = dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "app".to_string());

    let mut manifest = Manifest::project_default(&to_snake_case(&base_name));

    if !yes {
        prompt("Enter the name of your project", &mut manifest.name)?;
        prompt("Enter the version of your project", &mut manifest.version)?;
        prompt(
            "Enter a short description of your project",
            &mut manifest.description,
        )?;
        prompt("Enter the entry point to your project", &mut manifest.main)?;
    }

    layout.save_manifest(&manifest)?;
    layout.save_lock(&Lockfile::default())?;

    println!(
        "{} Initialized '{}' in {}",
        arrow(),
        manifest.name,
        dir.display()
    );

    Ok(())
}

/// Read one line from stdin; empty input keeps the current value.
fn prompt(label: &str, value: &mut String) -> Result<(), Error> {
    print!("{label} ({value}): ");
    io::stdout().flush().map_err(|e| Error::Filesystem {
        message: format!("failed to flush stdout: {e}"),
    })?;

    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .map_err(|e| Error::Filesystem {
            message: format!("failed to read stdin: {e}"),
        })?;

    let input = input.trim();
    if !input.is_empty() {
        *value = input.to_string();
    }
    Ok(())
}
