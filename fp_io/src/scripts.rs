//! The script runner.
//!
//! Looks up a named entry in the manifest's `scripts` table, splits it
//! into argv by whitespace, and spawns it with inherited stdio. The
//! child's exit code propagates to the caller.

use std::process::Command;

use crate::project::ProjectLayout;
use fp_core::Error;

pub fn run_script(layout: &ProjectLayout, name: &str) -> Result<i32, Error> {
    let manifest = layout.load_manifest()?;

    let command = manifest
        .scripts
        .get(name)
        .ok_or_else(|| Error::UnknownScript {
            name: name.to_string(),
        })?;

    let mut parts = command.split_whitespace();
    let program = parts.next().ok_or_else(|| Error::UnknownScript {
        name: name.to_string(),
    })?;

    let status = Command::new(program)
        .args(parts)
        .current_dir(layout.root())
        .status()
        .map_err(|e| Error::Filesystem {
            message: format!("failed to spawn '{command}': {e}"),
        })?;

    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_core::Manifest;
    use tempfile::TempDir;

    fn layout_with_scripts(scripts: &[(&str, &str)]) -> (TempDir, ProjectLayout) {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let mut manifest = Manifest::project_default("scripted");
        manifest.scripts = scripts
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        layout.save_manifest(&manifest).unwrap();
        (tmp, layout)
    }

    #[test]
    fn successful_script_exits_zero() {
        let (_tmp, layout) = layout_with_scripts(&[("check", "true")]);
        assert_eq!(run_script(&layout, "check").unwrap(), 0);
    }

    #[test]
    fn failing_script_propagates_its_exit_code() {
        let (_tmp, layout) = layout_with_scripts(&[("check", "false")]);
        assert_eq!(run_script(&layout, "check").unwrap(), 1);
    }

    #[test]
    fn unknown_script_is_a_user_error() {
        let (_tmp, layout) = layout_with_scripts(&[("start", "true")]);

        let err = run_script(&layout, "deploy").unwrap_err();
        assert!(matches!(err, Error::UnknownScript { name } if name == "deploy"));
    }

    #[test]
    fn empty_script_is_rejected() {
        let (_tmp, layout) = layout_with_scripts(&[("noop", "   ")]);

        let err = run_script(&layout, "noop").unwrap_err();
        assert!(matches!(err, Error::UnknownScript { .. }));
    }

    #[test]
    fn missing_manifest_surfaces_as_manifest_missing() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());

        let err = run_script(&layout, "start").unwrap_err();
        assert!(matches!(err, Error::ManifestMissing { .. }));
    }
}
