//! The script runner command.

use std::path::Path;

use fp_core::Error;
use fp_io::{ProjectLayout, run_script};

pub fn run(dir: &Path, script: &str) -> Result<i32, Error> {
    run_script(&ProjectLayout::new(dir), script)
}
