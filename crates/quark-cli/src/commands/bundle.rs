//! `quark bundle`: write the script and stylesheet artifacts.

use quark_engine::bundler::Bundler;

use super::{load_config, Overrides};
use crate::output::StyledOutput;

pub fn execute(overrides: &Overrides, out: &mut StyledOutput) -> anyhow::Result<()> {
    let config = load_config(overrides)?;
    let bundler = Bundler::new(config.bundle);
    let report = bundler.bundle()?;

    out.success("Bundled ");
    out.bold(&report.files.to_string());
    out.plain(" files");
    if report.skipped > 0 {
        out.warning(&format!(" ({} skipped)", report.skipped));
    }
    out.dim(&format!(" #{}", report.version));
    out.newline();

    out.info("  script ");
    out.plain(&report.script_path.display().to_string());
    out.newline();
    out.info("  style  ");
    out.plain(&report.style_path.display().to_string());
    out.newline();
    out.flush();
    Ok(())
}
