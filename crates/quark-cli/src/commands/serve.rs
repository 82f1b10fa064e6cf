//! `quark serve`: bundle once, then run the hot-reload server.

use quark_engine::bundler::Bundler;
use quark_engine::reload::ReloadServer;

use super::{load_config, Overrides};
use crate::output::StyledOutput;

pub fn execute(overrides: &Overrides, out: &mut StyledOutput) -> anyhow::Result<()> {
    let config = load_config(overrides)?;
    let bundler = Bundler::new(config.bundle);
    let report = bundler.bundle()?;

    let server = ReloadServer::new(bundler, config.reload);
    out.success("Watching ");
    out.plain(&format!("{} files", report.files));
    out.dim(&format!(" #{}", report.version));
    out.newline();
    out.info("  reload ");
    out.plain(&format!("ws://{}", server.address()));
    out.newline();
    out.flush();

    server.run()?;
    Ok(())
}
