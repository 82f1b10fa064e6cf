//! `quark graph`: print the files of a bundle in emission order.

use quark_engine::bundler::Bundler;
use quark_engine::module::FileDescription;
use serde_json::json;

use super::{load_config, Overrides};
use crate::output::StyledOutput;

pub fn execute(overrides: &Overrides, json: bool, out: &mut StyledOutput) -> anyhow::Result<()> {
    let config = load_config(overrides)?;
    let graph = Bundler::new(config.bundle).graph()?;

    if json {
        let files: Vec<_> = graph.files().iter().map(describe).collect();
        out.plain(&serde_json::to_string_pretty(&files)?);
        out.newline();
        out.flush();
        return Ok(());
    }

    let width = graph.len().to_string().len();
    for (i, file) in graph.files().iter().enumerate() {
        out.dim(&format!("{:>width$} ", i + 1, width = width));
        out.bold(&file.full_module_name);
        out.info(&format!(" {:?}", file.kind));
        if file.use_count > 0 {
            out.dim(&format!(" used by {}", file.use_count));
        }
        out.newline();
    }
    out.flush();
    Ok(())
}

fn describe(file: &FileDescription) -> serde_json::Value {
    json!({
        "id": file.id.as_str(),
        "path": file.path.display().to_string(),
        "kind": format!("{:?}", file.kind),
        "packageName": file.package_name,
        "moduleName": file.module_name,
        "fullModuleName": file.full_module_name,
        "useCount": file.use_count,
        "imports": file
            .imports
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
    })
}
