//! The page a running application lives in
//!
//! The linker never touches rendering directly. Live component instances,
//! stylesheets and asset URLs are reached through [`Host`]; [`MemoryHost`]
//! keeps them in memory for tooling and tests.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use url::{Position, Url};

/// Instance id attribute
pub const ATTR_ID: &str = "a-i";
/// Component name attribute
pub const ATTR_NAME: &str = "a-n";
/// Serialized state attribute
pub const ATTR_STATE: &str = "a-s";
/// Owning-factory attribute
pub const ATTR_FACTORY: &str = "a-sof";

/// Attributes carried across a hot swap
pub const IDENTITY_ATTRIBUTES: &[&str] = &[ATTR_ID, ATTR_NAME, ATTR_STATE, ATTR_FACTORY];

/// Query parameter carrying the bundle version
pub const CACHE_BUST_PARAM: &str = "quark";

/// Errors a host can report
#[derive(Debug, Error)]
pub enum HostError {
    /// No live instance has the id
    #[error("No live instance with id '{0}'")]
    InstanceNotFound(String),
}

/// A live component instance
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Stable instance id
    pub id: String,
    /// Module that defined the component
    pub factory: String,
    /// Exported component class name
    pub component: String,
    /// Props the instance was created with
    pub props: Value,
    /// Nested content slot, preserved across swaps
    pub nucleus_children: Vec<String>,
    /// Element attributes
    pub attributes: BTreeMap<String, String>,
    /// Rendered markup
    pub markup: String,
}

/// Operations the runtime needs from its host page
pub trait Host {
    /// Every live component instance
    fn instances(&self) -> Vec<Instance>;

    /// Put `replacement` where the instance `id` was
    fn replace_instance(&mut self, id: &str, replacement: Instance) -> Result<(), HostError>;

    /// Apply (or replace) the stylesheet owned by `owner`
    fn apply_stylesheet(&mut self, owner: &str, css: &str);

    /// Re-fetch assets whose file name is listed; returns how many were touched
    fn refresh_assets(&mut self, version: &str, filenames: &[String]) -> usize;
}

/// In-memory host
#[derive(Debug, Default)]
pub struct MemoryHost {
    instances: Vec<Instance>,
    stylesheets: IndexMap<String, String>,
    assets: Vec<String>,
}

impl MemoryHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount an instance
    pub fn mount(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    /// Reference an asset URL (script or stylesheet link)
    pub fn link_asset(&mut self, url: impl Into<String>) {
        self.assets.push(url.into());
    }

    /// Live instance by id
    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }

    /// Applied stylesheets, by owner
    pub fn stylesheets(&self) -> &IndexMap<String, String> {
        &self.stylesheets
    }

    /// Asset URLs
    pub fn assets(&self) -> &[String] {
        &self.assets
    }
}

impl Host for MemoryHost {
    fn instances(&self) -> Vec<Instance> {
        self.instances.clone()
    }

    fn replace_instance(&mut self, id: &str, replacement: Instance) -> Result<(), HostError> {
        let slot = self
            .instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| HostError::InstanceNotFound(id.to_string()))?;
        *slot = replacement;
        Ok(())
    }

    fn apply_stylesheet(&mut self, owner: &str, css: &str) {
        self.stylesheets.insert(owner.to_string(), css.to_string());
    }

    fn refresh_assets(&mut self, version: &str, filenames: &[String]) -> usize {
        let mut touched = 0;
        for asset in &mut self.assets {
            if filenames.iter().any(|name| asset_file_name(asset) == name) {
                *asset = cache_bust(asset, version);
                touched += 1;
            }
        }
        touched
    }
}

/// Set `quark=<version>` on a URL, replacing an earlier value
///
/// Relative URLs stay relative.
pub fn cache_bust(asset: &str, version: &str) -> String {
    let (mut url, relative) = match Url::parse(asset) {
        Ok(url) => (url, false),
        Err(_) => match Url::parse("http://localhost/").and_then(|base| base.join(asset)) {
            Ok(url) => (url, true),
            Err(_) => return asset.to_string(),
        },
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != CACHE_BUST_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(CACHE_BUST_PARAM, version);

    if relative {
        url[Position::BeforePath..].to_string()
    } else {
        url.to_string()
    }
}

fn asset_file_name(asset: &str) -> &str {
    let path = asset.split(['?', '#']).next().unwrap_or(asset);
    path.rsplit('/').next().unwrap_or(path)
}
