//! Integration tests for locating installed packages and their entry points

use quark_pm::{
    find_package_root, resolve_export, PackageManifest, TsConfig, DEFAULT_CONDITIONS,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_package(dir: &Path, manifest: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("package.json"), manifest).unwrap();
}

#[test]
fn test_find_plain_package_with_subpath() {
    let temp = TempDir::new().unwrap();
    let node_modules = temp.path().join("node_modules");
    write_package(&node_modules.join("colors"), r#"{ "name": "colors" }"#);

    let root = find_package_root(&node_modules, "colors/lib/palette").unwrap();
    assert_eq!(root.dir, node_modules.join("colors"));
    assert_eq!(root.subpath, "lib/palette");
}

#[test]
fn test_find_scoped_package() {
    let temp = TempDir::new().unwrap();
    let node_modules = temp.path().join("node_modules");
    write_package(
        &node_modules.join("@acme/widgets"),
        r#"{ "name": "@acme/widgets" }"#,
    );

    let root = find_package_root(&node_modules, "@acme/widgets").unwrap();
    assert_eq!(root.dir, node_modules.join("@acme/widgets"));
    assert_eq!(root.subpath, "");
}

#[test]
fn test_missing_package() {
    let temp = TempDir::new().unwrap();
    let node_modules = temp.path().join("node_modules");
    fs::create_dir_all(&node_modules).unwrap();

    assert!(find_package_root(&node_modules, "nowhere/at/all").is_none());
}

#[test]
fn test_manifest_exports_end_to_end() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("node_modules/widgets");
    write_package(
        &dir,
        r#"{
            "name": "widgets",
            "module": "./legacy.js",
            "exports": {
                ".": { "import": "./esm/index.js", "require": "./cjs/index.js" },
                "./button": "./esm/button.js"
            }
        }"#,
    );
    fs::write(
        dir.join("tsconfig.json"),
        r#"{ "compilerOptions": { "baseUrl": "esm" } }"#,
    )
    .unwrap();

    let manifest = PackageManifest::from_dir(&dir).unwrap();
    let exports = manifest.exports.as_ref().unwrap();
    assert_eq!(
        resolve_export(exports, "", DEFAULT_CONDITIONS).unwrap(),
        "./esm/index.js"
    );
    assert_eq!(
        resolve_export(exports, "button", DEFAULT_CONDITIONS).unwrap(),
        "./esm/button.js"
    );

    let tsconfig = TsConfig::from_dir(&dir).unwrap().unwrap();
    assert_eq!(tsconfig.base_url(&dir), Some(dir.join("esm")));
}
