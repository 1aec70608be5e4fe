use crate::build::{RuntimeLayout, Settings, TargetPlatform};
use crate::utils::fs::dotted_extension;
use std::path::{Path, PathBuf};

#[cfg(feature = "icons")]
mod convert;

pub const ICON_SIZES: &[u32] = &[256, 128, 64, 48, 32, 16];

const RASTER_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".bmp"];
const PLATFORM_EXTENSIONS: &[&str] = &[".ico", ".icns"];

/// Resolves the application icon
pub fn resolve_icon(
    explicit: Option<&Path>,
    settings: &Settings,
    project_dir: &Path,
    runtime: &RuntimeLayout,
) -> Option<PathBuf> {
    let declared = settings.icon().map(|icon| project_dir.join(icon));
    let candidates = [
        ("explicit", explicit.map(|p| project_dir.join(p))),
        ("settings", declared),
        ("default", Some(runtime.default_icon())),
    ];

    for (origin, candidate) in candidates {
        let Some(path) = candidate else {
            continue;
        };
        if path.is_file() {
            log::info!("Using {} icon {}", origin, path.display());
            return Some(path);
        }
        log::warn!("icon: {} icon {} not found", origin, path.display());
    }
    None
}

pub fn layer_sizes(source_dim: u32) -> Vec<u32> {
    let sizes: Vec<u32> = ICON_SIZES
        .iter()
        .copied()
        .filter(|&s| s <= source_dim)
        .collect();
    if sizes.is_empty() && source_dim > 0 {
        vec![source_dim]
    } else {
        sizes
    }
}

pub fn is_platform_icon(path: &Path) -> bool {
    dotted_extension(path).is_some_and(|e| PLATFORM_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_raster(path: &Path) -> bool {
    dotted_extension(path).is_some_and(|e| RASTER_EXTENSIONS.contains(&e.as_str()))
}

pub fn platform_icon(source: &Path, out_dir: &Path, out_name: &str, platform: TargetPlatform) -> PathBuf {
    if is_platform_icon(source) || !is_raster(source) {
        return source.to_path_buf();
    }

    let target = match platform {
        TargetPlatform::Linux => return source.to_path_buf(),
        TargetPlatform::Windows => out_dir.join(format!("{}.ico", out_name)),
        TargetPlatform::MacOs => out_dir.join(format!("{}.icns", out_name)),
    };

    match convert_to(source, &target, platform) {
        Ok(()) => {
            println!("Generated {} from {}", target.display(), source.display());
            target
        }
        Err(e) => {
            log::warn!("icon: conversion of {} failed, using it as-is: {}", source.display(), e);
            source.to_path_buf()
        }
    }
}

#[cfg(feature = "icons")]
fn convert_to(source: &Path, target: &Path, platform: TargetPlatform) -> crate::result::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match platform {
        TargetPlatform::MacOs => convert::write_icns(source, target),
        _ => convert::write_ico(source, target),
    }
}

#[cfg(not(feature = "icons"))]
fn convert_to(_source: &Path, _target: &Path, _platform: TargetPlatform) -> crate::result::Result<()> {
    Err(crate::result::DeskpackError::not_found(
        "icon conversion support is not compiled in (enable the `icons` feature)",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn sizes_never_upscale() {
        assert_eq!(layer_sizes(512), vec![256, 128, 64, 48, 32, 16]);
        assert_eq!(layer_sizes(100), vec![64, 48, 32, 16]);
        assert_eq!(layer_sizes(10), vec![10]);
    }

    #[test]
    fn settings_icon_beats_default() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("logo.png"), "").unwrap();
        let settings = Settings::from_value(json!({"icon": "logo.png"})).unwrap();
        let runtime = RuntimeLayout::new(tmp.path().join("site"), "pytron");

        let icon = resolve_icon(Some(Path::new("missing.ico")), &settings, tmp.path(), &runtime);

        assert_eq!(icon, Some(tmp.path().join("logo.png")));
    }

    #[test]
    fn nothing_resolves() {
        let tmp = TempDir::new().unwrap();
        let runtime = RuntimeLayout::new(tmp.path(), "pytron");
        assert_eq!(resolve_icon(None, &Settings::default(), tmp.path(), &runtime), None);
    }

    #[test]
    fn platform_formats_are_left_alone() {
        let tmp = TempDir::new().unwrap();
        let ico = tmp.path().join("app.ico");
        std::fs::write(&ico, "not really an icon").unwrap();

        let out = platform_icon(&ico, tmp.path(), "App", TargetPlatform::Windows);

        assert_eq!(out, ico);
        assert_eq!(std::fs::read_to_string(&ico).unwrap(), "not really an icon");
    }

    #[test]
    fn broken_raster_falls_back_to_source() {
        let tmp = TempDir::new().unwrap();
        let png = tmp.path().join("logo.png");
        std::fs::write(&png, "garbage").unwrap();

        let out = platform_icon(&png, &tmp.path().join("icons"), "App", TargetPlatform::Windows);

        assert_eq!(out, png);
    }

    #[test]
    fn linux_uses_raster_directly() {
        let png = Path::new("/x/logo.png");
        assert_eq!(
            platform_icon(png, Path::new("/out"), "App", TargetPlatform::Linux),
            png.to_path_buf()
        );
    }
}
