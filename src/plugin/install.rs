use crate::plugin::lock::{PluginLock, LOCK_FILE};
use crate::plugin::manifest::MANIFEST_FILE;
use crate::result::{DeskpackError, Result};
use crate::utils::fs::remove_dir_if_exists;
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use octocrab::Octocrab;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::Archive;
use zip::ZipArchive;

const USER_AGENT: &str = concat!("deskpack/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    Local { path: PathBuf, kind: ArchiveKind },
    GitHub { owner: String, repo: String, tag: Option<String> },
}

impl PluginSource {
    /// Parses `user.repo[.tag]` or a path to a local `.zip`/`.tar.gz`.
    pub fn parse(identifier: &str) -> Result<Self> {
        let path = Path::new(identifier);
        if let Some(kind) = ArchiveKind::from_name(identifier) {
            if path.is_file() {
                return Ok(Self::Local {
                    path: path.to_path_buf(),
                    kind,
                });
            }
        }

        let mut parts = identifier.splitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), tag) if !owner.is_empty() && !repo.is_empty() => {
                Ok(Self::GitHub {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    tag: tag.filter(|t| !t.is_empty()).map(str::to_string),
                })
            }
            _ => Err(DeskpackError::config(format!(
                "Invalid plugin identifier '{}'. Use username.repo[.version] or a local archive",
                identifier
            ))),
        }
    }

    pub fn plugin_name(&self) -> String {
        match self {
            Self::GitHub { repo, .. } => repo.clone(),
            Self::Local { path, .. } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                ["tar.gz", "tgz", "zip"]
                    .iter()
                    .find_map(|ext| name.strip_suffix(&format!(".{}", ext)).map(str::to_string))
                    .unwrap_or(name)
            }
        }
    }
}

pub struct PluginInstaller {
    client: Client,
}

impl Default for PluginInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginInstaller {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn github() -> Arc<Octocrab> {
        match std::env::var("GITHUB_TOKEN") {
            Ok(token) if !token.is_empty() => {
                let crab = Octocrab::builder()
                    .personal_token(token)
                    .build()
                    .unwrap_or_else(|_| Octocrab::default());
                octocrab::initialise(crab);
                octocrab::instance()
            }
            _ => octocrab::instance(),
        }
    }

    /** Installs `identifier` into `<plugins_dir>/<repo>`
     *
     * # Process Flow
     * 1. Resolve the archive: local file, release zipball, or the `main` branch archive
     * 2. Download it and hash it
     * 3. Extract, unwrapping the single top-level folder GitHub archives carry
     * 4. Record the install in `plugins.lock`
     */
    pub async fn install(&self, identifier: &str, plugins_dir: &Path) -> Result<PathBuf> {
        let source = PluginSource::parse(identifier)?;
        let name = source.plugin_name();

        let (bytes, kind, tag, origin) = match &source {
            PluginSource::Local { path, kind } => {
                println!("Installing plugin from {}...", path.display());
                (
                    tokio::fs::read(path).await?,
                    *kind,
                    "local".to_string(),
                    path.display().to_string(),
                )
            }
            PluginSource::GitHub { owner, repo, tag } => {
                let (url, tag) = self.resolve_download(owner, repo, tag.as_deref()).await?;
                println!("Downloading from: {}", url);
                let bytes = self.download(&url, &name).await?;
                (bytes, ArchiveKind::Zip, tag, url)
            }
        };

        let hash = format!("{:x}", Sha256::digest(&bytes));
        fs::create_dir_all(plugins_dir)?;
        let target = plugins_dir.join(&name);
        unpack_into(&bytes, kind, &target)?;

        if target.join(MANIFEST_FILE).is_file() {
            println!("Plugin '{}' installed successfully", name);
        } else {
            log::warn!("plugin: '{}' has no {}; it may not load", name, MANIFEST_FILE);
            eprintln!("Warning: installed plugin '{}' is missing a {}", name, MANIFEST_FILE);
        }

        let lock_path = plugins_dir.join(LOCK_FILE);
        let mut lock = PluginLock::load_from_file(&lock_path).await?;
        lock.record(name.as_str(), tag, origin, hash);
        lock.save_to_file(&lock_path).await?;

        Ok(target)
    }

    async fn resolve_download(&self, owner: &str, repo: &str, tag: Option<&str>) -> Result<(String, String)> {
        let github = Self::github();
        let repos = github.repos(owner, repo);
        let releases = repos.releases();
        let release = match tag {
            Some(tag) => releases.get_by_tag(tag).await,
            None => releases.get_latest().await,
        };

        match release {
            Ok(release) => {
                let url = release.zipball_url.ok_or_else(|| {
                    DeskpackError::not_found(format!(
                        "Release {} of {}/{} has no source archive",
                        release.tag_name, owner, repo
                    ))
                })?;
                Ok((url.to_string(), release.tag_name))
            }
            Err(octocrab::Error::GitHub { source, .. }) if source.status_code.as_u16() == 404 => {
                log::warn!("No release found for {}/{}, falling back to main branch", owner, repo);
                Ok((
                    format!("https://github.com/{}/{}/archive/refs/heads/main.zip", owner, repo),
                    "main".to_string(),
                ))
            }
            Err(e) => Err(DeskpackError::process(format!(
                "Failed to fetch release info for {}/{}: {}",
                owner, repo, e
            ))),
        }
    }

    async fn download(&self, url: &str, name: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| DeskpackError::process(format!("Download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DeskpackError::process(format!(
                "Download failed: HTTP {}",
                response.status()
            )));
        }

        let pb = ProgressBar::new(response.content_length().unwrap_or(0));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Downloading {}", name));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DeskpackError::process(format!("Download failed: {}", e)))?;

        pb.set_position(bytes.len() as u64);
        pb.finish_with_message(format!("Downloaded {}", name));
        Ok(bytes.to_vec())
    }
}

/// Extracts `bytes` into `target`, replacing it
pub fn unpack_into(bytes: &[u8], kind: ArchiveKind, target: &Path) -> Result<()> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let scratch = parent.join(format!(".{}.extract", name));
    remove_dir_if_exists(&scratch)?;
    fs::create_dir_all(&scratch)?;

    let extracted = match kind {
        ArchiveKind::Zip => extract_zip(bytes, &scratch),
        ArchiveKind::TarGz => extract_tar_gz(bytes, &scratch),
    };
    if let Err(e) = extracted {
        let _ = fs::remove_dir_all(&scratch);
        return Err(e);
    }

    let entries: Vec<PathBuf> = fs::read_dir(&scratch)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    let root = match entries.as_slice() {
        [only] if only.is_dir() => only.clone(),
        _ => scratch.clone(),
    };

    remove_dir_if_exists(target)?;
    fs::rename(&root, target)?;
    remove_dir_if_exists(&scratch)?;
    Ok(())
}

fn extract_zip(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel) = entry.enclosed_name() else {
            log::warn!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let path = dest.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&path)?;
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut output = File::create(&path)?;
            io::copy(&mut entry, &mut output)?;
        }
    }
    Ok(())
}

fn extract_tar_gz(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(bytes)));
    archive
        .unpack(dest)
        .map_err(|e| DeskpackError::process(format!("TAR extraction error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn identifiers() {
        assert_eq!(
            PluginSource::parse("alice.weather.v1.2.0").unwrap(),
            PluginSource::GitHub {
                owner: "alice".into(),
                repo: "weather".into(),
                tag: Some("v1.2.0".into()),
            }
        );
        assert_eq!(
            PluginSource::parse("alice.weather").unwrap().plugin_name(),
            "weather"
        );
        assert!(PluginSource::parse("weather").is_err());
    }

    #[test]
    fn local_archive_name() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("clock.tar.gz");
        fs::write(&archive, "").unwrap();

        let source = PluginSource::parse(archive.to_str().unwrap()).unwrap();

        assert_eq!(source.plugin_name(), "clock");
        assert!(matches!(source, PluginSource::Local { kind: ArchiveKind::TarGz, .. }));
    }

    #[test]
    fn github_archive_top_folder_is_unwrapped() {
        let tmp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[
            ("alice-weather-1a2b3c/manifest.json", "{}"),
            ("alice-weather-1a2b3c/main.py", "x = 1"),
        ]);
        let target = tmp.path().join("plugins/weather");
        fs::create_dir_all(tmp.path().join("plugins")).unwrap();

        unpack_into(&bytes, ArchiveKind::Zip, &target).unwrap();

        assert!(target.join(MANIFEST_FILE).is_file());
        assert!(target.join("main.py").is_file());
        assert!(!tmp.path().join("plugins/.weather.extract").exists());
    }

    #[test]
    fn flat_archive_is_used_directly() {
        let tmp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[("manifest.json", "{}"), ("main.py", "")]);
        let target = tmp.path().join("flat");

        unpack_into(&bytes, ArchiveKind::Zip, &target).unwrap();

        assert!(target.join("main.py").is_file());
    }

    #[tokio::test]
    async fn local_install_records_lock() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("clock.zip");
        fs::write(&archive, zip_bytes(&[("clock/manifest.json", "{}")])).unwrap();
        let plugins = tmp.path().join("plugins");

        let installed = PluginInstaller::new()
            .install(archive.to_str().unwrap(), &plugins)
            .await
            .unwrap();

        assert_eq!(installed, plugins.join("clock"));
        let lock = PluginLock::load_from_file(&plugins.join(LOCK_FILE)).await.unwrap();
        let entry = lock.get("clock").unwrap();
        assert_eq!(entry.tag, "local");
        assert_eq!(entry.hash.len(), 64);
    }
}
