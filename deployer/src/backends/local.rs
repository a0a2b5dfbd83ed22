//! Local backends
//!
//! - [`LocalFilesystem`]: deployment working directories on disk
//! - [`DirectoryPublisher`]: "hosts" a site by copying it into a sites
//!   directory served as `https://{subdomain}.{domain}`
//! - [`LocalAuthenticator`]: username-based sign-in
//! - [`WordNameGenerator`]: `adjective-noun-xxxx` subdomain tokens

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::{Authenticator, NameGenerator, Publisher, SiteFilesystem, User};

/// Creates deployment directories under a fixed root
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    root: PathBuf,
}

impl LocalFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SiteFilesystem for LocalFilesystem {
    async fn mkdir(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            bail!("Invalid directory name: {:?}", name);
        }
        let path = self.root.join(name);
        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        Ok(path)
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))
    }
}

/// Publishes a directory by copying it to `{sites_dir}/{subdomain}`
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    sites_dir: PathBuf,
    domain: String,
}

impl DirectoryPublisher {
    pub fn new(sites_dir: impl Into<PathBuf>, domain: impl Into<String>) -> Self {
        Self {
            sites_dir: sites_dir.into(),
            domain: domain.into(),
        }
    }

    pub fn site_url(&self, subdomain: &str) -> String {
        format!("https://{}.{}", subdomain, self.domain)
    }
}

#[async_trait]
impl Publisher for DirectoryPublisher {
    async fn create(&self, subdomain: &str, source_dir: &Path) -> Result<String> {
        let target = self.sites_dir.join(subdomain);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            bail!("Subdomain already taken: {}", subdomain);
        }

        let source = source_dir.to_path_buf();
        let dest = target.clone();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&source, &dest))
            .await
            .map_err(|e| anyhow!("Publish task failed: {}", e))??;

        tracing::info!(
            subdomain,
            files = copied,
            path = %target.display(),
            "Site published"
        );
        Ok(self.site_url(subdomain))
    }
}

/// Copy every file under `source` into `dest`; returns the file count
fn copy_tree(source: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;
    let mut pending = vec![(source.to_path_buf(), dest.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        std::fs::create_dir_all(&to)
            .with_context(|| format!("Failed to create directory: {}", to.display()))?;
        let entries = std::fs::read_dir(&from)
            .with_context(|| format!("Failed to read directory: {}", from.display()))?;

        for entry in entries {
            let entry = entry?;
            let target = to.join(entry.file_name());
            if entry.file_type()?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                std::fs::copy(entry.path(), &target)
                    .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}

/// Username-based sign-in
///
/// Signed in when a username is configured. Otherwise `sign_in` asks for
/// one on stdin when `interactive` is set; an empty answer cancels.
#[derive(Debug, Default)]
pub struct LocalAuthenticator {
    username: Mutex<Option<String>>,
    interactive: bool,
}

impl LocalAuthenticator {
    pub fn new(username: Option<String>, interactive: bool) -> Self {
        Self {
            username: Mutex::new(username.filter(|u| !u.trim().is_empty())),
            interactive,
        }
    }

    fn current(&self) -> Option<String> {
        self.username.lock().ok().and_then(|u| u.clone())
    }
}

fn prompt_username() -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "Username: ")?;
    stderr.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    async fn sign_in(&self) -> Result<()> {
        if !self.interactive {
            bail!("Sign-in cancelled: no username configured (set DEPLOYER_USER)");
        }

        let name = tokio::task::spawn_blocking(prompt_username)
            .await
            .map_err(|e| anyhow!("Sign-in prompt failed: {}", e))??;
        if name.is_empty() {
            bail!("Sign-in cancelled by user");
        }

        if let Ok(mut username) = self.username.lock() {
            *username = Some(name);
        }
        Ok(())
    }

    async fn user(&self) -> Result<User> {
        self.current()
            .map(|username| User { username })
            .ok_or_else(|| anyhow!("Not signed in"))
    }
}

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brisk", "calm", "clever", "cosmic", "crisp", "dapper", "eager", "fancy",
    "gentle", "golden", "happy", "jolly", "keen", "lively", "lucky", "mellow", "nimble", "quiet",
    "rapid", "shiny", "silent", "sunny", "swift", "tidy", "vivid", "witty",
];

const NOUNS: &[&str] = &[
    "badger", "beacon", "breeze", "canyon", "cedar", "comet", "falcon", "fjord", "harbor", "island",
    "lagoon", "lantern", "maple", "meadow", "nebula", "otter", "pebble", "pine", "river", "robin",
    "summit", "thicket", "tiger", "valley", "willow", "zephyr",
];

/// `adjective-noun-xxxx` names backed by random UUID bits
#[derive(Debug, Default, Clone, Copy)]
pub struct WordNameGenerator;

impl WordNameGenerator {
    fn from_bytes(bytes: &[u8; 16]) -> String {
        let adjective = ADJECTIVES[bytes[0] as usize % ADJECTIVES.len()];
        let noun = NOUNS[bytes[1] as usize % NOUNS.len()];
        let suffix = u16::from_be_bytes([bytes[2], bytes[3]]);
        format!("{}-{}-{:04x}", adjective, noun, suffix)
    }
}

impl NameGenerator for WordNameGenerator {
    fn generate(&self) -> String {
        Self::from_bytes(Uuid::new_v4().as_bytes())
    }
}
