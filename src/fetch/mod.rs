//! Downloading repository snapshots from GitHub.
//!
//! [`Fetcher::fetch`] turns `https://github.com/<owner>/<repo>` into a fresh
//! `<projects_dir>/<name>/` holding the repository files at its root.

mod archive;
mod github;

pub use github::RepoRef;

use crate::config::Settings;
use crate::config::env_loader::GITHUB_TOKEN_VAR;
use crate::error::{Error, Result};
use futures::StreamExt;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Sent with every API request; GitHub rejects requests without one.
const CLIENT_USER_AGENT: &str = concat!("runtime-launcher/", env!("CARGO_PKG_VERSION"));

/// Check that `name` can be used as a single directory name.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Err(Error::Config(format!("Invalid name '{}': {}", name, reason)));

    if name.trim().is_empty() {
        return invalid("name must not be empty");
    }
    if name.starts_with('.') {
        return invalid("name must not start with '.'");
    }
    if name.contains(['/', '\\', '\0']) {
        return invalid("name must not contain path separators");
    }
    Ok(())
}

/// Downloads and unpacks repository tarballs into the projects directory.
pub struct Fetcher {
    projects_dir: PathBuf,
    api_base: String,
    token: Option<String>,
    git_ref: Option<String>,
    timeout: Option<Duration>,
    client: Client,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            projects_dir: settings.projects_dir.clone(),
            api_base: settings.github.api_base.clone(),
            token: settings.github.token.clone(),
            git_ref: settings.github.git_ref.clone(),
            timeout: settings.github.fetch_timeout,
            client,
        })
    }

    /// Override the branch, tag or commit to download.
    pub fn with_ref(mut self, git_ref: Option<String>) -> Self {
        if git_ref.is_some() {
            self.git_ref = git_ref;
        }
        self
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Where `fetch(_, name)` unpacks to.
    pub fn destination(&self, name: &str) -> PathBuf {
        self.projects_dir.join(name)
    }

    /// Replace `<projects_dir>/<name>` with a snapshot of `repo_url`.
    ///
    /// Any existing directory with that name is removed first, even if the
    /// download then fails.
    #[tracing::instrument(skip(self, name), fields(runtime.name = %name))]
    pub async fn fetch(&self, repo_url: &str, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("Missing {}", GITHUB_TOKEN_VAR)))?;
        let repo = RepoRef::parse(repo_url)?;
        let url = repo.tarball_url(&self.api_base, self.git_ref.as_deref());

        let dest = self.destination(name);
        match tokio::fs::remove_dir_all(&dest).await {
            Ok(()) => tracing::debug!("Removed previous snapshot at {}", dest.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&dest).await?;

        tracing::info!("Fetching {} from {}/{}", name, repo.owner, repo.repo);

        let tarball = self.projects_dir.join(format!("{}.tar.gz", name));
        let result = self.download_and_extract(&url, token, &tarball, &dest).await;
        if let Err(e) = tokio::fs::remove_file(&tarball).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", tarball.display(), e);
            }
        }
        let entries = result?;

        tracing::info!("{} unpacked ({} entries) into {}", name, entries, dest.display());
        Ok(dest)
    }

    async fn download_and_extract(
        &self,
        url: &str,
        token: &str,
        tarball: &Path,
        dest: &Path,
    ) -> Result<usize> {
        let mut request = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("token {}", token));
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let mut file = tokio::fs::File::create(tarball).await?;
        let mut body = response.bytes_stream();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            downloaded += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tracing::debug!("Downloaded {} bytes to {}", downloaded, tarball.display());

        let tarball = tarball.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || archive::extract_stripped(&tarball, &dest))
            .await
            .map_err(|e| Error::Archive(format!("extraction task failed: {}", e)))?
    }
}
