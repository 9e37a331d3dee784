use crate::error::{Error, Result};
use url::Url;

/// Owner and repository name parsed from a GitHub web URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Parse `https://github.com/<owner>/<repo>` with an optional `.git`
    /// suffix or trailing slash.
    pub fn parse(repo_url: &str) -> Result<Self> {
        let url = Url::parse(repo_url.trim())
            .map_err(|e| Error::Config(format!("Invalid repository URL '{}': {}", repo_url, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(Error::Config(format!(
                "Invalid repository URL '{}': scheme must be http or https, got '{}'",
                repo_url,
                url.scheme()
            )));
        }

        match url.host_str() {
            Some("github.com") | Some("www.github.com") => {}
            other => {
                return Err(Error::Config(format!(
                    "Invalid repository URL '{}': expected a github.com URL, got host '{}'",
                    repo_url,
                    other.unwrap_or("")
                )))
            }
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let [owner, repo] = segments.as_slice() else {
            return Err(Error::Config(format!(
                "Invalid repository URL '{}': expected https://github.com/<owner>/<repo>",
                repo_url
            )));
        };

        let repo = repo.strip_suffix(".git").unwrap_or(*repo);
        if repo.is_empty() {
            return Err(Error::Config(format!(
                "Invalid repository URL '{}': repository name is empty",
                repo_url
            )));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// API URL of the gzipped tarball for `git_ref`, or the default branch.
    pub fn tarball_url(&self, api_base: &str, git_ref: Option<&str>) -> String {
        let base = api_base.trim_end_matches('/');
        match git_ref.filter(|r| !r.is_empty()) {
            Some(git_ref) => format!(
                "{}/repos/{}/{}/tarball/{}",
                base, self.owner, self.repo, git_ref
            ),
            None => format!("{}/repos/{}/{}/tarball", base, self.owner, self.repo),
        }
    }
}
