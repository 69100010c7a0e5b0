#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Release feed for the browser extension.
//!
//! Lists the releases of a GitHub-style repository, picks the newest
//! stable one, and decides whether the user should be told about it.
//! Tags are compared as semantic versions with an optional leading `v`.

use semver::Version;
use serde::{Deserialize, Serialize};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Releases requested per call.
const PER_PAGE: u32 = 50;

/// Errors that can occur while reading the release feed.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The feed answered with an error status.
    #[error("Release feed for {repo} returned {status}")]
    Status {
        /// Repository that was queried.
        repo: String,
        /// HTTP status code.
        status: u16,
    },

    /// The repository is not in `owner/name` form.
    #[error("Invalid repository '{0}', expected owner/name")]
    InvalidRepo(String),

    /// A version string is not a semantic version.
    #[error("Invalid version '{version}': {source}")]
    InvalidVersion {
        /// The offending string.
        version: String,
        /// Parser error.
        source: semver::Error,
    },
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// File name.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
}

/// One entry of the release feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Git tag, e.g. `v1.4.0`.
    pub tag_name: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Unpublished release.
    #[serde(default)]
    pub draft: bool,
    /// Pre-release.
    #[serde(default)]
    pub prerelease: bool,
    /// Release page.
    #[serde(default)]
    pub html_url: String,
    /// Attached files.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Parsed version of the tag.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::InvalidVersion`] if the tag is not a
    /// semantic version.
    pub fn version(&self) -> Result<Version, ReleaseError> {
        parse_version(&self.tag_name)
    }

    /// Whether this release should be offered to users.
    #[must_use]
    pub const fn is_stable(&self) -> bool {
        !self.draft && !self.prerelease
    }
}

/// Parses `1.2.3` or `v1.2.3`.
///
/// # Errors
///
/// Returns [`ReleaseError::InvalidVersion`] if the string is not a
/// semantic version.
pub fn parse_version(tag: &str) -> Result<Version, ReleaseError> {
    let trimmed = tag.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare).map_err(|source| ReleaseError::InvalidVersion {
        version: tag.to_owned(),
        source,
    })
}

fn check_repo(repo: &str) -> Result<(), ReleaseError> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => Err(ReleaseError::InvalidRepo(repo.to_owned())),
    }
}

/// Lists the releases of `repo` from the public GitHub API.
///
/// # Errors
///
/// Returns [`ReleaseError`] if the repository name is malformed or the
/// request fails.
pub async fn fetch_releases(
    client: &reqwest::Client,
    repo: &str,
) -> Result<Vec<Release>, ReleaseError> {
    fetch_releases_from(client, DEFAULT_API_URL, repo).await
}

/// Lists the releases of `repo` from a GitHub-compatible API at `api_url`.
///
/// # Errors
///
/// Returns [`ReleaseError`] if the repository name is malformed or the
/// request fails.
pub async fn fetch_releases_from(
    client: &reqwest::Client,
    api_url: &str,
    repo: &str,
) -> Result<Vec<Release>, ReleaseError> {
    check_repo(repo)?;
    let url = format!(
        "{}/repos/{repo}/releases?per_page={PER_PAGE}",
        api_url.trim_end_matches('/')
    );
    log::debug!("Fetching releases from {url}");

    let response = client
        .get(&url)
        .header("Accept", "application/vnd.github+json")
        .header(
            "User-Agent",
            concat!("notion-map/", env!("CARGO_PKG_VERSION")),
        )
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ReleaseError::Status {
            repo: repo.to_owned(),
            status: status.as_u16(),
        });
    }

    let releases: Vec<Release> = response.json().await?;
    log::debug!("{repo} has {} releases", releases.len());
    Ok(releases)
}

/// The highest-versioned release that is neither a draft nor a
/// pre-release. Tags that are not semantic versions are ignored.
#[must_use]
pub fn latest_stable(releases: &[Release]) -> Option<&Release> {
    releases
        .iter()
        .filter(|r| r.is_stable())
        .filter_map(|r| match r.version() {
            Ok(version) => Some((version, r)),
            Err(e) => {
                log::debug!("Ignoring release: {e}");
                None
            }
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, r)| r)
}

/// Whether `latest` is newer than `current` and not the version the user
/// dismissed.
///
/// # Errors
///
/// Returns [`ReleaseError::InvalidVersion`] if `current` or the latest
/// tag is not a semantic version. An unparseable dismissed version is
/// treated as no dismissal.
pub fn update_available(
    current: &str,
    latest: &Release,
    dismissed: Option<&str>,
) -> Result<bool, ReleaseError> {
    let current = parse_version(current)?;
    let latest = latest.version()?;

    if latest <= current {
        return Ok(false);
    }
    let dismissed = dismissed.and_then(|d| parse_version(d).ok());
    Ok(dismissed.as_ref() != Some(&latest))
}

/// Download URL of the first asset whose name ends with `suffix`.
#[must_use]
pub fn asset_url<'a>(release: &'a Release, suffix: &str) -> Option<&'a str> {
    release
        .assets
        .iter()
        .find(|a| a.name.ends_with(suffix))
        .map(|a| a.browser_download_url.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(tag: &str, draft: bool, prerelease: bool) -> Release {
        Release {
            tag_name: tag.to_owned(),
            name: None,
            draft,
            prerelease,
            html_url: format!("https://github.com/o/r/releases/tag/{tag}"),
            assets: vec![ReleaseAsset {
                name: format!("notion-map-{tag}.zip"),
                browser_download_url: format!("https://github.com/o/r/releases/download/{tag}/ext.zip"),
            }],
        }
    }

    #[test]
    fn parses_tags_with_and_without_prefix() {
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert!(matches!(
            parse_version("latest"),
            Err(ReleaseError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn latest_stable_skips_drafts_and_prereleases() {
        let releases = vec![
            release("v1.1.0", false, false),
            release("v2.0.0-beta.1", false, true),
            release("v1.3.0", true, false),
            release("nightly", false, false),
            release("v1.2.0", false, false),
        ];
        assert_eq!(latest_stable(&releases).unwrap().tag_name, "v1.2.0");
        assert!(latest_stable(&[release("v1.0.0", true, false)]).is_none());
    }

    #[test]
    fn update_respects_dismissed_version() {
        let latest = release("v1.2.0", false, false);
        assert!(update_available("1.1.0", &latest, None).unwrap());
        assert!(!update_available("1.1.0", &latest, Some("v1.2.0")).unwrap());
        assert!(update_available("1.1.0", &latest, Some("1.1.5")).unwrap());
        assert!(update_available("1.1.0", &latest, Some("garbage")).unwrap());
        assert!(!update_available("1.2.0", &latest, None).unwrap());
        assert!(!update_available("1.3.0", &latest, None).unwrap());
    }

    #[test]
    fn finds_asset_by_suffix() {
        let r = release("v1.2.0", false, false);
        assert_eq!(
            asset_url(&r, ".zip"),
            Some("https://github.com/o/r/releases/download/v1.2.0/ext.zip")
        );
        assert_eq!(asset_url(&r, ".xpi"), None);
    }

    #[test]
    fn feed_json_deserializes() {
        let releases: Vec<Release> = serde_json::from_str(
            r#"[{"tag_name":"v0.3.0","draft":false,"prerelease":false,
                 "html_url":"https://x","assets":[],"author":{"login":"a"}}]"#,
        )
        .unwrap();
        assert_eq!(releases[0].tag_name, "v0.3.0");
        assert!(releases[0].name.is_none());
    }

    #[tokio::test]
    async fn rejects_malformed_repo_before_any_request() {
        let client = reqwest::Client::new();
        for repo in ["", "owner", "owner/", "a/b/c"] {
            assert!(matches!(
                fetch_releases(&client, repo).await,
                Err(ReleaseError::InvalidRepo(_))
            ));
        }
    }
}
