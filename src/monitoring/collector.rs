use super::{timestamp_too_old, CheckResult};
use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const INDEX_PATH: &str = "/index/index.json";
const INDEX_CREATED_FORMAT: &str = "%Y-%m-%d %H:%M";

const INDEX_WARNING_SECS: i64 = 15 * 60;
const INDEX_CRITICAL_SECS: i64 = 20 * 60;
const LATEST_WARNING_SECS: i64 = 80 * 60;
const LATEST_CRITICAL_SECS: i64 = 90 * 60;

/// The mirror's `index.json`
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorIndex {
    pub index_created: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub directories: Vec<IndexDirectory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexDirectory {
    pub path: String,
    #[serde(default)]
    pub directories: Vec<IndexDirectory>,
    #[serde(default)]
    pub files: Vec<IndexFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexFile {
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl CollectorIndex {
    /// When the index was generated
    pub fn created(&self) -> anyhow::Result<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.index_created, INDEX_CREATED_FORMAT)
            .map(|naive| naive.and_utc())
            .with_context(|| format!("bad index_created value {:?}", self.index_created))
    }

    /// Files in the directory at a slash-separated path such as
    /// `recent/relay-descriptors/consensuses`
    pub fn directory_contents(&self, path: &str) -> anyhow::Result<&[IndexFile]> {
        let mut directories = &self.directories;
        let mut found: Option<&IndexDirectory> = None;

        for component in path.split('/').filter(|c| !c.is_empty()) {
            let directory = directories
                .iter()
                .find(|d| d.path == component)
                .ok_or_else(|| anyhow!("directory {} not found in index", path))?;
            directories = &directory.directories;
            found = Some(directory);
        }

        found
            .map(|d| d.files.as_slice())
            .ok_or_else(|| anyhow!("empty directory path"))
    }
}

/// How a category encodes timestamps in its file names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `YYYY-MM-DD-HH-MM-SS` prefix
    Dashed,
    /// `YYYYMMDD-HHMMSS` prefix, used by bridge statuses
    Compact,
}

impl TimestampFormat {
    fn pattern(&self) -> (usize, &'static str) {
        match self {
            Self::Dashed => (19, "%Y-%m-%d-%H-%M-%S"),
            Self::Compact => (15, "%Y%m%d-%H%M%S"),
        }
    }

    /// Parses the timestamp at the start of `file_name`
    pub fn parse(&self, file_name: &str) -> anyhow::Result<DateTime<Utc>> {
        let (len, format) = self.pattern();
        let prefix = file_name
            .get(..len)
            .ok_or_else(|| anyhow!("file name {:?} is too short for a timestamp", file_name))?;
        NaiveDateTime::parse_from_str(prefix, format)
            .map(|naive| naive.and_utc())
            .with_context(|| format!("no timestamp in file name {:?}", file_name))
    }
}

/// A directory of the mirror whose newest file should be recent
#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub name: &'static str,
    pub path: &'static str,
    pub format: TimestampFormat,
}

pub const CATEGORIES: &[Category] = &[
    Category {
        name: "bridge_server_descriptors",
        path: "recent/bridge-descriptors/server-descriptors",
        format: TimestampFormat::Dashed,
    },
    Category {
        name: "bridge_extra_info",
        path: "recent/bridge-descriptors/extra-infos",
        format: TimestampFormat::Dashed,
    },
    Category {
        name: "bridge_status",
        path: "recent/bridge-descriptors/statuses",
        format: TimestampFormat::Compact,
    },
    Category {
        name: "exit_list",
        path: "recent/exit-lists",
        format: TimestampFormat::Dashed,
    },
    Category {
        name: "relay_consensus",
        path: "recent/relay-descriptors/consensuses",
        format: TimestampFormat::Dashed,
    },
    Category {
        name: "relay_extra_info",
        path: "recent/relay-descriptors/extra-infos",
        format: TimestampFormat::Dashed,
    },
    Category {
        name: "relay_consensus_microdesc",
        path: "recent/relay-descriptors/microdescs/consensus-microdesc",
        format: TimestampFormat::Dashed,
    },
    Category {
        name: "relay_microdesc",
        path: "recent/relay-descriptors/microdescs/micro",
        format: TimestampFormat::Dashed,
    },
    Category {
        name: "relay_server_descriptors",
        path: "recent/relay-descriptors/server-descriptors",
        format: TimestampFormat::Dashed,
    },
    Category {
        name: "relay_vote",
        path: "recent/relay-descriptors/votes",
        format: TimestampFormat::Dashed,
    },
];

/// A single monitoring check
#[derive(Debug, Clone, Copy)]
pub enum Check {
    IndexCreated,
    LatestRecent(&'static Category),
}

impl Check {
    /// Every check, index first
    pub fn all() -> Vec<Check> {
        std::iter::once(Check::IndexCreated)
            .chain(CATEGORIES.iter().map(Check::LatestRecent))
            .collect()
    }

    pub fn by_name(name: &str) -> Option<Check> {
        Self::all().into_iter().find(|check| check.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::IndexCreated => "index",
            Self::LatestRecent(category) => category.name,
        }
    }
}

/// A remote mirror serving `index/index.json`
pub struct CollectorRemote {
    client: Client,
    base_url: String,
}

impl CollectorRemote {
    pub fn new(host: &str, https: bool) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let scheme = if https { "https" } else { "http" };
        Ok(Self::with_client(client, format!("{}://{}", scheme, host)))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_index(&self) -> anyhow::Result<CollectorIndex> {
        let url = format!("{}{}", self.base_url, INDEX_PATH);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to fetch {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} returned HTTP {}", url, status.as_u16());
        }

        let body = response.text().await?;
        serde_json::from_str(&body).with_context(|| format!("invalid index JSON from {}", url))
    }
}

/// Checks that the index itself was regenerated recently
pub fn check_index_created(index: &CollectorIndex, now: DateTime<Utc>) -> anyhow::Result<CheckResult> {
    let timestamps = BTreeMap::from([("index_created".to_string(), index.created()?)]);
    Ok(timestamp_too_old(&timestamps, INDEX_WARNING_SECS, INDEX_CRITICAL_SECS, now))
}

/// Checks that the newest file of a category is recent
pub fn check_latest_recent(
    index: &CollectorIndex,
    category: &Category,
    now: DateTime<Utc>,
) -> anyhow::Result<CheckResult> {
    let latest = index
        .directory_contents(category.path)?
        .iter()
        .map(|file| file.path.as_str())
        .max()
        .ok_or_else(|| anyhow!("no files in {}", category.path))?;

    let timestamps = BTreeMap::from([(
        format!("latest_{}", category.name),
        category.format.parse(latest)?,
    )]);
    Ok(timestamp_too_old(&timestamps, LATEST_WARNING_SECS, LATEST_CRITICAL_SECS, now))
}

/// Runs a check against a downloaded index; any error is reported as critical
pub fn run_check(index: &CollectorIndex, check: Check, now: DateTime<Utc>) -> CheckResult {
    let result = match check {
        Check::IndexCreated => check_index_created(index, now),
        Check::LatestRecent(category) => check_latest_recent(index, category, now),
    };

    result.unwrap_or_else(|e| CheckResult::critical(format!("{:#}", e)))
}

/// Downloads the index once and runs every check in `checks` against it
///
/// If the index cannot be fetched, every check is critical.
pub async fn run_checks(
    remote: &CollectorRemote,
    checks: &[Check],
    now: DateTime<Utc>,
) -> Vec<(Check, CheckResult)> {
    match remote.get_index().await {
        Ok(index) => checks
            .iter()
            .map(|&check| (check, run_check(&index, check, now)))
            .collect(),
        Err(e) => {
            let message = format!("{:#}", e);
            checks
                .iter()
                .map(|&check| (check, CheckResult::critical(message.clone())))
                .collect()
        }
    }
}
