//! Downloads the upstream NWP GRIB2 forecast files from the KMA API hub.
//!
//! One request per forecast hour, in order, with a short pause between
//! requests. A failed file is counted and the loop moves on; there is no
//! retry.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_DISPOSITION;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument, warn};

use crate::fetch::{HttpClient, fetch};

pub const KMA_NWP_URL: &str = "https://apihub-pub.kma.go.kr/api/typ06/url/nwp_file_down.php";
/// Query parameter carrying the API key.
pub const AUTH_PARAM: &str = "authKey";
pub const DEFAULT_PREFIX: &str = "r030_v040_ne36_pres";
pub const DEFAULT_FIRST_HOUR: u32 = 0;
pub const DEFAULT_LAST_HOUR: u32 = 54;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const REQUEST_PAUSE: Duration = Duration::from_millis(500);
const PROGRESS_STEP: u64 = 5;

/// `{prefix}_h{HHH}.{base_time}.gb2`
pub fn grib_file_name(prefix: &str, hour: u32, base_time: &str) -> String {
    format!("{prefix}_h{hour:03}.{base_time}.gb2")
}

/// Extracts the file name from a `Content-Disposition` header value.
///
/// Handles quoted and RFC 5987 (`filename*=UTF-8''...`) forms. Directory
/// components are dropped so the file always lands in the output directory.
pub fn content_disposition_filename(value: &str) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    let start = lower.find("filename")? + "filename".len();

    let rest = value[start..].strip_prefix('*').unwrap_or(&value[start..]);
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let rest = match rest.get(..7) {
        Some(charset) if charset.eq_ignore_ascii_case("UTF-8''") => &rest[7..],
        _ => rest,
    };

    let raw = rest.split(';').next()?.trim().trim_matches('"');
    let name = Path::new(raw).file_name()?.to_str()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// What to download and where.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    /// Base time of the forecast run, `YYYYMMDDHH`.
    pub base_time: String,
    pub prefix: String,
    pub hours: RangeInclusive<u32>,
    pub output_dir: PathBuf,
    pub pause: Duration,
}

impl DownloadPlan {
    pub fn new(base_time: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_time: base_time.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            hours: DEFAULT_FIRST_HOUR..=DEFAULT_LAST_HOUR,
            output_dir: output_dir.into(),
            pause: REQUEST_PAUSE,
        }
    }

    pub fn file_names(&self) -> Vec<String> {
        self.hours
            .clone()
            .map(|h| grib_file_name(&self.prefix, h, &self.base_time))
            .collect()
    }

    /// Request URL without the API key; the client adds it.
    pub fn url(&self, file_name: &str) -> String {
        format!("{KMA_NWP_URL}?file={file_name}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Tracks bytes written and decides when a progress line is due.
#[derive(Debug)]
struct Progress {
    total: Option<u64>,
    done: u64,
    next_report: u64,
}

impl Progress {
    fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|&t| t > 0),
            done: 0,
            next_report: PROGRESS_STEP,
        }
    }

    /// Returns the percentage when it crossed the next 5 % mark.
    fn advance(&mut self, bytes: u64) -> Option<u64> {
        self.done += bytes;
        let total = self.total?;
        let percent = (self.done * 100 / total).min(100);
        if percent >= self.next_report {
            self.next_report = (percent / PROGRESS_STEP + 1) * PROGRESS_STEP;
            Some(percent)
        } else {
            None
        }
    }
}

async fn stream_body(
    resp: &mut reqwest::Response,
    file: &mut tokio::fs::File,
    progress: &mut Progress,
    file_name: &str,
) -> Result<()> {
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        if let Some(percent) = progress.advance(chunk.len() as u64) {
            info!(file_name, bytes = progress.done, total = progress.total, percent, "Downloading");
        }
    }
    file.flush().await?;
    Ok(())
}

/// Removes a partly written file and returns `err` with the path attached.
async fn discard_partial(path: &Path, err: anyhow::Error) -> anyhow::Error {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Could not remove partial download");
    }
    err.context(format!("download of {} interrupted", path.display()))
}

async fn download_one<C: HttpClient>(
    client: &C,
    plan: &DownloadPlan,
    file_name: &str,
) -> Result<PathBuf> {
    let mut resp = fetch(client, &plan.url(file_name)).await?;

    let saved_name = resp
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(content_disposition_filename)
        .unwrap_or_else(|| file_name.to_string());
    let path = plan.output_dir.join(saved_name);

    let mut file = tokio::fs::File::create(&path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    let mut progress = Progress::new(resp.content_length());

    if let Err(e) = stream_body(&mut resp, &mut file, &mut progress, file_name).await {
        drop(file);
        return Err(discard_partial(&path, e).await);
    }

    info!(path = %path.display(), bytes = progress.done, "Download complete");
    Ok(path)
}

/// Downloads every file of `plan` through `client`.
///
/// Only a failure to create the output directory is an error; individual
/// files that fail are counted in the summary.
#[instrument(skip_all, fields(base_time = %plan.base_time, prefix = %plan.prefix))]
pub async fn download_all<C: HttpClient>(client: &C, plan: &DownloadPlan) -> Result<DownloadSummary> {
    tokio::fs::create_dir_all(&plan.output_dir)
        .await
        .with_context(|| format!("creating {}", plan.output_dir.display()))?;

    let files = plan.file_names();
    info!(
        count = files.len(),
        first_hour = plan.hours.start(),
        last_hour = plan.hours.end(),
        output_dir = %plan.output_dir.display(),
        "Download started"
    );

    let mut summary = DownloadSummary::default();
    for file_name in &files {
        summary.attempted += 1;
        match download_one(client, plan, file_name).await {
            Ok(_) => summary.succeeded += 1,
            Err(e) => {
                error!(file_name = %file_name, error = %format_args!("{e:#}"), "Download failed");
                summary.failed += 1;
            }
        }
        tokio::time::sleep(plan.pause).await;
    }

    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Download finished"
    );
    Ok(summary)
}
