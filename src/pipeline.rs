use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::extract::extract;
use crate::load::{load, LoadReport};
use crate::settings::RunConfig;
use crate::transform::transform;

pub const PIPELINE_ID: &str = "sales_etl_pipeline";

/// Retry and timeout settings for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StagePolicy {
    pub retries: u32,
    #[serde(serialize_with = "as_secs")]
    pub retry_delay: Duration,
    #[serde(serialize_with = "as_opt_secs")]
    pub execution_timeout: Option<Duration>,
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

fn as_opt_secs<S: serde::Serializer>(d: &Option<Duration>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_secs()),
        None => s.serialize_none(),
    }
}

impl StagePolicy {
    pub const fn once() -> Self {
        Self {
            retries: 0,
            retry_delay: Duration::ZERO,
            execution_timeout: None,
        }
    }

    pub fn without_retries(self) -> Self {
        Self { retries: 0, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Policies {
    pub extract: StagePolicy,
    pub transform: StagePolicy,
    pub load: StagePolicy,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            extract: StagePolicy {
                retries: 1,
                retry_delay: Duration::from_secs(60),
                execution_timeout: None,
            },
            transform: StagePolicy::once(),
            load: StagePolicy {
                retries: 2,
                retry_delay: Duration::from_secs(5 * 60),
                execution_timeout: Some(Duration::from_secs(60 * 60)),
            },
        }
    }
}

impl Policies {
    pub fn without_retries(self) -> Self {
        Self {
            extract: self.extract.without_retries(),
            transform: self.transform.without_retries(),
            load: self.load.without_retries(),
        }
    }
}

/// Metadata for whatever scheduler triggers the runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSchedule {
    pub id: &'static str,
    pub start_date: NaiveDate,
    pub schedule: &'static str,
    pub catchup: bool,
    pub tags: Vec<&'static str>,
    pub stages: Policies,
}

pub fn schedule() -> PipelineSchedule {
    PipelineSchedule {
        id: PIPELINE_ID,
        start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
        schedule: "@daily",
        catchup: false,
        tags: vec!["etl", "sales"],
        stages: Policies::default(),
    }
}

/// Run `stage` until it succeeds or `policy.retries` extra attempts are used up.
/// Each attempt starts from scratch.
pub fn run_stage<T>(
    name: &str,
    policy: &StagePolicy,
    mut stage: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = policy.retries + 1;
    let mut attempt = 1;
    loop {
        match stage() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    stage = name,
                    attempt,
                    retry_in_secs = policy.retry_delay.as_secs(),
                    "stage failed, retrying: {e}"
                );
                std::thread::sleep(policy.retry_delay);
                attempt += 1;
            }
            Err(e) => {
                error!(stage = name, attempt, "stage failed: {e}");
                return Err(e);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub extracted: usize,
    pub valid: usize,
    pub load: LoadReport,
}

/// Extract, transform and load, strictly in sequence.
pub fn run(config: &RunConfig, policies: &Policies) -> Result<RunSummary> {
    info!(
        pipeline = PIPELINE_ID,
        csv = %config.csv_path.display(),
        conn_id = %config.conn_id,
        "starting run"
    );
    let raw = run_stage("extract", &policies.extract, || extract(&config.csv_path))?;
    let sales = run_stage("transform", &policies.transform, || transform(&raw))?;
    let report = run_stage("load", &policies.load, || {
        load(&config.database, &sales, policies.load.execution_timeout)
    })?;
    info!(pipeline = PIPELINE_ID, "run finished");
    Ok(RunSummary {
        extracted: raw.len(),
        valid: sales.len(),
        load: report,
    })
}
