//! Drives asynchronous list-key jobs.
//!
//! A job moves through `Submitted → Polling → Ready → Fetching → Done`. A submit
//! that already carries results skips straight to `Done`. Polling backs off
//! while the job runs, backs off harder while the service is busy, and gives up
//! once the total wait budget would be exceeded. Pages are then fetched in
//! ascending start order; a page failure keeps what was already fetched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use super::pubchem::PubChemClient;
use super::request::{build_listkey_request, PageWindow, ProtocolRequest};
use super::response::{Envelope, ResultSet};
use super::{ErrorKind, PubChemError};
use crate::config::PollingConfig;
use crate::models::{Domain, Identifier, Operation, OutputFormat, Pagination, Query};
use crate::utils::sleep_or_cancel;

/// Polling and paging policy
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth while the job is still running
    pub backoff_multiplier: f64,
    /// Growth after a busy or transient failure
    pub busy_multiplier: f64,
    /// Total polling budget
    pub max_wait: Duration,
    pub max_busy_attempts: u32,
    pub page_size: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier.max(1.0),
            busy_multiplier: config.busy_multiplier.max(1.0),
            max_wait: Duration::from_secs(config.max_wait_secs),
            max_busy_attempts: config.max_busy_attempts,
            page_size: config.page_size.max(1),
        }
    }
}

impl PollConfig {
    /// Grow `current` by `multiplier`, never shrinking and never passing `max_delay`
    fn next_delay(&self, current: Duration, multiplier: f64) -> Duration {
        let grown = current.mul_f64(multiplier.max(1.0));
        grown.min(self.max_delay).max(current)
    }
}

/// Where a job stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Submitted,
    Polling,
    Ready,
    Fetching,
    Done,
    Expired,
    Failed,
    Cancelled,
}

/// What happened while running a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    /// Absent when the submit returned results directly
    pub list_key: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub state: JobState,
    /// Status requests sent while the job was running
    pub polls: u32,
    /// Result pages received, including the one that ended polling
    pub pages: u32,
    /// Every backoff delay slept between polls
    pub delays: Vec<Duration>,
}

impl JobReport {
    fn new() -> Self {
        Self {
            list_key: None,
            created_at: None,
            state: JobState::Submitted,
            polls: 0,
            pages: 0,
            delays: Vec::new(),
        }
    }
}

/// Result of a job: complete, or the pages fetched before a failure
#[derive(Debug)]
pub enum JobOutcome {
    Complete {
        results: ResultSet,
        report: JobReport,
    },
    Partial {
        results: ResultSet,
        error: PubChemError,
        report: JobReport,
    },
}

impl JobOutcome {
    pub fn results(&self) -> &ResultSet {
        match self {
            JobOutcome::Complete { results, .. } | JobOutcome::Partial { results, .. } => results,
        }
    }

    pub fn report(&self) -> &JobReport {
        match self {
            JobOutcome::Complete { report, .. } | JobOutcome::Partial { report, .. } => report,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, JobOutcome::Complete { .. })
    }

    /// Turn a partial outcome into [`PubChemError::PartialResults`]
    pub fn into_result(self) -> Result<ResultSet, PubChemError> {
        match self {
            JobOutcome::Complete { results, .. } => Ok(results),
            JobOutcome::Partial { results, error, .. } => Err(PubChemError::PartialResults {
                fetched: results.len(),
                source: Box::new(error),
            }),
        }
    }
}

/// A running server-side job; owned by one call to [`run`]
#[derive(Debug)]
struct ListKeyJob {
    key: String,
    domain: Domain,
    created_at: DateTime<Utc>,
}

impl ListKeyJob {
    fn new(key: String, domain: Domain) -> Self {
        Self {
            key,
            domain,
            created_at: Utc::now(),
        }
    }
}

/// The parts of a query that shape polling and paging
pub(crate) struct JobSpec<'a> {
    domain: Domain,
    operation: &'a Operation,
    pagination: Pagination,
    options: &'a BTreeMap<String, String>,
    /// The submit itself already asked the service for a window
    server_paged: bool,
}

impl<'a> JobSpec<'a> {
    pub(crate) fn from_query(query: &'a Query) -> Self {
        Self {
            domain: query.domain,
            operation: &query.operation,
            pagination: query.pagination,
            options: &query.options,
            server_paged: matches!(query.identifier, Identifier::ListKey(_)),
        }
    }

    fn start(&self) -> u32 {
        self.pagination.start.unwrap_or(0)
    }

    fn wanted(&self) -> Option<usize> {
        self.pagination.count.map(|count| count as usize)
    }

    fn window(&self, fetched: usize, page_size: u32) -> PageWindow {
        let count = match self.wanted() {
            Some(wanted) => wanted.saturating_sub(fetched).min(page_size as usize) as u32,
            None => page_size,
        };
        PageWindow {
            start: self
                .start()
                .saturating_add(u32::try_from(fetched).unwrap_or(u32::MAX)),
            count,
        }
    }

    fn page_request(
        &self,
        job: &ListKeyJob,
        window: PageWindow,
    ) -> Result<ProtocolRequest, PubChemError> {
        build_listkey_request(
            job.domain,
            &job.key,
            self.operation,
            OutputFormat::Json,
            window,
            self.options,
        )
    }
}

/// A fault saying the list key itself is no longer known
fn is_expiry(err: &PubChemError) -> bool {
    matches!(err, PubChemError::Server(fault)
        if matches!(fault.kind, ErrorKind::NotFound | ErrorKind::BadRequest)
            && fault.mentions_list_key())
}

fn data_of(envelope: Envelope, list_key: &str) -> Result<ResultSet, PubChemError> {
    match envelope {
        Envelope::Data(value) => ResultSet::from_json(&value),
        Envelope::Fault(fault) => Err(PubChemError::Server(fault)),
        Envelope::Waiting { .. } => Err(PubChemError::ListKeyFailed {
            list_key: list_key.to_string(),
            source: Box::new(PubChemError::ResponseParse(
                "job reported running after it was ready".to_string(),
            )),
        }),
    }
}

/// Submit `request` and drive the resulting job to completion
pub(crate) async fn run(
    client: &PubChemClient,
    request: &ProtocolRequest,
    spec: &JobSpec<'_>,
) -> Result<JobOutcome, PubChemError> {
    let mut report = JobReport::new();

    let response = client.send_with_retry(request).await?;
    let job = match Envelope::parse(&response.body)? {
        Envelope::Data(value) => {
            let mut results = ResultSet::from_json(&value)?;
            if !spec.server_paged {
                results = results.window(spec.pagination);
            }
            report.state = JobState::Done;
            report.pages = 1;
            return Ok(JobOutcome::Complete { results, report });
        }
        Envelope::Fault(fault) => return Err(PubChemError::Server(fault)),
        Envelope::Waiting { list_key, message } => {
            tracing::debug!(
                "Job submitted, list key {} ({})",
                list_key,
                message.as_deref().unwrap_or("no message")
            );
            ListKeyJob::new(list_key, spec.domain)
        }
    };

    report.list_key = Some(job.key.clone());
    report.created_at = Some(job.created_at);

    let first_page = poll(client, &job, spec, &mut report).await?;
    Ok(fetch(client, &job, spec, first_page, report).await)
}

async fn poll(
    client: &PubChemClient,
    job: &ListKeyJob,
    spec: &JobSpec<'_>,
    report: &mut JobReport,
) -> Result<ResultSet, PubChemError> {
    let config = client.poll_config();
    let started = Instant::now();
    let mut delay = config.initial_delay.min(config.max_delay);
    let mut busy = 0;

    report.state = JobState::Polling;
    let request = spec.page_request(job, spec.window(0, config.page_size))?;

    loop {
        if client.is_cancelled() {
            report.state = JobState::Cancelled;
            return Err(PubChemError::Cancelled);
        }

        report.polls += 1;
        tracing::debug!("Polling list key {} (attempt {})", job.key, report.polls);

        let outcome = client
            .send(&request)
            .await
            .and_then(|response| Envelope::parse(&response.body));

        let error = match outcome {
            Ok(Envelope::Data(value)) => {
                report.state = JobState::Ready;
                return ResultSet::from_json(&value);
            }
            Ok(Envelope::Waiting { .. }) => None,
            Ok(Envelope::Fault(fault)) => Some(PubChemError::Server(fault)),
            Err(err) => Some(err),
        };

        let multiplier = match error {
            None => config.backoff_multiplier,
            Some(PubChemError::Cancelled) => {
                report.state = JobState::Cancelled;
                return Err(PubChemError::Cancelled);
            }
            Some(err) if err.kind().is_some_and(|kind| kind.is_transient()) => {
                busy += 1;
                if busy > config.max_busy_attempts {
                    tracing::warn!(
                        "List key {} still failing after {} busy responses: {}",
                        job.key,
                        busy,
                        err
                    );
                    report.state = JobState::Failed;
                    return Err(err);
                }
                config.busy_multiplier
            }
            Some(err) if is_expiry(&err) => {
                report.state = JobState::Expired;
                return Err(PubChemError::ListKeyExpired {
                    list_key: job.key.clone(),
                });
            }
            // no matches is an answer, not a failed job
            Some(err) if err.is_not_found() => {
                report.state = JobState::Done;
                return Err(err);
            }
            Some(err) => {
                report.state = JobState::Failed;
                return Err(PubChemError::ListKeyFailed {
                    list_key: job.key.clone(),
                    source: Box::new(err),
                });
            }
        };

        let waited = started.elapsed();
        if waited + delay > config.max_wait {
            report.state = JobState::Failed;
            return Err(PubChemError::PollTimeout {
                list_key: job.key.clone(),
                waited,
            });
        }

        report.delays.push(delay);
        if let Err(err) = sleep_or_cancel(delay, client.cancellation_token()).await {
            report.state = JobState::Cancelled;
            return Err(err);
        }
        delay = config.next_delay(delay, multiplier);
    }
}

async fn fetch(
    client: &PubChemClient,
    job: &ListKeyJob,
    spec: &JobSpec<'_>,
    first_page: ResultSet,
    mut report: JobReport,
) -> JobOutcome {
    let page_size = client.poll_config().page_size;
    report.state = JobState::Fetching;
    report.pages = 1;

    let mut requested = spec.window(0, page_size).count as usize;
    let mut last_page = first_page.len();
    let mut results = first_page;

    loop {
        let fetched = results.len();
        // a reported total wins over page length, the service may cap pages
        let exhausted = match results.total() {
            Some(total) => spec.start() as u64 + fetched as u64 >= total,
            None => last_page < requested,
        };
        if spec.wanted().is_some_and(|wanted| fetched >= wanted) || last_page == 0 || exhausted {
            break;
        }

        if client.is_cancelled() {
            report.state = JobState::Cancelled;
            return JobOutcome::Partial {
                results,
                error: PubChemError::Cancelled,
                report,
            };
        }

        let window = spec.window(fetched, page_size);
        let page = match spec.page_request(job, window) {
            Ok(request) => match client.send_with_retry(&request).await {
                Ok(response) => Envelope::parse(&response.body)
                    .and_then(|envelope| data_of(envelope, &job.key)),
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };

        match page {
            Ok(page) => {
                tracing::debug!(
                    "Fetched {} results from list key {} at offset {}",
                    page.len(),
                    job.key,
                    window.start
                );
                requested = window.count as usize;
                last_page = page.len();
                results.extend(page);
                report.pages += 1;
            }
            Err(err) if is_expiry(&err) => {
                tracing::warn!(
                    "List key {} expired after {} results",
                    job.key,
                    results.len()
                );
                report.state = JobState::Expired;
                return JobOutcome::Partial {
                    results,
                    error: PubChemError::ListKeyExpired {
                        list_key: job.key.clone(),
                    },
                    report,
                };
            }
            // past the end of the list
            Err(err) if err.is_not_found() => break,
            Err(err) => {
                tracing::warn!(
                    "List key {} stopped after {} results: {}",
                    job.key,
                    results.len(),
                    err
                );
                report.state = if matches!(err, PubChemError::Cancelled) {
                    JobState::Cancelled
                } else {
                    JobState::Failed
                };
                return JobOutcome::Partial {
                    results,
                    error: err,
                    report,
                };
            }
        }
    }

    if let Some(wanted) = spec.wanted() {
        results.truncate(wanted);
    }
    report.state = JobState::Done;
    tracing::info!(
        "List key {} complete: {} results in {} pages after {} polls ({}s)",
        job.key,
        results.len(),
        report.pages,
        report.polls,
        (Utc::now() - job.created_at).num_seconds()
    );
    JobOutcome::Complete { results, report }
}
