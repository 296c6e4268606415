//! Query façade tying request building, transport, polling and decoding together.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::classify::{classify, ServerFault};
use super::listkey::{self, JobOutcome, JobSpec, PollConfig};
use super::request::{build_request, build_sources_request, ProtocolRequest};
use super::response::{check_format, Envelope, IdKind, ResultSet, ResultShape};
use super::{ErrorKind, HttpResponse, PubChemError, Transport};
use crate::config::Config;
use crate::models::{
    Assay, Compound, Domain, DownloadRequest, DownloadResult, Identifier, Operation,
    OutputFormat, Pagination, PropertyRow, Query, Substance, SynonymSet,
};
use crate::utils::{check_destination, save, with_retry, HttpClient, RequestSpacing, RetryConfig};

/// State shared by every handle of one client
#[derive(Debug)]
struct Session {
    transport: Arc<dyn Transport>,
    base_url: String,
    spacing: Option<RequestSpacing>,
    retry: RetryConfig,
    polling: PollConfig,
}

/// PubChem PUG REST client
///
/// Cheap to clone; clones share the transport and the request spacing.
/// Cancellation belongs to a handle, see [`PubChemClient::with_cancellation`].
#[derive(Debug, Clone)]
pub struct PubChemClient {
    session: Arc<Session>,
    cancel: CancellationToken,
}

/// Payload of a generic query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Json(ResultSet),
    /// Any non-JSON format, passed through after a plausibility check
    Opaque { format: OutputFormat, bytes: Vec<u8> },
}

fn not_found(message: impl Into<String>) -> PubChemError {
    PubChemError::Server(ServerFault {
        kind: ErrorKind::NotFound,
        status: None,
        code: None,
        message: message.into(),
        details: Vec::new(),
    })
}

/// "No matches" is an empty answer for search-style operations
fn empty_on_not_found(
    result: Result<ResultSet, PubChemError>,
    shape: ResultShape,
) -> Result<ResultSet, PubChemError> {
    match result {
        Err(PubChemError::Server(fault)) if fault.kind == ErrorKind::NotFound => {
            tracing::debug!("No matching records: {}", fault.message);
            Ok(ResultSet::empty(shape))
        }
        other => other,
    }
}

fn json_query(mut query: Query, operation: Operation) -> Query {
    query.operation = operation;
    query.output = OutputFormat::Json;
    query
}

impl PubChemClient {
    /// Client for the public service with default settings
    pub fn new() -> Result<Self, PubChemError> {
        Self::from_config(&Config::default())
    }

    /// Client backed by reqwest, configured from `config`
    pub fn from_config(config: &Config) -> Result<Self, PubChemError> {
        let transport = HttpClient::from_config(&config.api)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Client over any [`Transport`]
    pub fn with_transport(transport: Arc<dyn Transport>, config: &Config) -> Self {
        let spacing = RequestSpacing::new(config.rate_limits.min_request_interval());
        if spacing.is_none() {
            tracing::debug!("Request spacing disabled");
        }

        Self {
            session: Arc::new(Session {
                transport,
                base_url: config.api.base_url.trim_end_matches('/').to_string(),
                spacing,
                retry: RetryConfig::from(&config.retry),
                polling: PollConfig::from(&config.polling),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// A handle that stops its operations when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn base_url(&self) -> &str {
        &self.session.base_url
    }

    pub(crate) fn poll_config(&self) -> &PollConfig {
        &self.session.polling
    }

    /// Send one request, no retries; non-2xx statuses become [`PubChemError::Server`]
    pub(crate) async fn send(&self, request: &ProtocolRequest) -> Result<HttpResponse, PubChemError> {
        if self.cancel.is_cancelled() {
            return Err(PubChemError::Cancelled);
        }
        if let Some(spacing) = &self.session.spacing {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(PubChemError::Cancelled),
                _ = spacing.until_ready() => {}
            }
        }

        let http = request.to_http(&self.session.base_url);
        tracing::debug!(
            "{} {} (form body: {})",
            http.method,
            http.url,
            http.body.is_some()
        );

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(PubChemError::Cancelled),
            response = self.session.transport.execute(&http) => response?,
        };

        if !response.status.is_success() {
            let fault = classify(response.status, &response.body);
            tracing::debug!("{} {} failed: {}", http.method, http.url, fault);
            return Err(PubChemError::Server(fault));
        }
        Ok(response)
    }

    /// [`send`](Self::send) with the configured retry policy
    pub(crate) async fn send_with_retry(
        &self,
        request: &ProtocolRequest,
    ) -> Result<HttpResponse, PubChemError> {
        with_retry(&self.session.retry, &self.cancel, || self.send(request)).await
    }

    /// Run a JSON query through the job poller, keeping partial results
    ///
    /// Queries the service answers directly complete without any polling.
    pub async fn run_job(&self, query: &Query) -> Result<JobOutcome, PubChemError> {
        if query.output != OutputFormat::Json {
            return Err(PubChemError::Precondition(format!(
                "{} output cannot be decoded, use get or download",
                query.output.as_str()
            )));
        }
        let request = build_request(query)?;
        listkey::run(self, &request, &JobSpec::from_query(query)).await
    }

    async fn fetch_json(&self, query: &Query) -> Result<ResultSet, PubChemError> {
        self.run_job(query).await?.into_result()
    }

    /// Fetch the raw payload of a query in its declared format
    async fn fetch_bytes(&self, query: &Query) -> Result<Vec<u8>, PubChemError> {
        let direct = if query.is_async() {
            // the hit list comes from a job, the payload from a plain CID lookup
            let hits = json_query(query.clone(), Operation::Cids);
            let cids = self.fetch_json(&hits).await?.identifiers(IdKind::Cid)?;
            if cids.is_empty() {
                return Err(not_found("No CID found"));
            }
            Query {
                domain: Domain::Compound,
                identifier: Identifier::cids(cids),
                operation: query.operation.clone(),
                search: None,
                pagination: Pagination::default(),
                output: query.output,
                options: query.options.clone(),
            }
        } else {
            query.clone()
        };

        let request = build_request(&direct)?;
        let response = self.send_with_retry(&request).await?;
        check_format(direct.output, &response.body)?;
        Ok(response.body)
    }

    /// Run any query, decoding JSON and passing other formats through
    pub async fn get(&self, query: &Query) -> Result<QueryOutput, PubChemError> {
        match query.output {
            OutputFormat::Json => Ok(QueryOutput::Json(self.fetch_json(query).await?)),
            format => Ok(QueryOutput::Opaque {
                format,
                bytes: self.fetch_bytes(query).await?,
            }),
        }
    }

    /// Full compound records matching `query`; empty when nothing matches
    pub async fn get_compounds(&self, query: Query) -> Result<Vec<Compound>, PubChemError> {
        let query = json_query(query, Operation::Record);
        empty_on_not_found(self.fetch_json(&query).await, ResultShape::Compounds)?.compounds()
    }

    pub async fn get_substances(&self, query: Query) -> Result<Vec<Substance>, PubChemError> {
        let query = json_query(query, Operation::Record);
        empty_on_not_found(self.fetch_json(&query).await, ResultShape::Substances)?.substances()
    }

    pub async fn get_assays(&self, query: Query) -> Result<Vec<Assay>, PubChemError> {
        let query = json_query(query, Operation::Description);
        empty_on_not_found(self.fetch_json(&query).await, ResultShape::Assays)?.assays()
    }

    /// Property table rows; tag names may be server names, snake_case or natural names
    pub async fn get_properties<I, S>(
        &self,
        tags: I,
        query: Query,
    ) -> Result<Vec<PropertyRow>, PubChemError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let query = json_query(query, Operation::property(tags));
        empty_on_not_found(self.fetch_json(&query).await, ResultShape::Properties)?.properties()
    }

    pub async fn get_synonyms(&self, query: Query) -> Result<Vec<SynonymSet>, PubChemError> {
        let query = json_query(query, Operation::Synonyms);
        empty_on_not_found(self.fetch_json(&query).await, ResultShape::Information)?.synonyms()
    }

    pub async fn get_cids(&self, query: Query) -> Result<Vec<u64>, PubChemError> {
        self.get_identifiers(query, Operation::Cids, IdKind::Cid)
            .await
    }

    pub async fn get_sids(&self, query: Query) -> Result<Vec<u64>, PubChemError> {
        self.get_identifiers(query, Operation::Sids, IdKind::Sid)
            .await
    }

    pub async fn get_aids(&self, query: Query) -> Result<Vec<u64>, PubChemError> {
        self.get_identifiers(query, Operation::Aids, IdKind::Aid)
            .await
    }

    async fn get_identifiers(
        &self,
        query: Query,
        operation: Operation,
        kind: IdKind,
    ) -> Result<Vec<u64>, PubChemError> {
        let query = json_query(query, operation);
        let results = empty_on_not_found(
            self.fetch_json(&query).await,
            ResultShape::Identifiers(kind),
        )?;
        results.identifiers(kind)
    }

    /// Names of every depositor in a substance or assay domain
    pub async fn get_all_sources(&self, domain: Domain) -> Result<Vec<String>, PubChemError> {
        let request = build_sources_request(domain)?;
        let response = self.send_with_retry(&request).await?;
        match Envelope::parse(&response.body)? {
            Envelope::Data(value) => ResultSet::from_json(&value)?.source_names(),
            Envelope::Fault(fault) => Err(PubChemError::Server(fault)),
            Envelope::Waiting { list_key, .. } => Err(PubChemError::ResponseParse(format!(
                "unexpected pending job {} for a source listing",
                list_key
            ))),
        }
    }

    /// A single compound; an unknown CID is a `NotFound` error
    pub async fn compound_from_cid(&self, cid: u64) -> Result<Compound, PubChemError> {
        let query = Query::compound(Identifier::cid(cid));
        self.fetch_json(&query)
            .await?
            .compounds()?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(format!("No compound with CID {}", cid)))
    }

    /// Same as [`compound_from_cid`](Self::compound_from_cid) with the 3-D conformer record
    pub async fn compound_3d_from_cid(&self, cid: u64) -> Result<Compound, PubChemError> {
        let query = Query::compound(Identifier::cid(cid)).record_type_3d();
        self.fetch_json(&query)
            .await?
            .compounds()?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(format!("No 3D conformer for CID {}", cid)))
    }

    pub async fn substance_from_sid(&self, sid: u64) -> Result<Substance, PubChemError> {
        let query = Query::substance(Identifier::sid(sid));
        self.fetch_json(&query)
            .await?
            .substances()?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(format!("No substance with SID {}", sid)))
    }

    pub async fn assay_from_aid(&self, aid: u64) -> Result<Assay, PubChemError> {
        let query = Query::assay(Identifier::aid(aid)).operation(Operation::Description);
        self.fetch_json(&query)
            .await?
            .assays()?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(format!("No assay with AID {}", aid)))
    }

    pub async fn compound_synonyms(&self, cid: u64) -> Result<Vec<String>, PubChemError> {
        let sets = self
            .get_synonyms(Query::compound(Identifier::cid(cid)))
            .await?;
        Ok(sets.into_iter().flat_map(|set| set.synonyms).collect())
    }

    pub async fn compound_sids(&self, cid: u64) -> Result<Vec<u64>, PubChemError> {
        self.get_sids(Query::compound(Identifier::cid(cid))).await
    }

    pub async fn compound_aids(&self, cid: u64) -> Result<Vec<u64>, PubChemError> {
        self.get_aids(Query::compound(Identifier::cid(cid))).await
    }

    pub async fn substance_cids(&self, sid: u64) -> Result<Vec<u64>, PubChemError> {
        self.get_cids(Query::substance(Identifier::sid(sid))).await
    }

    pub async fn substance_aids(&self, sid: u64) -> Result<Vec<u64>, PubChemError> {
        self.get_aids(Query::substance(Identifier::sid(sid))).await
    }

    pub async fn assay_cids(&self, aid: u64) -> Result<Vec<u64>, PubChemError> {
        self.get_cids(Query::assay(Identifier::aid(aid))).await
    }

    pub async fn assay_sids(&self, aid: u64) -> Result<Vec<u64>, PubChemError> {
        self.get_sids(Query::assay(Identifier::aid(aid))).await
    }

    /// Save the response to `request.path` in `request.format`
    ///
    /// The destination is checked before any request is sent, and the file only
    /// appears once the whole payload has been written.
    pub async fn download(
        &self,
        query: Query,
        request: DownloadRequest,
    ) -> Result<DownloadResult, PubChemError> {
        check_destination(&request.path, request.overwrite)?;

        let mut query = query;
        query.output = request.format;
        let bytes = self.fetch_bytes(&query).await?;

        let result = save(request.path, bytes, request.overwrite).await?;
        tracing::info!("Saved {} bytes to {}", result.bytes, result.path.display());
        Ok(result)
    }
}
