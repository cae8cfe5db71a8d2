//! Run orchestration: adapter → filters → liveness → dedupe → store, per tier.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jobsift_adapters::{AdapterError, AdapterRegistry, SourceAdapter};
use jobsift_core::{CompanyRecord, NormalizedPosting, Tier, TierRunStats};
use jobsift_filters::{verify_apply_link, FilterConfig, FilterPipeline, LinkProbe};
use jobsift_storage::{
    BackoffPolicy, FirstSeenLog, HttpClientConfig, HttpFetcher, PostingStore, RunHistoryEntry,
    RunHistoryLog,
};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod plan;

pub use plan::{load_companies, TierPlan, TierSpec};

pub const CRATE_NAME: &str = "jobsift-sync";

pub const FIRST_SEEN_FILE: &str = "first_seen.csv";
pub const RUN_HISTORY_FILE: &str = "run_history.csv";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub data_dir: PathBuf,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub max_retries: usize,
    pub concurrency: usize,
    pub verify_apply_links: bool,
    pub freshness_hours: i64,
    pub max_experience_years: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            user_agent: "jobsift-bot/0.1".to_string(),
            http_timeout_secs: 20,
            max_retries: 2,
            concurrency: 4,
            verify_apply_links: true,
            freshness_hours: 24,
            max_experience_years: 2,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("JOBSIFT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            user_agent: std::env::var("JOBSIFT_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout_secs: env_parse("JOBSIFT_HTTP_TIMEOUT_SECS")
                .unwrap_or(defaults.http_timeout_secs),
            max_retries: env_parse("JOBSIFT_MAX_RETRIES").unwrap_or(defaults.max_retries),
            concurrency: env_parse("JOBSIFT_CONCURRENCY").unwrap_or(defaults.concurrency),
            verify_apply_links: std::env::var("JOBSIFT_VERIFY_APPLY_LINKS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(defaults.verify_apply_links),
            freshness_hours: env_parse("JOBSIFT_FRESHNESS_HOURS")
                .unwrap_or(defaults.freshness_hours),
            max_experience_years: env_parse("JOBSIFT_MAX_EXPERIENCE_YEARS")
                .unwrap_or(defaults.max_experience_years),
        }
    }

    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            freshness_hours: self.freshness_hours,
            max_experience_years: self.max_experience_years,
        }
    }

    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
            backoff: BackoffPolicy {
                max_retries: self.max_retries,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Clone, Serialize)]
pub struct TierFailure {
    pub tier: Tier,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tiers: Vec<TierRunStats>,
    pub failed_tiers: Vec<TierFailure>,
}

impl SyncRunSummary {
    pub fn is_success(&self) -> bool {
        self.failed_tiers.is_empty()
    }
}

/// What one company task hands back to the tier loop.
#[derive(Debug)]
struct CompanyHarvest {
    scraped: usize,
    accepted: Vec<NormalizedPosting>,
}

pub struct SyncPipeline {
    config: SyncConfig,
    http: Arc<HttpFetcher>,
    registry: AdapterRegistry,
    filters: FilterPipeline,
    probe: Option<Arc<dyn LinkProbe>>,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig) -> Result<Self> {
        let http = Arc::new(HttpFetcher::new(config.http_config())?);
        let probe = if config.verify_apply_links {
            Some(http.clone() as Arc<dyn LinkProbe>)
        } else {
            None
        };
        Ok(Self {
            filters: FilterPipeline::new(config.filter_config()),
            registry: AdapterRegistry::builtin(),
            config,
            http,
            probe,
        })
    }

    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_link_probe(mut self, probe: Option<Arc<dyn LinkProbe>>) -> Self {
        self.probe = probe;
        self
    }

    /// Runs every planned tier (or just `only`). Company lists are all loaded
    /// before any scraping starts; a bad list aborts the run. A tier whose
    /// store cannot be written is reported in the summary and the remaining
    /// tiers still run.
    pub async fn run_once(&self, only: Option<Tier>) -> Result<SyncRunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let data_dir = &self.config.data_dir;

        let plan = TierPlan::load(data_dir).await?.only(only);
        if let Some(tier) = only {
            anyhow::ensure!(!plan.tiers.is_empty(), "{tier} is not in the tier plan");
        }

        let mut work = Vec::with_capacity(plan.tiers.len());
        for spec in plan.tiers {
            let companies = load_companies(&spec.companies_path(data_dir)).await?;
            work.push((spec, companies));
        }

        let mut tiers = Vec::new();
        let mut failed_tiers = Vec::new();
        for (spec, companies) in work {
            let span = info_span!("tier_run", %run_id, tier = %spec.tier);
            match self.run_tier(&spec, &companies).instrument(span).await {
                Ok(stats) => tiers.push(stats),
                Err(err) => {
                    error!(%run_id, tier = %spec.tier, error = ?err, "tier failed");
                    failed_tiers.push(TierFailure {
                        tier: spec.tier,
                        error: format!("{err:#}"),
                    });
                }
            }
        }

        Ok(SyncRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            tiers,
            failed_tiers,
        })
    }

    pub async fn run_tier(&self, spec: &TierSpec, companies: &[CompanyRecord]) -> Result<TierRunStats> {
        let now = Utc::now();
        let mut stats = TierRunStats {
            tier: spec.tier,
            ..Default::default()
        };

        let limit = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = Vec::with_capacity(companies.len());
        for company in companies {
            if company.tier != spec.tier {
                warn!(
                    company = %company.company,
                    ats = %company.ats,
                    record_tier = %company.tier,
                    "company record tier differs from the tier being run"
                );
            }
            let Some(adapter) = self.registry.resolve(&company.ats) else {
                warn!(company = %company.company, ats = %company.ats, "no adapter for ats; skipping");
                stats.skipped_companies += 1;
                continue;
            };
            let task = self.spawn_company(adapter, company.clone(), limit.clone(), now);
            tasks.push((company, task));
        }

        let mut accepted = Vec::new();
        for (company, task) in tasks {
            match task.await {
                Ok(Ok(harvest)) => {
                    stats.scraped += harvest.scraped;
                    stats.accepted += harvest.accepted.len();
                    accepted.extend(harvest.accepted);
                }
                Ok(Err(err)) => {
                    error!(company = %company.company, ats = %company.ats, error = %err, "company failed");
                    stats.failed_companies += 1;
                }
                Err(join) => {
                    error!(company = %company.company, ats = %company.ats, error = %join, "company task aborted");
                    stats.failed_companies += 1;
                }
            }
        }

        let data_dir = &self.config.data_dir;
        let store = PostingStore::new(spec.output_path(data_dir));
        stats.added = store
            .add_batch(&accepted)
            .await
            .with_context(|| format!("writing {}", store.path().display()))?;
        stats.duplicates = accepted.len() - stats.added;

        let names: Vec<String> = companies.iter().map(|c| c.company.clone()).collect();
        let first_seen = FirstSeenLog::new(data_dir.join(FIRST_SEEN_FILE));
        first_seen
            .record(now, spec.tier, &names)
            .await
            .with_context(|| format!("updating {}", first_seen.path().display()))?;
        let history = RunHistoryLog::new(data_dir.join(RUN_HISTORY_FILE));
        history
            .record(now, &stats)
            .await
            .with_context(|| format!("updating {}", history.path().display()))?;

        info!(
            tier = %spec.tier,
            scraped = stats.scraped,
            accepted = stats.accepted,
            added = stats.added,
            duplicates = stats.duplicates,
            failed = stats.failed_companies,
            skipped = stats.skipped_companies,
            "tier complete"
        );
        Ok(stats)
    }

    fn spawn_company(
        &self,
        adapter: Arc<dyn SourceAdapter>,
        company: CompanyRecord,
        limit: Arc<Semaphore>,
        now: DateTime<Utc>,
    ) -> tokio::task::JoinHandle<Result<CompanyHarvest, AdapterError>> {
        let http = self.http.clone();
        let filters = self.filters.clone();
        let probe = self.probe.clone();
        let span = info_span!("company", company = %company.company, ats = %company.ats);
        tokio::spawn(
            async move {
                let _permit = limit.acquire_owned().await.ok();
                let raws = adapter.scrape(&http, &company).await?;
                let outcome = filters.apply(&company, &raws, now);
                debug!(
                    scraped = raws.len(),
                    kept = outcome.kept.len(),
                    rejected = outcome.rejected_total(),
                    "company filtered"
                );
                let accepted = match &probe {
                    Some(probe) => {
                        let mut verified = Vec::with_capacity(outcome.kept.len());
                        for posting in outcome.kept {
                            verified.push(verify_apply_link(posting, probe.as_ref()).await);
                        }
                        verified
                    }
                    None => outcome.kept,
                };
                Ok(CompanyHarvest {
                    scraped: raws.len(),
                    accepted,
                })
            }
            .instrument(span),
        )
    }
}

/// Most recent run-history rows, newest last, optionally for one tier.
pub async fn recent_history(
    config: &SyncConfig,
    tier: Option<Tier>,
    limit: usize,
) -> Result<Vec<RunHistoryEntry>> {
    let log = RunHistoryLog::new(config.data_dir.join(RUN_HISTORY_FILE));
    let entries = log
        .entries()
        .await
        .with_context(|| format!("reading {}", log.path().display()))?;
    let mut entries: Vec<_> = entries
        .into_iter()
        .filter(|e| tier.is_none() || e.tier.parse::<Tier>().ok() == tier)
        .collect();
    let skip = entries.len().saturating_sub(limit);
    Ok(entries.split_off(skip))
}
