//! Which company lists feed which tier store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jobsift_core::{CompanyRecord, Tier};
use serde::Deserialize;
use tokio::fs;

pub const PLAN_FILE: &str = "tiers.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TierPlan {
    pub tiers: Vec<TierSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TierSpec {
    pub tier: Tier,
    /// Company list JSON, relative to the data dir unless absolute.
    pub companies: PathBuf,
    /// Store CSV, relative to the data dir unless absolute.
    pub output: PathBuf,
}

impl Default for TierPlan {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierSpec {
                    tier: Tier(1),
                    companies: PathBuf::from("tier1.json"),
                    output: PathBuf::from("tier1.csv"),
                },
                TierSpec {
                    tier: Tier(2),
                    companies: PathBuf::from("fortune500.json"),
                    output: PathBuf::from("tier2.csv"),
                },
            ],
        }
    }
}

impl TierPlan {
    /// Reads `tiers.yaml` from `data_dir`, falling back to the two-tier default.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(PLAN_FILE);
        if !fs::try_exists(&path)
            .await
            .with_context(|| format!("checking {}", path.display()))?
        {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let plan: TierPlan =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        anyhow::ensure!(!plan.tiers.is_empty(), "{} lists no tiers", path.display());
        Ok(plan)
    }

    pub fn only(mut self, tier: Option<Tier>) -> Self {
        if let Some(tier) = tier {
            self.tiers.retain(|spec| spec.tier == tier);
        }
        self
    }
}

impl TierSpec {
    pub fn companies_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.companies)
    }

    pub fn output_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.output)
    }
}

pub async fn load_companies(path: &Path) -> Result<Vec<CompanyRecord>> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
