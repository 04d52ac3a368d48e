//! RPC publisher resolution and capability probing.
//!
//! For the chain a cycle trades on, the resolver first consults the
//! config override mapping, then falls back to discovering a
//! chain-appropriate RPC publisher in the live catalog. The resolved
//! endpoint is then probed; no downstream stage runs for a chain whose
//! binding did not reach `ProbeStatus::Ok`. Resolution and probing
//! happen once per cycle — publishers may rotate, so nothing here is
//! cached across cycles.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::{ProbeConfig, ProbeSpec};
use crate::publisher::{PublisherGateway, PublisherInfo};
use crate::types::{ProbeStatus, PublisherBinding, PublisherSource, TraderError};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Built-in probe sequence, tried in order until one succeeds.
fn default_probes() -> Vec<ProbeSpec> {
    let chain_id_body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "eth_chainId",
        "params": [],
    });
    vec![
        ProbeSpec {
            method: "GET".to_string(),
            path: "/health".to_string(),
            body: Value::Null,
        },
        ProbeSpec {
            method: "POST".to_string(),
            path: "/".to_string(),
            body: chain_id_body.clone(),
        },
        ProbeSpec {
            method: "POST".to_string(),
            path: "/rpc".to_string(),
            body: chain_id_body,
        },
    ]
}

/// Search terms used to match catalog entries to a chain.
fn chain_terms(chain: &str) -> &'static [&'static str] {
    match chain {
        "ethereum" => &["ethereum"],
        "arbitrum" => &["arbitrum"],
        "base" => &["base"],
        "optimism" => &["optimism"],
        "polygon" => &["polygon", "matic"],
        "avalanche" => &["avalanche", "avax"],
        "bsc" => &["bsc", "binance", "bnb"],
        "gnosis" => &["gnosis", "xdai"],
        "zksync" => &["zksync"],
        "scroll" => &["scroll"],
        _ => &[],
    }
}

// ---------------------------------------------------------------------------
// Discovery heuristics
// ---------------------------------------------------------------------------

fn tokenize(value: &str) -> HashSet<String> {
    value
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Whether a catalog entry looks like a JSON-RPC endpoint provider.
fn is_rpc_like(publisher: &PublisherInfo) -> bool {
    let categories_text = publisher.categories.join(" ");
    let category_tokens = tokenize(&categories_text);
    let slug_tokens = tokenize(&publisher.slug);
    let name_tokens = tokenize(&publisher.name);

    if category_tokens.contains("rpc") || slug_tokens.contains("rpc") || name_tokens.contains("rpc")
    {
        return true;
    }
    let description = publisher.description.to_lowercase();
    description.contains("json-rpc") || description.contains("json rpc")
}

/// Score a candidate publisher for a chain. Higher wins; ties break
/// towards the lexicographically smaller slug for determinism.
fn score_candidate(publisher: &PublisherInfo, terms: &[&str]) -> Option<i32> {
    let slug = publisher.slug.trim().to_lowercase();
    if slug.is_empty() {
        return None;
    }

    let slug_tokens = tokenize(&slug);
    let name_tokens = tokenize(&publisher.name);
    let category_tokens = tokenize(&publisher.categories.join(" "));
    let description = publisher.description.to_lowercase();
    let description_tokens = tokenize(&description);

    let mut all_tokens = slug_tokens.clone();
    all_tokens.extend(name_tokens.iter().cloned());
    all_tokens.extend(category_tokens.iter().cloned());
    all_tokens.extend(description_tokens.iter().cloned());
    if !terms.iter().any(|t| all_tokens.contains(*t)) {
        return None;
    }

    let mut score = 0;
    if slug.starts_with("seren-") {
        score += 20;
    }
    if terms.iter().any(|t| slug_tokens.contains(*t)) {
        score += 12;
    }
    if terms.iter().any(|t| category_tokens.contains(*t)) {
        score += 8;
    }
    if terms.iter().any(|t| name_tokens.contains(*t)) {
        score += 6;
    }
    if description.contains("json-rpc") {
        score += 4;
    }
    Some(score)
}

/// Walk the catalog once and pick the best RPC publisher per chain.
fn discover_rpc_publishers(catalog: &[PublisherInfo], chains: &[&str]) -> HashMap<String, String> {
    let mut discovered = HashMap::new();

    for &chain in chains {
        let terms = chain_terms(chain);
        if terms.is_empty() {
            continue;
        }

        let mut best: Option<(i32, String)> = None;
        for publisher in catalog {
            if publisher.is_active == Some(false) || !is_rpc_like(publisher) {
                continue;
            }
            let Some(score) = score_candidate(publisher, terms) else {
                continue;
            };
            let slug = publisher.slug.trim().to_lowercase();
            let better = match &best {
                None => true,
                Some((best_score, best_slug)) => {
                    score > *best_score || (score == *best_score && slug < *best_slug)
                }
            };
            if better {
                best = Some((score, slug));
            }
        }

        if let Some((_, slug)) = best {
            discovered.insert(chain.to_string(), slug);
        }
    }

    discovered
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves and probes the RPC publisher for one cycle.
pub struct PublisherResolver<'a> {
    gateway: &'a dyn PublisherGateway,
    overrides: &'a HashMap<String, String>,
    probe: &'a ProbeConfig,
}

impl<'a> PublisherResolver<'a> {
    pub fn new(
        gateway: &'a dyn PublisherGateway,
        overrides: &'a HashMap<String, String>,
        probe: &'a ProbeConfig,
    ) -> Self {
        Self {
            gateway,
            overrides,
            probe,
        }
    }

    /// Resolve a publisher slug for `chain`: config override first,
    /// then catalog discovery.
    async fn resolve(&self, chain: &str) -> Result<(String, PublisherSource), TraderError> {
        if let Some(slug) = self.overrides.get(chain) {
            debug!(chain, publisher = %slug, "Using config override publisher");
            return Ok((slug.clone(), PublisherSource::ConfigOverride));
        }

        let catalog = self.gateway.list_publishers().await?;
        let discovered = discover_rpc_publishers(&catalog, &[chain]);
        if let Some(slug) = discovered.get(chain) {
            debug!(chain, publisher = %slug, "Discovered publisher from catalog");
            return Ok((slug.clone(), PublisherSource::CatalogDiscovery));
        }

        Err(TraderError::UnsupportedChain {
            chain: chain.to_string(),
            reason: "no RPC publisher in catalog; add a config override in rpc_publishers"
                .to_string(),
        })
    }

    /// Resolve and probe in one step, producing the cycle's binding.
    ///
    /// Probe failure aborts with `UnsupportedChain` when the probe is
    /// required, otherwise the binding is returned with
    /// `ProbeStatus::Failed` and downstream stages must not run
    /// against it.
    pub async fn resolve_and_probe(&self, chain: &str) -> Result<PublisherBinding, TraderError> {
        let (publisher, source) = self.resolve(chain).await?;

        let probes = if self.probe.probes.is_empty() {
            default_probes()
        } else {
            self.probe.probes.clone()
        };

        let mut errors: Vec<String> = Vec::new();
        for spec in &probes {
            let label = format!("{} {}", spec.method.to_uppercase(), spec.path);
            match self
                .gateway
                .call(&publisher, &spec.method, &spec.path, &spec.body)
                .await
            {
                Ok(_) => {
                    info!(chain, publisher = %publisher, probe = %label, "RPC probe ok");
                    return Ok(PublisherBinding {
                        chain: chain.to_string(),
                        publisher,
                        source,
                        status: ProbeStatus::Ok,
                        probe: Some(label),
                    });
                }
                Err(e) => errors.push(format!("{label}: {e}")),
            }
        }

        let reason = format!(
            "publisher '{publisher}' failed all probes: {}",
            errors.join(" | ")
        );
        if self.probe.required {
            return Err(TraderError::UnsupportedChain {
                chain: chain.to_string(),
                reason,
            });
        }

        warn!(chain, publisher = %publisher, %reason, "RPC probe failed (not required)");
        Ok(PublisherBinding {
            chain: chain.to_string(),
            publisher,
            source,
            status: ProbeStatus::Failed,
            probe: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
