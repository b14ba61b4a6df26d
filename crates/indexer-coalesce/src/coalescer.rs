//! The Coalescer (§4.5): distribution assignment, package introduced-in
//! tracking, package-db copy-on-write pruning, and repository association,
//! one ecosystem at a time, unioned into a final Index Report.

use crate::types::{Ecosystem, LayerArtifacts};
use indexer_schema::{Digest, Distribution, Environment, IndexReport, Package, Repository};
use std::collections::{BTreeMap, HashMap, HashSet};

/// The per-ecosystem merge described by §4.5's four rules. Stateless; all
/// per-pass state lives on the stack of [`coalesce_ecosystem`].
pub struct EcosystemCoalescer {
    ecosystem: Ecosystem,
}

impl EcosystemCoalescer {
    pub fn new(ecosystem: Ecosystem) -> Self {
        Self { ecosystem }
    }

    pub fn ecosystem(&self) -> &Ecosystem {
        &self.ecosystem
    }

    /// Merges this ecosystem's layer-scoped artifacts into one fragment,
    /// applying distribution assignment, introduced-in tracking, CoW
    /// pruning, and repository association.
    pub fn coalesce_ecosystem(
        &self,
        layer_order: &[Digest],
        per_layer: &HashMap<Digest, LayerArtifacts>,
    ) -> ReportFragment {
        let mut fragment = ReportFragment::default();

        // --- Distribution assignment + package introduced-in (base-to-top) ---
        let mut current_distribution: Option<String> = None;
        let mut pending_unassigned: Vec<String> = Vec::new();
        let mut package_distribution: HashMap<String, Option<String>> = HashMap::new();
        let mut introduced_in: HashMap<String, Digest> = HashMap::new();
        let mut introduced_index: HashMap<String, usize> = HashMap::new();
        let mut repos_cumulative_by_index: Vec<HashSet<String>> = Vec::with_capacity(layer_order.len());
        let mut cumulative_repos: HashSet<String> = HashSet::new();

        for (index, layer) in layer_order.iter().enumerate() {
            let Some(artifacts) = per_layer.get(layer) else {
                repos_cumulative_by_index.push(cumulative_repos.clone());
                continue;
            };

            for (id, distribution) in &artifacts.distributions {
                fragment.distributions.insert(id.clone(), distribution.clone());
            }
            if let Some((dist_id, _)) = artifacts.distributions.first() {
                if current_distribution.is_none() {
                    for id in pending_unassigned.drain(..) {
                        package_distribution.insert(id, Some(dist_id.clone()));
                    }
                }
                current_distribution = Some(dist_id.clone());
            }

            for (id, _) in &artifacts.repositories {
                cumulative_repos.insert(id.clone());
            }
            repos_cumulative_by_index.push(cumulative_repos.clone());
            for (id, repository) in &artifacts.repositories {
                fragment.repositories.insert(id.clone(), repository.clone());
            }

            for (id, package) in &artifacts.packages {
                fragment.packages.insert(id.clone(), package.clone());
                introduced_in.entry(id.clone()).or_insert_with(|| layer.clone());
                introduced_index.entry(id.clone()).or_insert(index);
                if !package_distribution.contains_key(id) {
                    match &current_distribution {
                        Some(d) => {
                            package_distribution.insert(id.clone(), Some(d.clone()));
                        }
                        None => {
                            package_distribution.insert(id.clone(), None);
                            pending_unassigned.push(id.clone());
                        }
                    }
                }
            }
        }

        // --- Package-db copy-on-write pruning (top-down) ---
        let mut seen_db = HashSet::new();
        let mut keep: HashSet<String> = HashSet::new();
        for layer in layer_order.iter().rev() {
            let Some(artifacts) = per_layer.get(layer) else {
                continue;
            };
            let mut by_db: HashMap<&str, Vec<&String>> = HashMap::new();
            for (id, package) in &artifacts.packages {
                by_db.entry(package.package_db.as_str()).or_default().push(id);
            }
            for (db, ids) in by_db {
                if seen_db.insert(db.to_owned()) {
                    keep.extend(ids.into_iter().cloned());
                }
            }
        }
        fragment.packages.retain(|id, _| keep.contains(id));

        // --- Repository association + environment assembly ---
        for (id, _package) in fragment.packages.clone() {
            let Some(&index) = introduced_index.get(&id) else {
                continue;
            };
            let mut repository_ids: Vec<String> = repos_cumulative_by_index
                .get(index)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .collect();
            repository_ids.sort();
            let environment = Environment {
                introduced_in: introduced_in.get(&id).cloned().expect("indexed alongside introduced_in"),
                distribution_id: package_distribution.get(&id).cloned().flatten(),
                repository_ids,
            };
            fragment.environments.entry(id).or_default().push(environment);
        }

        fragment
    }
}

/// One ecosystem's contribution to the final [`IndexReport`].
#[derive(Debug, Clone, Default)]
pub struct ReportFragment {
    pub packages: BTreeMap<String, Package>,
    pub distributions: BTreeMap<String, Distribution>,
    pub repositories: BTreeMap<String, Repository>,
    pub environments: BTreeMap<String, Vec<Environment>>,
}

/// Runs one coalescing pass per registered ecosystem over its own artifact
/// subset, then unions the per-ecosystem fragments into the final report
/// (§4.5 "Ecosystem registration").
pub fn coalesce(
    manifest_digest: Digest,
    ecosystems: &[EcosystemCoalescer],
    layer_order: &[Digest],
    per_ecosystem: &HashMap<String, HashMap<Digest, LayerArtifacts>>,
) -> IndexReport {
    let mut report = IndexReport::new(manifest_digest, "Coalesce");
    for ecosystem in ecosystems {
        let empty = HashMap::new();
        let per_layer = per_ecosystem
            .get(ecosystem.ecosystem().name.as_str())
            .unwrap_or(&empty);
        let fragment = ecosystem.coalesce_ecosystem(layer_order, per_layer);
        report.packages.extend(fragment.packages);
        report.distributions.extend(fragment.distributions);
        report.repositories.extend(fragment.repositories);
        report.environments.extend(fragment.environments);
    }
    report
}
