use std::collections::{HashMap, HashSet};

use crate::pairs::WalletPair;

#[derive(Debug, Clone)]
pub struct Cluster {
    pub wallets: Vec<String>,
    pub score: f64,
    pub shared_tokens: Vec<String>,
}

/// Builds an undirected graph over wallets joined by pairs scoring at or
/// above `min_cluster_score_threshold`, then extracts connected components
/// of size >= 3 via DFS.
pub fn extract_clusters(pairs: &[WalletPair], min_cluster_score_threshold: f64) -> Vec<Cluster> {
    let mut adjacency: HashMap<&str, HashSet<&str>> = HashMap::new();
    for pair in pairs {
        if pair.score >= min_cluster_score_threshold {
            adjacency.entry(&pair.wallet_a).or_default().insert(&pair.wallet_b);
            adjacency.entry(&pair.wallet_b).or_default().insert(&pair.wallet_a);
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut components: Vec<Vec<String>> = Vec::new();

    let mut nodes: Vec<&str> = adjacency.keys().copied().collect();
    nodes.sort();

    for node in nodes {
        if visited.contains(node) {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            component.push(current.to_string());
            if let Some(neighbors) = adjacency.get(current) {
                let mut sorted_neighbors: Vec<&&str> = neighbors.iter().collect();
                sorted_neighbors.sort();
                for neighbor in sorted_neighbors {
                    if !visited.contains(*neighbor) {
                        stack.push(neighbor);
                    }
                }
            }
        }
        component.sort();
        components.push(component);
    }

    components
        .into_iter()
        .filter(|c| c.len() >= 3)
        .map(|wallets| build_cluster(wallets, pairs))
        .collect()
}

fn build_cluster(wallets: Vec<String>, pairs: &[WalletPair]) -> Cluster {
    let member_set: HashSet<&str> = wallets.iter().map(|w| w.as_str()).collect();
    let contributing: Vec<&WalletPair> = pairs
        .iter()
        .filter(|p| member_set.contains(p.wallet_a.as_str()) && member_set.contains(p.wallet_b.as_str()))
        .collect();

    let score = if contributing.is_empty() {
        0.0
    } else {
        contributing.iter().map(|p| p.score).sum::<f64>() / contributing.len() as f64
    };

    let mut shared_tokens: Vec<String> = contributing
        .iter()
        .flat_map(|p| p.shared_non_obvious.iter().map(|m| m.mint.clone()))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    shared_tokens.sort();

    Cluster { wallets, score: (score * 100.0).round() / 100.0, shared_tokens }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &str, b: &str, score: f64) -> WalletPair {
        WalletPair {
            wallet_a: a.to_string(),
            wallet_b: b.to_string(),
            shared_non_obvious: vec![],
            sync_events: vec![],
            score,
        }
    }

    #[test]
    fn triangle_above_threshold_forms_one_cluster() {
        let pairs = vec![pair("a", "b", 5.0), pair("b", "c", 5.0), pair("a", "c", 5.0)];
        let clusters = extract_clusters(&pairs, 3.0);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].wallets, vec!["a", "b", "c"]);
        assert_eq!(clusters[0].score, 5.0);
    }

    #[test]
    fn fourth_wallet_outside_clique_is_excluded() {
        let pairs = vec![
            pair("a", "b", 5.0),
            pair("b", "c", 5.0),
            pair("a", "c", 5.0),
            pair("c", "d", 1.0),
        ];
        let clusters = extract_clusters(&pairs, 3.0);
        assert_eq!(clusters.len(), 1);
        assert!(!clusters[0].wallets.contains(&"d".to_string()));
    }

    #[test]
    fn pairs_below_threshold_never_form_a_cluster() {
        let pairs = vec![pair("a", "b", 1.0), pair("b", "c", 1.0)];
        let clusters = extract_clusters(&pairs, 3.0);
        assert!(clusters.is_empty());
    }
}
