//! Request deduplication by embedding similarity
//!
//! A batch of requests is greedily grouped: each request joins the first
//! group whose representative it matches at or above the threshold,
//! otherwise it starts a new group. One provider call per group serves
//! every member.

use super::similarity::cosine_similarity;

/// One group of near-duplicate requests, indices into the input batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupGroup {
    /// Index of the representative request
    pub representative: usize,
    /// Every member index, representative included
    pub members: Vec<usize>,
}

/// Greedily group a batch of embeddings by pairwise similarity
pub fn group_by_similarity(embeddings: &[Vec<f32>], threshold: f32) -> Vec<DedupGroup> {
    let mut groups: Vec<DedupGroup> = Vec::new();

    for (index, embedding) in embeddings.iter().enumerate() {
        let joined = groups.iter_mut().find(|group| {
            cosine_similarity(embedding, &embeddings[group.representative]) >= threshold
        });
        match joined {
            Some(group) => group.members.push(index),
            None => groups.push(DedupGroup { representative: index, members: vec![index] }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_requests_share_a_group() {
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let groups = group_by_similarity(&embeddings, 0.9);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].representative, 0);
        assert_eq!(groups[0].members, vec![0, 1]);
        assert_eq!(groups[1].members, vec![2]);
    }

    #[test]
    fn test_reflexive_every_request_is_grouped() {
        let embeddings = vec![vec![1.0, 0.0], vec![0.5, 0.5], vec![0.0, 1.0]];
        let groups = group_by_similarity(&embeddings, 0.99);
        let grouped: usize = groups.iter().map(|g| g.members.len()).sum();
        assert_eq!(grouped, embeddings.len());
        for group in &groups {
            assert!(group.members.contains(&group.representative));
        }
    }

    #[test]
    fn test_symmetric_grouping_order_independent_membership() {
        // If a matches b's group, b would have matched a's group had it come
        // first: cosine is symmetric, so swapping the pair keeps them joined
        let a = vec![1.0, 0.05];
        let b = vec![1.0, 0.0];
        let forward = group_by_similarity(&[a.clone(), b.clone()], 0.9);
        let backward = group_by_similarity(&[b, a], 0.9);
        assert_eq!(forward.len(), 1);
        assert_eq!(backward.len(), 1);
    }

    #[test]
    fn test_empty_batch() {
        assert!(group_by_similarity(&[], 0.9).is_empty());
    }

    #[test]
    fn test_threshold_one_only_groups_exact_duplicates() {
        let embeddings = vec![vec![1.0, 0.0], vec![0.999, 0.01]];
        let groups = group_by_similarity(&embeddings, 1.0);
        assert_eq!(groups.len(), 2);
    }
}
