//! Top-N selection by histogram intersection.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::compare::intersection;
use crate::histogram::Histogram;
use crate::pool::Aggregate;

/// One dataset image and its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub name: String,
    pub score: f64,
}

/// Score every histogram in `aggregate` against `query` and keep the best
/// `top_n`, highest score first.
///
/// The sort is stable, so equal scores keep aggregation order.
pub fn rank(query: &Histogram, aggregate: &Aggregate, top_n: NonZeroUsize) -> Vec<RankedMatch> {
    let mut matches: Vec<RankedMatch> = aggregate
        .iter()
        .map(|candidate| RankedMatch {
            name: candidate.name().to_string(),
            score: intersection(query, candidate),
        })
        .collect();

    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches.truncate(top_n.get());
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::{QuantizationDepth, SampleWidth};

    fn histogram(name: &str, samples: &[[u32; 3]]) -> Histogram {
        Histogram::from_rgb_samples(
            name,
            samples.iter().copied(),
            SampleWidth::Eight,
            QuantizationDepth::default(),
        )
        .unwrap()
    }

    fn n(v: usize) -> NonZeroUsize {
        NonZeroUsize::new(v).unwrap()
    }

    fn sample_aggregate() -> Aggregate {
        [
            histogram("white", &[[255, 255, 255]]),
            histogram("half", &[[0, 0, 0], [255, 255, 255]]),
            histogram("black", &[[0, 0, 0]]),
            histogram("quarter", &[[0, 0, 0], [255, 0, 0], [0, 255, 0], [0, 0, 255]]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_sorted_descending() {
        let query = histogram("q", &[[0, 0, 0]]);
        let ranked = rank(&query, &sample_aggregate(), n(10));

        let names: Vec<&str> = ranked.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["black", "half", "quarter", "white"]);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(ranked[0].score, 1.0);
        assert_eq!(ranked[3].score, 0.0);
    }

    #[test]
    fn test_truncates_to_top_n() {
        let query = histogram("q", &[[0, 0, 0]]);
        let ranked = rank(&query, &sample_aggregate(), n(2));
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "black");
    }

    #[test]
    fn test_fewer_candidates_than_top_n() {
        let query = histogram("q", &[[0, 0, 0]]);
        let aggregate: Aggregate = [histogram("only", &[[1, 1, 1]])].into_iter().collect();
        assert_eq!(rank(&query, &aggregate, n(5)).len(), 1);
    }

    #[test]
    fn test_empty_aggregate_ranks_nothing() {
        let query = histogram("q", &[[0, 0, 0]]);
        assert!(rank(&query, &Aggregate::new(), n(5)).is_empty());
    }

    #[test]
    fn test_ties_keep_aggregation_order() {
        let query = histogram("q", &[[0, 0, 0]]);
        let aggregate: Aggregate = ["z", "m", "a"]
            .into_iter()
            .map(|name| histogram(name, &[[255, 255, 255]]))
            .collect();

        let names: Vec<String> = rank(&query, &aggregate, n(3))
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["z", "m", "a"]);
    }
}
