//! Vector Index - 전수 탐색 L2 최근접 이웃 검색
//!
//! 청크 임베딩을 위치 순서대로 보관하고 유클리드 거리로 k-NN 검색을 수행합니다.
//! 한 번 구축되면 변경되지 않습니다 (삽입/삭제 없음).

use crate::error::{BotError, Result};

// ============================================================================
// Types
// ============================================================================

/// 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// 저장 위치 (청크 인덱스, 0-based)
    pub position: usize,
    /// 쿼리와의 L2 거리
    pub distance: f32,
}

// ============================================================================
// FlatL2Index
// ============================================================================

/// 평면 L2 인덱스
///
/// 모든 벡터는 구축 시점의 차원을 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct FlatL2Index {
    dimension: Option<usize>,
    vectors: Vec<Vec<f32>>,
}

impl FlatL2Index {
    /// 임베딩 목록으로 인덱스 구축
    ///
    /// 첫 번째 벡터의 차원이 인덱스 차원이 되며, 다른 차원의 벡터가 있으면 실패합니다.
    pub fn build(embeddings: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = embeddings.first().map(Vec::len);

        if let Some(expected) = dimension {
            if let Some(bad) = embeddings.iter().find(|v| v.len() != expected) {
                return Err(BotError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                });
            }
        }

        Ok(Self {
            dimension,
            vectors: embeddings,
        })
    }

    /// k개의 최근접 벡터 검색
    ///
    /// 결과는 거리 오름차순이며 같은 거리는 저장 위치 순입니다.
    /// k가 저장된 벡터 수보다 크면 전체를 반환합니다.
    ///
    /// # Arguments
    /// * `query` - 쿼리 벡터 (인덱스 차원과 같아야 함)
    /// * `k` - 최대 결과 수
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };

        if query.len() != dimension {
            return Err(BotError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let limit = k.min(self.vectors.len());
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| Neighbor {
                position,
                distance: l2_distance_squared(query, v),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        neighbors.truncate(limit);

        for n in &mut neighbors {
            n.distance = n.distance.sqrt();
        }

        Ok(neighbors)
    }

    /// 저장된 벡터 수
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// 인덱스 차원 (빈 인덱스는 None)
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 제곱 유클리드 거리
///
/// 정렬에는 제곱 거리로 충분하므로 sqrt는 최종 결과에만 적용합니다.
pub fn l2_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// 유클리드 거리
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    l2_distance_squared(a, b).sqrt()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatL2Index {
        FlatL2Index::build(vec![
            vec![0.0, 0.0],
            vec![10.0, 0.0],
            vec![0.0, 5.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_l2_distance() {
        assert!((l2_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert_eq!(l2_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_build_counts_entries() {
        let index = sample_index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), Some(2));
    }

    #[test]
    fn test_build_rejects_mixed_dimensions() {
        let result = FlatL2Index::build(vec![vec![1.0, 2.0], vec![1.0]]);
        assert!(matches!(
            result,
            Err(BotError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample_index();
        let results = index.search(&[1.0, 4.0], 3).unwrap();

        let positions: Vec<usize> = results.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![2, 0, 1]);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!((results[0].distance - 2.0_f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_search_known_nearest() {
        let index = sample_index();
        let results = index.search(&[9.0, 1.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].position, 1);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let index = FlatL2Index::build(vec![vec![1.0], vec![2.0]]).unwrap();
        let results = index.search(&[0.0], 10).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_search_k_zero() {
        let index = sample_index();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let index = FlatL2Index::build(vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
            vec![0.0, -1.0],
        ])
        .unwrap();

        let results = index.search(&[0.0, 0.0], 4).unwrap();
        let positions: Vec<usize> = results.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_search_empty_index() {
        let index = FlatL2Index::build(vec![]).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);
        assert!(index.search(&[1.0, 2.0, 3.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let index = sample_index();
        assert!(matches!(
            index.search(&[1.0, 2.0, 3.0], 1),
            Err(BotError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_result_count_is_min_k_n() {
        let index = sample_index();
        for k in 0..6 {
            let results = index.search(&[0.5, 0.5], k).unwrap();
            assert_eq!(results.len(), k.min(index.len()));
        }
    }
}
