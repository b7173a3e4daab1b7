use super::*;

fn document_id() -> DocumentId {
    DocumentId::new("housing-report").expect("valid id")
}

fn passage(ordinal: u32, text: &str) -> Passage {
    Passage {
        text: text.to_string(),
        source_document_id: document_id(),
        ordinal,
        token_count: 1,
    }
}

fn euclidean_index(points: &[(u32, f32)]) -> VectorIndex {
    let mut index = VectorIndex::new(document_id(), "test:model", DistanceMetric::Euclidean);
    for &(ordinal, x) in points {
        index
            .insert(passage(ordinal, &format!("p{ordinal}")), vec![x, 0.0])
            .expect("should insert");
    }
    index
}

fn ordinals(hits: &[ScoredPassage]) -> Vec<u32> {
    hits.iter().map(|hit| hit.passage.ordinal).collect()
}

#[test]
fn cosine_distance() {
    let metric = DistanceMetric::Cosine;
    assert!(metric.distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
    assert!((metric.distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
    assert!((metric.distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    assert!((metric.distance(&[0.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
}

#[test]
fn euclidean_distance() {
    let distance = DistanceMetric::Euclidean.distance(&[0.0, 0.0], &[3.0, 4.0]);
    assert!((distance - 5.0).abs() < 1e-6);
}

#[test]
fn search_orders_by_distance() {
    let index = euclidean_index(&[(0, 0.3), (1, 0.1), (2, 0.2)]);

    let hits = index.search(&[0.0, 0.0], 3).expect("should search");

    assert_eq!(ordinals(&hits), vec![1, 2, 0]);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn search_returns_min_of_k_and_len() {
    let index = euclidean_index(&[(0, 0.3), (1, 0.1), (2, 0.2)]);

    assert_eq!(index.search(&[0.0, 0.0], 2).expect("should search").len(), 2);
    assert_eq!(index.search(&[0.0, 0.0], 10).expect("should search").len(), 3);
    assert!(index.search(&[0.0, 0.0], 0).expect("should search").is_empty());
}

#[test]
fn ties_prefer_lower_ordinal() {
    let index = euclidean_index(&[(3, 1.0), (5, -1.0), (7, 1.0), (9, 0.5)]);

    let hits = index.search(&[0.0, 0.0], 4).expect("should search");

    assert_eq!(ordinals(&hits), vec![9, 3, 5, 7]);
}

#[test]
fn search_is_deterministic() {
    let index = euclidean_index(&[(0, 0.5), (1, 0.5), (2, 0.25), (3, 0.75)]);
    let first = index.search(&[0.1, 0.0], 4).expect("should search");
    for _ in 0..5 {
        assert_eq!(index.search(&[0.1, 0.0], 4).expect("should search"), first);
    }
}

#[test]
fn empty_index_returns_no_hits() {
    let index = VectorIndex::new(document_id(), "test:model", DistanceMetric::Cosine);
    assert!(index.is_empty());
    assert!(index.search(&[1.0, 2.0, 3.0], 5).expect("should search").is_empty());
}

#[test]
fn first_insert_fixes_dimension() {
    let mut index = VectorIndex::new(document_id(), "test:model", DistanceMetric::Cosine);
    assert_eq!(index.header().dimension, 0);

    index
        .insert(passage(0, "a"), vec![1.0, 2.0, 3.0])
        .expect("should insert");
    assert_eq!(index.header().dimension, 3);

    let result = index.insert(passage(1, "b"), vec![1.0, 2.0]);
    assert!(matches!(
        result,
        Err(IndexError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
    assert_eq!(index.len(), 1);
}

#[test]
fn insert_rejects_bad_entries() {
    let mut index = euclidean_index(&[(4, 0.0)]);

    assert!(matches!(
        index.insert(passage(4, "again"), vec![1.0, 1.0]),
        Err(IndexError::OrdinalOrder {
            previous: 4,
            ordinal: 4
        })
    ));
    assert!(matches!(
        index.insert(passage(5, "empty"), Vec::new()),
        Err(IndexError::EmptyEmbedding)
    ));

    let foreign = Passage {
        source_document_id: DocumentId::new("other").expect("valid id"),
        ..passage(6, "foreign")
    };
    assert!(matches!(
        index.insert(foreign, vec![1.0, 1.0]),
        Err(IndexError::ForeignPassage { .. })
    ));
}

#[test]
fn query_dimension_is_checked() {
    let index = euclidean_index(&[(0, 0.0)]);
    assert!(matches!(
        index.search(&[1.0], 1),
        Err(IndexError::DimensionMismatch { .. })
    ));
}

#[test]
fn from_parts_validates_entries() {
    let index = euclidean_index(&[(0, 0.1), (1, 0.2)]);
    let header = index.header().clone();

    let rebuilt = VectorIndex::from_parts(header.clone(), index.entries().to_vec())
        .expect("valid parts");
    assert_eq!(rebuilt, index);

    let mut duplicated = index.entries().to_vec();
    duplicated.push(duplicated[0].clone());
    assert!(matches!(
        VectorIndex::from_parts(header.clone(), duplicated),
        Err(IndexError::OrdinalOrder { .. })
    ));

    let future = IndexHeader {
        format_version: FORMAT_VERSION + 1,
        ..header
    };
    assert!(matches!(
        VectorIndex::from_parts(future, Vec::new()),
        Err(IndexError::UnsupportedVersion(_))
    ));
}
