//! Pre-trained entity and relation embeddings with exact nearest-neighbour
//! search.
//!
//! Each table pairs a row-major vector matrix (read from `.npy`) with an
//! `index<TAB>uri` id file. Queries are read-only; the ranking is an exact
//! Euclidean scan parallelized with `rayon`, deterministic with ties broken
//! by row index.

pub mod npy;

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;

use crate::error::EmbeddingError;

use self::npy::Matrix;

/// A ranked embedding neighbour.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Row index in the entity table.
    pub index: usize,
    /// Entity IRI.
    pub uri: String,
    /// Euclidean distance to the query.
    pub distance: f32,
}

/// Vectors of one kind (entities or relations) with their id ↔ URI maps.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingTable {
    dim: usize,
    data: Vec<f32>,
    uris: Vec<String>,
    ids: HashMap<String, usize>,
}

impl EmbeddingTable {
    /// Build a table from URIs in row order and a row-major matrix.
    pub fn new(uris: Vec<String>, matrix: Matrix) -> Result<Self, EmbeddingError> {
        if uris.len() != matrix.rows {
            return Err(EmbeddingError::RowMismatch {
                ids: uris.len(),
                rows: matrix.rows,
            });
        }
        let ids = uris
            .iter()
            .enumerate()
            .map(|(i, uri)| (uri.clone(), i))
            .collect();
        Ok(Self {
            dim: matrix.cols,
            data: matrix.data,
            uris,
            ids,
        })
    }

    /// Load a `.npy` matrix and its tab-separated id file.
    pub fn load(vectors: &Path, ids: &Path) -> Result<Self, EmbeddingError> {
        let matrix = npy::read_matrix(vectors)?;
        let uris = read_id_file(ids, matrix.rows)?;
        let table = Self::new(uris, matrix)?;
        tracing::info!(
            vectors = %vectors.display(),
            rows = table.len(),
            dim = table.dim,
            "loaded embedding table"
        );
        Ok(table)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    /// Row index of a URI.
    pub fn id_of(&self, uri: &str) -> Option<usize> {
        self.ids.get(uri).copied()
    }

    /// URI of a row index.
    pub fn uri_of(&self, index: usize) -> Option<&str> {
        self.uris.get(index).map(String::as_str)
    }

    /// Vector of a URI.
    pub fn vector(&self, uri: &str) -> Option<&[f32]> {
        let row = self.id_of(uri)?;
        self.data.get(row * self.dim..(row + 1) * self.dim)
    }

    /// The `k` rows nearest to `query` that pass `keep`, closest first.
    ///
    /// Returns nothing if the query dimension does not match the table.
    pub fn nearest_where<F>(&self, query: &[f32], k: usize, keep: F) -> Vec<Neighbor>
    where
        F: Fn(&str) -> bool + Sync,
    {
        if k == 0 || query.len() != self.dim || self.dim == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(f32, usize)> = self
            .data
            .par_chunks_exact(self.dim)
            .enumerate()
            .filter(|(i, _)| keep(&self.uris[*i]))
            .map(|(i, row)| (squared_distance(query, row), i))
            .collect();

        let by_rank = |a: &(f32, usize), b: &(f32, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
        if scored.len() > k {
            scored.select_nth_unstable_by(k - 1, by_rank);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_rank);

        scored
            .into_iter()
            .map(|(d, index)| Neighbor {
                index,
                uri: self.uris[index].clone(),
                distance: d.sqrt(),
            })
            .collect()
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Read an `index<TAB>uri` id file into a URI-per-row vector.
fn read_id_file(path: &Path, rows: usize) -> Result<Vec<String>, EmbeddingError> {
    let display = path.display().to_string();
    let invalid = |message: String| EmbeddingError::InvalidIds {
        path: display.clone(),
        message,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .from_path(path)
        .map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(source) => EmbeddingError::Io {
                path: display.clone(),
                source,
            },
            other => invalid(format!("{other:?}")),
        })?;

    let mut uris: Vec<Option<String>> = vec![None; rows];
    let mut seen = 0usize;
    for record in reader.deserialize::<(usize, String)>() {
        let (index, uri) = record.map_err(|e| invalid(e.to_string()))?;
        let slot = uris
            .get_mut(index)
            .ok_or_else(|| invalid(format!("index {index} is outside the {rows} matrix rows")))?;
        if slot.is_some() {
            return Err(invalid(format!("index {index} appears twice")));
        }
        *slot = Some(uri);
        seen += 1;
    }
    if seen != rows {
        return Err(EmbeddingError::RowMismatch { ids: seen, rows });
    }
    Ok(uris.into_iter().flatten().collect())
}

/// Entity and relation tables, queried together for translational scoring.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    entities: EmbeddingTable,
    relations: EmbeddingTable,
}

impl EmbeddingIndex {
    /// Pair entity and relation tables. Both must share one dimension unless
    /// either is empty.
    pub fn new(entities: EmbeddingTable, relations: EmbeddingTable) -> Result<Self, EmbeddingError> {
        if !entities.is_empty() && !relations.is_empty() && entities.dim != relations.dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: entities.dim,
                actual: relations.dim,
            });
        }
        Ok(Self {
            entities,
            relations,
        })
    }

    /// Index with no vectors; every embedding query comes back empty.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(
        entity_vectors: &Path,
        entity_ids: &Path,
        relation_vectors: &Path,
        relation_ids: &Path,
    ) -> Result<Self, EmbeddingError> {
        Self::new(
            EmbeddingTable::load(entity_vectors, entity_ids)?,
            EmbeddingTable::load(relation_vectors, relation_ids)?,
        )
    }

    pub fn entities(&self) -> &EmbeddingTable {
        &self.entities
    }

    pub fn relations(&self) -> &EmbeddingTable {
        &self.relations
    }

    pub fn entity_vector(&self, uri: &str) -> Option<&[f32]> {
        self.entities.vector(uri)
    }

    pub fn relation_vector(&self, uri: &str) -> Option<&[f32]> {
        self.relations.vector(uri)
    }

    /// `entity + relation`, the translational estimate of the tail entity.
    pub fn translate(&self, entity: &str, relation: &str) -> Option<Vec<f32>> {
        let e = self.entity_vector(entity)?;
        let r = self.relation_vector(relation)?;
        Some(e.iter().zip(r).map(|(a, b)| a + b).collect())
    }

    /// The `k` entities nearest to `query`, closest first.
    pub fn nearest_entities(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        self.entities.nearest_where(query, k, |_| true)
    }

    /// Like [`nearest_entities`](Self::nearest_entities), skipping entities
    /// rejected by `keep`.
    pub fn nearest_entities_where<F>(&self, query: &[f32], k: usize, keep: F) -> Vec<Neighbor>
    where
        F: Fn(&str) -> bool + Sync,
    {
        self.entities.nearest_where(query, k, keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, [f32; 2])]) -> EmbeddingTable {
        EmbeddingTable::new(
            rows.iter().map(|(u, _)| u.to_string()).collect(),
            Matrix {
                rows: rows.len(),
                cols: 2,
                data: rows.iter().flat_map(|(_, v)| *v).collect(),
            },
        )
        .unwrap()
    }

    #[test]
    fn nearest_is_sorted_and_deterministic() {
        let t = table(&[
            ("a", [0.0, 0.0]),
            ("b", [1.0, 0.0]),
            ("c", [0.0, 1.0]),
            ("d", [5.0, 5.0]),
        ]);
        let hits = t.nearest_where(&[0.0, 0.0], 3, |_| true);
        let uris: Vec<_> = hits.iter().map(|n| n.uri.as_str()).collect();
        // b and c tie; the lower row index wins.
        assert_eq!(uris, vec!["a", "b", "c"]);
        assert_eq!(hits[0].distance, 0.0);
        assert!((hits[1].distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn nearest_respects_filter_and_dimension() {
        let t = table(&[("a", [0.0, 0.0]), ("b", [1.0, 0.0])]);
        let hits = t.nearest_where(&[0.0, 0.0], 5, |uri| uri != "a");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uri, "b");
        assert!(t.nearest_where(&[0.0, 0.0, 0.0], 1, |_| true).is_empty());
    }

    #[test]
    fn translate_adds_vectors() {
        let index = EmbeddingIndex::new(
            table(&[("m", [1.0, 2.0]), ("x", [3.0, 3.0])]),
            table(&[("p", [2.0, 1.0])]),
        )
        .unwrap();
        assert_eq!(index.translate("m", "p"), Some(vec![3.0, 3.0]));
        assert!(index.translate("m", "missing").is_none());

        let q = index.translate("m", "p").unwrap();
        assert_eq!(index.nearest_entities(&q, 1)[0].uri, "x");
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let rel = EmbeddingTable::new(
            vec!["p".into()],
            Matrix {
                rows: 1,
                cols: 3,
                data: vec![0.0; 3],
            },
        )
        .unwrap();
        let err = EmbeddingIndex::new(table(&[("m", [0.0, 0.0])]), rel).unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn loads_npy_and_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        let vectors = dir.path().join("e.npy");
        let ids = dir.path().join("e.del");
        npy::write_matrix(
            &vectors,
            &Matrix {
                rows: 2,
                cols: 2,
                data: vec![0.0, 0.0, 1.0, 1.0],
            },
        )
        .unwrap();
        // Rows may appear out of order in the id file.
        std::fs::write(&ids, "1\thttp://e/B\n0\thttp://e/A\n").unwrap();

        let t = EmbeddingTable::load(&vectors, &ids).unwrap();
        assert_eq!(t.id_of("http://e/A"), Some(0));
        assert_eq!(t.uri_of(1), Some("http://e/B"));
        assert_eq!(t.vector("http://e/B"), Some(&[1.0, 1.0][..]));
    }

    #[test]
    fn id_file_must_cover_every_row() {
        let dir = tempfile::TempDir::new().unwrap();
        let vectors = dir.path().join("e.npy");
        let ids = dir.path().join("e.del");
        npy::write_matrix(
            &vectors,
            &Matrix {
                rows: 2,
                cols: 1,
                data: vec![0.0, 1.0],
            },
        )
        .unwrap();
        std::fs::write(&ids, "0\thttp://e/A\n").unwrap();
        assert!(matches!(
            EmbeddingTable::load(&vectors, &ids),
            Err(EmbeddingError::RowMismatch { ids: 1, rows: 2 })
        ));

        std::fs::write(&ids, "0\thttp://e/A\n7\thttp://e/B\n").unwrap();
        assert!(matches!(
            EmbeddingTable::load(&vectors, &ids),
            Err(EmbeddingError::InvalidIds { .. })
        ));
    }
}
