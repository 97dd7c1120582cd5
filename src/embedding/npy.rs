//! Minimal `.npy` reader/writer for 2-D float matrices.
//!
//! Files are memory-mapped with `memmap2` and copied into a row-major
//! `Vec<f32>`. Only C-ordered little-endian `<f4` / `<f8` arrays are
//! accepted, which is what `numpy.save` produces for trained embeddings.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use memmap2::Mmap;
use regex::Regex;

use crate::error::EmbeddingError;

const MAGIC: &[u8] = b"\x93NUMPY";

static DESCR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'descr'\s*:\s*'([^']+)'").expect("valid regex"));
static FORTRAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'fortran_order'\s*:\s*(True|False)").expect("valid regex"));
static SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'shape'\s*:\s*\(([^)]*)\)").expect("valid regex"));

/// A dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F32,
    F64,
}

impl Dtype {
    fn width(self) -> usize {
        match self {
            Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }
}

/// Read a 2-D float matrix from an `.npy` file.
pub fn read_matrix(path: &Path) -> Result<Matrix, EmbeddingError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|source| EmbeddingError::Io {
        path: display.clone(),
        source,
    })?;
    // Safety: the file is opened read-only and the map is dropped before
    // this function returns; concurrent truncation is outside our control,
    // as with any mmap reader.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| EmbeddingError::Io {
        path: display.clone(),
        source,
    })?;
    parse_matrix(&mmap).map_err(|message| EmbeddingError::InvalidNpy {
        path: display,
        message,
    })
}

fn parse_matrix(bytes: &[u8]) -> Result<Matrix, String> {
    if bytes.len() < 10 || !bytes.starts_with(MAGIC) {
        return Err("missing NUMPY magic".into());
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated header".into());
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => return Err(format!("unsupported format version {v}")),
    };
    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .ok_or("truncated header")?;
    let header = std::str::from_utf8(header).map_err(|e| format!("header is not UTF-8: {e}"))?;

    let descr = DESCR
        .captures(header)
        .and_then(|c| c.get(1))
        .ok_or("header has no 'descr'")?
        .as_str();
    let dtype = match descr {
        "<f4" | "f4" => Dtype::F32,
        "<f8" | "f8" => Dtype::F64,
        other => return Err(format!("unsupported dtype {other}, expected <f4 or <f8")),
    };

    let fortran = FORTRAN
        .captures(header)
        .and_then(|c| c.get(1))
        .ok_or("header has no 'fortran_order'")?
        .as_str();
    if fortran == "True" {
        return Err("Fortran-ordered arrays are not supported".into());
    }

    let shape = SHAPE
        .captures(header)
        .and_then(|c| c.get(1))
        .ok_or("header has no 'shape'")?
        .as_str();
    let dims: Vec<usize> = shape
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|e| format!("bad shape entry {s:?}: {e}")))
        .collect::<Result<_, _>>()?;
    let [rows, cols] = dims[..] else {
        return Err(format!("expected a 2-D array, got shape {dims:?}"));
    };

    let expected = rows * cols * dtype.width();
    let payload = bytes
        .get(data_start..data_start + expected)
        .ok_or_else(|| format!("payload has fewer than {expected} bytes"))?;

    let data = match dtype {
        Dtype::F32 => payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::F64 => payload
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32)
            .collect(),
    };
    Ok(Matrix { rows, cols, data })
}

/// Write a row-major `<f4` matrix in `.npy` v1 format.
pub fn write_matrix(path: &Path, matrix: &Matrix) -> Result<(), EmbeddingError> {
    let io_err = |source| EmbeddingError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        matrix.rows, matrix.cols
    );
    // magic + version + u16 length + header + '\n' must be 64-byte aligned.
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + matrix.data.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in &matrix.data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    let mut file = File::create(path).map_err(io_err)?;
    file.write_all(&out).map_err(io_err)
}
