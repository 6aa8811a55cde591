use std::fs;

use ndarray::Array3;
use num::Complex;

use super::{
    error::OperatorError,
    grid::{ComplexField, GridShape, OperatorGrid},
};

/// Reads one real per line into a grid of the given shape, in linearization
/// order. Blank lines are skipped.
pub fn read_operator_file(path: &str, shape: GridShape) -> Result<OperatorGrid, OperatorError> {
    let contents = fs::read_to_string(path).map_err(|source| OperatorError::FileRead {
        path: path.to_string(),
        source,
    })?;

    let mut values = Vec::with_capacity(shape.len());
    for (line, content) in contents.lines().enumerate() {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value = trimmed
            .parse::<f64>()
            .map_err(|_| OperatorError::FileParse {
                path: path.to_string(),
                line: line + 1,
                content: content.to_string(),
            })?;
        values.push(value);
    }

    if values.len() != shape.len() {
        return Err(OperatorError::FileLength {
            path: path.to_string(),
            expected: shape.len(),
            found: values.len(),
        });
    }

    log::debug!("Read {} values from {path}", values.len());

    // Length checked above
    Array3::from_shape_vec(shape.dim(), values).map_err(|_| OperatorError::FileLength {
        path: path.to_string(),
        expected: shape.len(),
        found: 0,
    })
}

/// Reads a wavefunction stored as separate real and imaginary files.
pub fn read_wavefunction(
    real_path: &str,
    imag_path: &str,
    shape: GridShape,
) -> Result<ComplexField<f64>, OperatorError> {
    let real = read_operator_file(real_path, shape)?;
    let imag = read_operator_file(imag_path, shape)?;
    Ok(ndarray::Zip::from(&real)
        .and(&imag)
        .map_collect(|&re, &im| Complex::new(re, im)))
}

/// Writes a grid in the format [`read_operator_file`] expects.
pub fn write_operator_file(path: &str, grid: &OperatorGrid) -> Result<(), OperatorError> {
    let mut contents = String::with_capacity(grid.len() * 24);
    for value in grid.iter() {
        contents.push_str(&format!("{value:e}\n"));
    }
    fs::write(path, contents).map_err(|source| OperatorError::FileWrite {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
fn temp_path(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[test]
fn test_operator_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "V.dat");
    let shape = GridShape::new(3, 4, 2);
    let grid = Array3::from_shape_fn(shape.dim(), |(i, j, k)| {
        (i as f64 - 1.0) * 0.1 + j as f64 * 1e-30 + k as f64 * 7.5
    });

    write_operator_file(&path, &grid).unwrap();
    let read = read_operator_file(&path, shape).unwrap();
    assert_eq!(read, grid);
}

#[test]
fn test_write_into_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "missing/V.dat");
    let grid = Array3::zeros((2, 2, 1));
    assert!(matches!(
        write_operator_file(&path, &grid),
        Err(OperatorError::FileWrite { .. })
    ));
}

#[test]
fn test_operator_file_blank_lines_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "Ax.dat");
    fs::write(&path, "1\n2\n\n3\n  \n4\n").unwrap();

    let grid = read_operator_file(&path, GridShape::new(2, 2, 1)).unwrap();
    assert_eq!(grid[[0, 0, 0]], 1.0);
    assert_eq!(grid[[0, 1, 0]], 2.0);
    assert_eq!(grid[[1, 0, 0]], 3.0);
    assert_eq!(grid[[1, 1, 0]], 4.0);
}

#[test]
fn test_operator_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let shape = GridShape::new(2, 2, 1);

    let missing = temp_path(&dir, "missing.dat");
    assert!(matches!(
        read_operator_file(&missing, shape),
        Err(OperatorError::FileRead { .. })
    ));

    let short = temp_path(&dir, "short.dat");
    fs::write(&short, "1\n2\n3\n").unwrap();
    assert!(matches!(
        read_operator_file(&short, shape),
        Err(OperatorError::FileLength {
            expected: 4,
            found: 3,
            ..
        })
    ));

    let garbage = temp_path(&dir, "garbage.dat");
    fs::write(&garbage, "1\n2\nthree\n4\n").unwrap();
    assert!(matches!(
        read_operator_file(&garbage, shape),
        Err(OperatorError::FileParse { line: 3, .. })
    ));
}

#[test]
fn test_read_wavefunction() {
    let dir = tempfile::tempdir().unwrap();
    let real = temp_path(&dir, "wfc_real");
    let imag = temp_path(&dir, "wfc_imag");
    fs::write(&real, "1\n0\n").unwrap();
    fs::write(&imag, "0\n-1\n").unwrap();

    let psi = read_wavefunction(&real, &imag, GridShape::new(2, 1, 1)).unwrap();
    assert_eq!(psi[[0, 0, 0]], Complex::new(1.0, 0.0));
    assert_eq!(psi[[1, 0, 0]], Complex::new(0.0, -1.0));
}
