//! I/O utilities for reading forecasting data.

use std::path::Path;

use ndarray::Array3;
use ndarray_npy::ReadNpyExt;

use crate::dataset::ForecastDataset;
use crate::error::{DataError, Result};

/// Read a 3D array from a NumPy `.npy` file.
///
/// `f64` files are converted to `f32`.
pub fn read_npy<P: AsRef<Path>>(path: P) -> Result<Array3<f32>> {
    let open = || -> Result<std::io::BufReader<std::fs::File>> {
        Ok(std::io::BufReader::new(std::fs::File::open(path.as_ref())?))
    };

    match Array3::<f32>::read_npy(open()?) {
        Ok(arr) => Ok(arr),
        Err(e) => {
            let arr_f64 = Array3::<f64>::read_npy(open()?)
                .map_err(|_| DataError::FormatError(format!("Failed to read npy file: {}", e)))?;
            Ok(arr_f64.mapv(|x| x as f32))
        }
    }
}

/// Read a forecasting dataset from a NumPy `.npz` archive.
///
/// Expects key `x` and optionally `y`, `encoder_feature` and
/// `decoder_feature`, each a `float32` array of rank 3.
pub fn read_npz<P: AsRef<Path>>(path: P) -> Result<ForecastDataset> {
    let file = std::fs::File::open(path.as_ref())?;
    let mut npz = ndarray_npy::NpzReader::new(file)
        .map_err(|e| DataError::FormatError(format!("Failed to read npz file: {}", e)))?;

    let x: Array3<f32> = npz
        .by_name("x")
        .map_err(|e| DataError::FormatError(format!("Failed to read 'x' from npz: {}", e)))?;
    let y: Option<Array3<f32>> = npz.by_name("y").ok();
    let encoder_feature: Option<Array3<f32>> = npz.by_name("encoder_feature").ok();
    let decoder_feature: Option<Array3<f32>> = npz.by_name("decoder_feature").ok();

    ForecastDataset::from_arrays(x, y)?.with_features(encoder_feature, decoder_feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_npy::{NpzWriter, WriteNpyExt};

    #[test]
    fn test_read_npy_roundtrip() {
        let path = std::env::temp_dir().join("tfts_data_read_npy.npy");
        let arr = Array3::from_shape_fn((2, 3, 1), |(a, b, _)| (a * 3 + b) as f32);
        arr.write_npy(std::fs::File::create(&path).unwrap()).unwrap();

        let loaded = read_npy(&path).unwrap();
        assert_eq!(loaded, arr);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_read_npz_with_features() {
        let path = std::env::temp_dir().join("tfts_data_read_npz.npz");
        {
            let mut npz = NpzWriter::new(std::fs::File::create(&path).unwrap());
            npz.add_array("x", &Array3::<f32>::zeros((5, 20, 1))).unwrap();
            npz.add_array("y", &Array3::<f32>::zeros((5, 10, 1))).unwrap();
            npz.add_array("encoder_feature", &Array3::<f32>::zeros((5, 20, 2)))
                .unwrap();
            npz.add_array("decoder_feature", &Array3::<f32>::zeros((5, 10, 3)))
                .unwrap();
            npz.finish().unwrap();
        }

        let ds = read_npz(&path).unwrap();
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.input_spec().unwrap().encoder_features, 3);
        assert_eq!(ds.decoder_feature().unwrap().shape(), &[5, 10, 3]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_read_missing_file() {
        assert!(read_npy("/nonexistent/tfts.npy").is_err());
        assert!(read_npz("/nonexistent/tfts.npz").is_err());
    }
}
