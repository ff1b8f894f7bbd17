use plexus_shared::{APP_ENV, AppError, ErrorKind};

/// Threshold for determining if L2 normalization is needed.
const L2_NORM_TOLERANCE: f32 = 1e-6;

/// Process an embedding vector to ensure it is L2 normalized with exactly
/// `EMBEDDING_DIM` dimensions.
///
/// - If dim > target: truncate and L2 normalize
/// - If dim == target: normalize only if not already normalized
/// - If dim < target: error
pub fn process_embedding(mut vec: Vec<f32>) -> Result<Vec<f32>, AppError> {
  let target = APP_ENV.embedding_dim;
  match vec.len() {
    d if d > target => {
      vec.truncate(target);
      l2_normalize(&mut vec);
      Ok(vec)
    }
    d if d == target => {
      let norm_sq: f32 = vec.iter().map(|x| x * x).sum();
      if (norm_sq - 1.0).abs() > L2_NORM_TOLERANCE {
        l2_normalize(&mut vec);
      }
      Ok(vec)
    }
    d => Err(AppError::new(
      ErrorKind::Upstream,
      anyhow::anyhow!("embedding dimension {d} is less than required {target}"),
    )),
  }
}

/// L2 normalize a vector in-place.
fn l2_normalize(vec: &mut [f32]) {
  let norm_sq: f32 = vec.iter().map(|x| x * x).sum();
  let norm = norm_sq.sqrt();
  if norm > 1e-12 {
    for x in vec.iter_mut() {
      *x /= norm;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::l2_normalize;

  #[test]
  fn normalizes_to_unit_length() {
    let mut v = vec![3.0_f32, 4.0];
    l2_normalize(&mut v);
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-6);
  }

  #[test]
  fn zero_vector_is_left_alone() {
    let mut v = vec![0.0_f32; 4];
    l2_normalize(&mut v);
    assert!(v.iter().all(|x| *x == 0.0));
  }
}
