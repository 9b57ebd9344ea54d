use ndarray::{Array1, ArrayView1};

use crate::error::{ClassifierError, Result};

/// Probability distribution over one row of logits.
///
/// The row maximum is subtracted before exponentiating, so large logits stay finite.
pub fn softmax(logits: ArrayView1<f32>) -> Array1<f32> {
    let shift = logits.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
    let mut probs = logits.mapv(|x| (x - shift).exp());
    let total = probs.sum();
    probs.mapv_inplace(|p| p / total);
    probs
}

/// Position and value of the largest probability; the lowest index wins a tie.
pub fn argmax_and_max(probs: ArrayView1<f32>) -> (usize, f32) {
    probs
        .indexed_iter()
        .fold((0, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
}

/// Softmax over one row of logits, then the winning class and its probability.
pub fn top_class(logits: ArrayView1<f32>) -> Result<(usize, f32)> {
    if logits.is_empty() {
        return Err(ClassifierError::inference("model returned no logits"));
    }
    if logits.iter().any(|v| !v.is_finite()) {
        return Err(ClassifierError::inference("model returned non-finite logits"));
    }
    let probs = softmax(logits);
    let (idx, confidence) = argmax_and_max(probs.view());
    Ok((idx, confidence.clamp(0.0, 1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;

    #[test]
    fn softmax_is_a_distribution() {
        let probs = softmax(array![2.0_f32, -1.0, 0.5, 0.0].view());
        assert_relative_eq!(probs.sum(), 1.0, epsilon = 1e-6);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(probs[0] > probs[2] && probs[2] > probs[3] && probs[3] > probs[1]);
    }

    #[test]
    fn softmax_survives_large_logits() {
        let probs = softmax(array![1000.0_f32, 999.0].view());
        assert!(probs.iter().all(|p| p.is_finite()));
        assert_abs_diff_eq!(probs[0], 1.0 / (1.0 + (-1.0_f32).exp()), epsilon = 1e-6);
    }

    #[test]
    fn softmax_reads_a_column_view() {
        let logits = array![[0.0_f32, 9.0], [1.0, 9.0], [2.0, 9.0]];
        let probs = softmax(logits.column(0));
        assert_relative_eq!(probs.sum(), 1.0, epsilon = 1e-6);
        assert_eq!(argmax_and_max(probs.view()).0, 2);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax_and_max(array![0.25_f32, 0.5, 0.5, 0.0].view()), (1, 0.5));
    }

    #[test]
    fn top_class_matches_distribution_max() {
        let logits = array![0.3_f32, 2.7, -0.4];
        let (idx, confidence) = top_class(logits.view()).unwrap();
        let probs = softmax(logits.view());
        assert_eq!(idx, 1);
        assert_eq!(confidence, probs.iter().cloned().fold(f32::MIN, f32::max));
    }

    #[test]
    fn two_equal_logits_give_half_confidence() {
        let (idx, confidence) = top_class(array![1.5_f32, 1.5].view()).unwrap();
        assert_eq!(idx, 0);
        assert_abs_diff_eq!(confidence, 0.5, epsilon = 1e-7);
    }

    #[test]
    fn rejects_empty_and_nan_logits() {
        assert!(top_class(Array1::<f32>::zeros(0).view()).unwrap_err().is_inference());
        assert!(top_class(array![0.1_f32, f32::NAN].view()).unwrap_err().is_inference());
    }
}
