//! Reduce predictions to class indices and format output lines.

use ndarray::ArrayView1;

use crate::error::PostprocessError;
use crate::record::{Keyed, Prediction};

/// Index of the highest score. The first maximum wins.
///
/// NaN ranks above every number, so the first NaN wins if there is one.
/// Returns `None` for an empty score vector.
pub fn argmax(scores: ArrayView1<'_, f32>) -> Option<usize> {
    if let Some(i) = scores.iter().position(|v| v.is_nan()) {
        return Some(i);
    }

    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Reduce a keyed prediction to its class index.
pub fn classify(record: Keyed<Prediction>) -> Result<Keyed<usize>, PostprocessError> {
    match argmax(record.value.scores.view()) {
        Some(class) => Ok(Keyed::new(record.key, class)),
        None => Err(PostprocessError::MalformedPrediction {
            key: record.key,
            reason: "empty score vector".to_string(),
        }),
    }
}

/// `<key>,<class>` without a trailing newline.
pub fn format_line(record: &Keyed<usize>) -> String {
    format!("{},{}", record.key, record.value)
}
