//! Small reductions shared by the vectorizer, the whitening engine and
//! whoever consumes the prepared targets.

/// Arithmetic mean, `None` for an empty sequence.
pub fn mean<'a, I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
    if count == 0 {
        return None;
    }
    Some(sum / count as f64)
}

/// Index of the first strict maximum, scanning left to right from a `-inf`
/// baseline. An all-equal sequence yields `Some(0)`, an empty one `None`.
pub fn argmax_index<'a, I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut iter = values.into_iter().peekable();
    iter.peek()?;

    let mut best = f64::NEG_INFINITY;
    let mut best_idx = 0;
    for (i, &v) in iter.enumerate() {
        if v > best {
            best = v;
            best_idx = i;
        }
    }
    Some(best_idx)
}
