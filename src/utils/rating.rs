/// Mean review score rounded to one decimal, `None` without reviews
///
/// Works on the integer sum and count so that halves round away from zero
/// exactly (7.25 -> 7.3) instead of depending on float representation.
pub fn average_to_tenth(score_sum: Option<i64>, review_count: i64) -> Option<f64> {
    let score_sum = score_sum?;
    if review_count <= 0 {
        return None;
    }
    let tenths = (score_sum * 20 + review_count) / (review_count * 2);
    Some(tenths as f64 / 10.0)
}
