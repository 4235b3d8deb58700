/// 將原始候選時間點整理成最終切點
///
/// 1. 丟棄 `< start_buffer` 的時間點（片頭不切）
/// 2. 保留第一個剩下的時間點
/// 3. 之後只保留與「上一個保留值」相差超過 `min_gap` 的時間點
#[derive(Debug, Clone, Copy)]
pub struct TimestampReducer {
    pub start_buffer: f64,
    pub min_gap: f64,
}

impl TimestampReducer {
    #[must_use]
    pub const fn new(start_buffer: f64, min_gap: f64) -> Self {
        Self {
            start_buffer,
            min_gap,
        }
    }

    #[must_use]
    pub fn reduce(&self, timestamps: &[f64]) -> Vec<f64> {
        let mut candidates: Vec<f64> = timestamps
            .iter()
            .copied()
            .filter(|t| !t.is_nan() && *t >= self.start_buffer)
            .collect();
        candidates.sort_by(f64::total_cmp);

        let mut kept: Vec<f64> = Vec::with_capacity(candidates.len());
        for t in candidates {
            match kept.last() {
                Some(&last) if t - last <= self.min_gap => {}
                _ => kept.push(t),
            }
        }
        kept
    }
}
