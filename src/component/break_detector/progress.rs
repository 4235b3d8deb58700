use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Downscale,
    Silence,
    Frame,
    Cut,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Downscale => "縮小代理",
            Self::Silence => "靜音偵測",
            Self::Frame => "黑畫面分析",
            Self::Cut => "切割",
            Self::Complete => "完成",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub done: u64,
    pub total: u64,
    /// 0-100，不會倒退
    pub percent: f64,
}

/// 進度與狀態的接收端，可能從任何工作執行緒呼叫
///
/// 實作不可在回呼中再呼叫同一個 [`ProgressAggregator`]。
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);

    fn on_status(&self, message: &str);
}

/// 不輸出任何東西的觀察者
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_progress(&self, _update: &ProgressUpdate) {}

    fn on_status(&self, _message: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    done: u64,
    total: u64,
}

impl Bucket {
    fn step(&mut self, count: u64) {
        self.done = self.done.saturating_add(count).min(self.total);
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    downscale: Bucket,
    silence: Bucket,
    frame: Bucket,
    last_percent: f64,
    complete: bool,
}

impl ProgressState {
    fn total(&self) -> u64 {
        self.downscale.total + self.silence.total + self.frame.total
    }

    /// 完成前最多停在 `total - 1`
    fn done(&self) -> u64 {
        if self.complete {
            return self.total();
        }
        let sum = self.downscale.done + self.silence.done + self.frame.done;
        sum.min(self.total().saturating_sub(1))
    }

    fn bucket_mut(&mut self, phase: Phase) -> Option<&mut Bucket> {
        match phase {
            Phase::Downscale => Some(&mut self.downscale),
            Phase::Silence => Some(&mut self.silence),
            Phase::Frame => Some(&mut self.frame),
            Phase::Cut | Phase::Complete => None,
        }
    }

    fn update(&mut self, phase: Phase) -> ProgressUpdate {
        let total = self.total();
        let done = self.done();
        let percent = if self.complete {
            100.0
        } else if total == 0 {
            0.0
        } else {
            done as f64 / total as f64 * 100.0
        };
        self.last_percent = self.last_percent.max(percent);

        ProgressUpdate {
            phase,
            done,
            total,
            percent: self.last_percent,
        }
    }
}

/// 把三個階段（縮小、靜音、幀分析）的工作量合併成單一 0-100% 進度
///
/// 各階段總量是預估值，所以 `done` 在 [`force_complete`](Self::force_complete) 之前
/// 會被限制在 `total - 1`；結束時必須呼叫 `force_complete` 才會到 100%。
pub struct ProgressAggregator<'a> {
    state: Mutex<ProgressState>,
    observer: &'a dyn ProgressObserver,
}

impl<'a> ProgressAggregator<'a> {
    pub fn new(observer: &'a dyn ProgressObserver) -> Self {
        let aggregator = Self {
            state: Mutex::new(ProgressState::default()),
            observer,
        };
        aggregator.emit(Phase::Silence, |_| {});
        aggregator
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 在持有鎖的情況下更新並通知，確保回呼順序與更新順序一致
    fn emit(&self, phase: Phase, mutate: impl FnOnce(&mut ProgressState)) {
        let mut state = self.lock();
        mutate(&mut state);
        let update = state.update(phase);
        self.observer.on_progress(&update);
    }

    /// 在階段邊界加入預估工作量
    pub fn add_totals(&self, downscale: u64, silence: u64, frame: u64) {
        self.emit(Phase::Silence, |state| {
            if state.complete {
                return;
            }
            state.downscale.total += downscale;
            state.silence.total += silence;
            state.frame.total += frame;
        });
    }

    pub fn step_downscale(&self) {
        self.step_many(Phase::Downscale, 1);
    }

    pub fn step_silence(&self) {
        self.step_many(Phase::Silence, 1);
    }

    pub fn step_frame(&self) {
        self.step_many(Phase::Frame, 1);
    }

    /// 一次推進多個單位（例如失敗檔案剩下的預估工作量）
    pub fn step_many(&self, phase: Phase, count: u64) {
        if count == 0 {
            return;
        }
        self.emit(phase, |state| {
            if state.complete {
                return;
            }
            if let Some(bucket) = state.bucket_mut(phase) {
                bucket.step(count);
            }
        });
    }

    pub fn force_complete(&self) {
        self.emit(Phase::Complete, |state| {
            state.downscale.done = state.downscale.total;
            state.silence.done = state.silence.total;
            state.frame.done = state.frame.total;
            state.complete = true;
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressUpdate {
        let mut state = self.lock();
        let phase = if state.complete {
            Phase::Complete
        } else {
            Phase::Frame
        };
        state.update(phase)
    }

    pub fn status(&self, message: &str) {
        self.observer.on_status(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<ProgressUpdate>>,
        statuses: Mutex<Vec<String>>,
    }

    impl ProgressObserver for Recorder {
        fn on_progress(&self, update: &ProgressUpdate) {
            self.updates.lock().unwrap().push(*update);
        }

        fn on_status(&self, message: &str) {
            self.statuses.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn test_emits_once_on_construction() {
        let recorder = Recorder::default();
        let _aggregator = ProgressAggregator::new(&recorder);

        let updates = recorder.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].done, 0);
    }

    #[test]
    fn test_done_is_clamped_below_total_until_complete() {
        let recorder = Recorder::default();
        let aggregator = ProgressAggregator::new(&recorder);
        aggregator.add_totals(1, 1, 2);

        aggregator.step_silence();
        aggregator.step_downscale();
        aggregator.step_frame();
        aggregator.step_frame();
        aggregator.step_frame();

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.done, 3);
        assert!(snapshot.percent < 100.0);

        aggregator.force_complete();
        let last = *recorder.updates.lock().unwrap().last().unwrap();
        assert_eq!(last.phase, Phase::Complete);
        assert_eq!(last.done, last.total);
        assert!((last.percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_force_complete_with_underestimated_buckets() {
        let recorder = Recorder::default();
        let aggregator = ProgressAggregator::new(&recorder);
        aggregator.add_totals(5, 5, 100);
        aggregator.step_silence();

        aggregator.force_complete();
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.done, snapshot.total);
        assert_eq!(snapshot.total, 110);
    }

    #[test]
    fn test_force_complete_without_work() {
        let recorder = Recorder::default();
        let aggregator = ProgressAggregator::new(&recorder);
        aggregator.force_complete();

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.done, snapshot.total);
        assert!((snapshot.percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percent_never_regresses_when_totals_grow() {
        let recorder = Recorder::default();
        let aggregator = ProgressAggregator::new(&recorder);
        aggregator.add_totals(0, 4, 0);
        for _ in 0..3 {
            aggregator.step_silence();
        }
        // 追加幀分析的預估量會讓比例變小
        aggregator.add_totals(2, 0, 100);
        aggregator.step_frame();
        aggregator.force_complete();

        let updates = recorder.updates.lock().unwrap();
        assert!(updates.windows(2).all(|w| w[1].percent >= w[0].percent));
    }

    #[test]
    fn test_steps_after_complete_are_ignored() {
        let recorder = Recorder::default();
        let aggregator = ProgressAggregator::new(&recorder);
        aggregator.add_totals(0, 1, 0);
        aggregator.force_complete();
        aggregator.add_totals(0, 10, 0);
        aggregator.step_silence();

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.done, snapshot.total);
    }

    #[test]
    fn test_concurrent_steps() {
        let recorder = Recorder::default();
        let aggregator = ProgressAggregator::new(&recorder);
        aggregator.add_totals(0, 0, 400);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        aggregator.step_frame();
                    }
                });
            }
        });

        assert_eq!(aggregator.snapshot().done, 399);
        let updates = recorder.updates.lock().unwrap();
        assert!(updates.windows(2).all(|w| w[1].percent >= w[0].percent));
    }

    #[test]
    fn test_status_is_forwarded() {
        let recorder = Recorder::default();
        let aggregator = ProgressAggregator::new(&recorder);
        aggregator.status("處理中: a.mkv");
        assert_eq!(*recorder.statuses.lock().unwrap(), vec!["處理中: a.mkv".to_string()]);
    }
}
