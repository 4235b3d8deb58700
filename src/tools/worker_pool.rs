use anyhow::{Context, Result};
use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};
use sysinfo::System;

/// 邏輯 CPU 核心數（至少 1）
#[must_use]
pub fn cpu_count() -> usize {
    let mut system = System::new();
    system.refresh_cpu_all();
    system.cpus().len().max(1)
}

/// 每個工作執行緒會整段佔住一個外部程序，所以上限不超過核心數
#[must_use]
pub fn worker_limit(max_workers: usize, cores: usize) -> usize {
    let cores = cores.max(1);
    if max_workers == 0 {
        cores
    } else {
        max_workers.min(cores)
    }
}

pub fn build_worker_pool(max_workers: usize) -> Result<ThreadPool> {
    let threads = worker_limit(max_workers, cpu_count());
    debug!("建立工作執行緒池: {threads} 個執行緒");

    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("break-worker-{index}"))
        .build()
        .context("無法建立工作執行緒池")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_limit_defaults_to_cores() {
        assert_eq!(worker_limit(0, 8), 8);
        assert_eq!(worker_limit(0, 0), 1);
    }

    #[test]
    fn test_worker_limit_capped_at_cores() {
        assert_eq!(worker_limit(16, 4), 4);
        assert_eq!(worker_limit(2, 4), 2);
    }

    #[test]
    fn test_build_worker_pool() {
        let pool = build_worker_pool(1).unwrap();
        assert_eq!(pool.current_num_threads(), 1);
    }
}
