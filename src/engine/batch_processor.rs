// ==========================================
// ARPA 合规报送系统 - 批处理器
// ==========================================
// 用途: 把任意分页数据源按批拉取、按批处理
//       （数据库记录、外部接口等分页输入流都适用）
// 并发模型: 单逻辑线程,fetch 与 process 顺序执行,
//           迭代之间以定时器休眠让出
// 失败语义: fetch/process 的错误原样上抛,不重试、不吞错
// ==========================================

use crate::config::BatchConfig;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::debug;

// ==========================================
// RunState - 运行状态
// ==========================================
// 显式三态,stop() 只做 Running → Stopping 的翻转,
// 循环顶部观察到 Stopping 才退出,在途批次得以收尾
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopping,
    Stopped,
}

// ==========================================
// BatchJob - 批处理任务
// ==========================================
#[async_trait]
pub trait BatchJob: Send + Sync {
    type Item: Send;

    /// 分页拉取一批记录
    ///
    /// # 参数
    /// - page_size: 本页最大记录数
    /// - offset: 分页偏移
    ///
    /// # 返回
    /// - 空页表示数据已取尽
    async fn fetch_records(
        &self,
        page_size: usize,
        offset: usize,
    ) -> anyhow::Result<Vec<Self::Item>>;

    /// 处理一批记录
    async fn process_records(&self, records: Vec<Self::Item>) -> anyhow::Result<()>;
}

// ==========================================
// BatchProcessorConfig - 批处理配置
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct BatchProcessorConfig {
    pub page_size: usize,
    /// 起始偏移
    pub offset: usize,
    pub sleep_ms: u64,
    /// true = 取尽即停; false = 取尽后从头再扫
    pub run_once: bool,
}

impl Default for BatchProcessorConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            offset: 0,
            sleep_ms: 0,
            run_once: true,
        }
    }
}

impl From<BatchConfig> for BatchProcessorConfig {
    fn from(cfg: BatchConfig) -> Self {
        Self {
            page_size: cfg.page_size,
            offset: 0,
            sleep_ms: cfg.sleep_ms,
            run_once: cfg.run_once,
        }
    }
}

// ==========================================
// BatchStopHandle - 协作式停止句柄
// ==========================================
#[derive(Debug, Clone)]
pub struct BatchStopHandle {
    state: Arc<Mutex<RunState>>,
}

impl BatchStopHandle {
    /// 请求停止（Running → Stopping）
    ///
    /// 循环顶部观察到 Stopping 才真正退出,在途的 fetch/process 不被打断
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("状态锁不可能中毒");
        if *state == RunState::Running {
            *state = RunState::Stopping;
        }
    }

    /// 当前运行状态
    pub fn state(&self) -> RunState {
        *self.state.lock().expect("状态锁不可能中毒")
    }
}

// ==========================================
// BatchProcessor - 批处理器
// ==========================================
pub struct BatchProcessor<J: BatchJob> {
    job: Arc<J>,
    config: BatchProcessorConfig,
    state: Arc<Mutex<RunState>>,
    offset: usize,
    current_page: usize,
}

impl<J: BatchJob> BatchProcessor<J> {
    pub fn new(job: Arc<J>, config: BatchProcessorConfig) -> Self {
        let offset = config.offset;
        Self {
            job,
            config,
            state: Arc::new(Mutex::new(RunState::Stopped)),
            offset,
            current_page: 0,
        }
    }

    /// 获取停止句柄（可跨任务克隆）
    pub fn stop_handle(&self) -> BatchStopHandle {
        BatchStopHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// 当前运行状态
    pub fn state(&self) -> RunState {
        *self.state.lock().expect("状态锁不可能中毒")
    }

    fn set_state(&self, next: RunState) {
        *self.state.lock().expect("状态锁不可能中毒") = next;
    }

    /// 启动批处理循环
    ///
    /// # 返回
    /// - Ok(()): 正常停止（取尽或被 stop()）
    /// - Err: fetch/process 的错误原样上抛（状态仍会落到 Stopped）
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.set_state(RunState::Running);
        let result = self.run_loop().await;
        self.set_state(RunState::Stopped);
        result
    }

    async fn run_loop(&mut self) -> anyhow::Result<()> {
        loop {
            // 协作式取消: 每轮迭代顶部观察一次
            if self.state() != RunState::Running {
                return Ok(());
            }

            let records = self
                .job
                .fetch_records(self.config.page_size, self.offset)
                .await?;

            if !records.is_empty() {
                debug!(
                    page = self.current_page,
                    offset = self.offset,
                    count = records.len(),
                    "处理一批记录"
                );
                self.job.process_records(records).await?;
                self.offset = self.config.page_size + self.config.page_size * self.current_page;
                self.current_page += 1;
                if self.config.sleep_ms > 0 {
                    sleep(Duration::from_millis(self.config.sleep_ms)).await;
                }
            } else {
                // 空页 = 数据取尽,分页状态归零
                self.offset = 0;
                self.current_page = 0;
                if self.config.run_once {
                    return Ok(());
                }
                if self.config.sleep_ms > 0 {
                    sleep(Duration::from_millis(self.config.sleep_ms)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 先给一页数据,之后一直空页
    struct OnePageJob {
        fetch_calls: AtomicUsize,
        process_calls: AtomicUsize,
    }

    #[async_trait]
    impl BatchJob for OnePageJob {
        type Item = i64;

        async fn fetch_records(
            &self,
            page_size: usize,
            offset: usize,
        ) -> anyhow::Result<Vec<i64>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if offset == 0 && self.fetch_calls.load(Ordering::SeqCst) == 1 {
                Ok((0..page_size as i64).collect())
            } else {
                Ok(Vec::new())
            }
        }

        async fn process_records(&self, _records: Vec<i64>) -> anyhow::Result<()> {
            self.process_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_once_terminates_after_single_batch() {
        let job = Arc::new(OnePageJob {
            fetch_calls: AtomicUsize::new(0),
            process_calls: AtomicUsize::new(0),
        });
        let mut processor = BatchProcessor::new(
            Arc::clone(&job),
            BatchProcessorConfig {
                page_size: 5,
                ..Default::default()
            },
        );

        processor.run().await.unwrap();

        assert_eq!(
            job.process_calls.load(Ordering::SeqCst),
            1,
            "exactly one processing call for one page of data"
        );
        assert_eq!(processor.state(), RunState::Stopped);
    }

    /// 持续返回同一页数据,用于验证协作式停止
    struct EndlessJob;

    #[async_trait]
    impl BatchJob for EndlessJob {
        type Item = i64;

        async fn fetch_records(&self, _page_size: usize, _offset: usize) -> anyhow::Result<Vec<i64>> {
            Ok(vec![1])
        }

        async fn process_records(&self, _records: Vec<i64>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stop_handle_ends_continuous_run() {
        let mut processor = BatchProcessor::new(
            Arc::new(EndlessJob),
            BatchProcessorConfig {
                page_size: 1,
                sleep_ms: 1,
                run_once: false,
                ..Default::default()
            },
        );
        let handle = processor.stop_handle();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.stop();
        });

        processor.run().await.unwrap();
        stopper.await.unwrap();
        assert_eq!(processor.state(), RunState::Stopped);
    }

    /// fetch 直接报错
    struct FailingJob;

    #[async_trait]
    impl BatchJob for FailingJob {
        type Item = i64;

        async fn fetch_records(&self, _page_size: usize, _offset: usize) -> anyhow::Result<Vec<i64>> {
            anyhow::bail!("source unavailable")
        }

        async fn process_records(&self, _records: Vec<i64>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_errors_propagate_to_caller() {
        let mut processor =
            BatchProcessor::new(Arc::new(FailingJob), BatchProcessorConfig::default());

        let result = processor.run().await;
        assert!(result.is_err(), "fetch errors must propagate uncaught");
        assert_eq!(
            processor.state(),
            RunState::Stopped,
            "state must settle to Stopped even on error"
        );
    }
}
