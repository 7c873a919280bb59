use crate::utils::error::TriageError;
use crate::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// 多个阶段共享的截止时刻
///
/// 同一次操作的各个阶段共用一个预算，而不是每段各自重新计时。
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
    budget: Option<Duration>,
}

impl Deadline {
    /// 从现在起 `timeout` 之后截止；`None` 表示不限时
    pub fn after(timeout: Option<Duration>) -> Self {
        Self {
            at: timeout.map(|limit| Instant::now() + limit),
            budget: timeout,
        }
    }

    /// 在剩余时限内等待 `fut`
    ///
    /// 超时后 `fut` 被丢弃，其内部未提交的工作随之放弃。
    pub async fn run<T, F>(&self, stage: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let (Some(at), Some(budget)) = (self.at, self.budget) else {
            return fut.await;
        };

        match tokio::time::timeout_at(at, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("{} exceeded its {:?} deadline", stage, budget);
                Err(TriageError::Timeout {
                    stage,
                    timeout: budget,
                })
            }
        }
    }
}

/// 单阶段的时限等待
pub async fn with_timeout<T, F>(stage: &'static str, timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    Deadline::after(timeout).run(stage, fut).await
}
