//! # Host Test Executor Boundary / 主机测试执行器边界
//!
//! The engine never runs a test body itself. It hands each item to a
//! [`HostExecutor`], which runs the setup/call/teardown protocol and returns
//! one outcome record per phase.
//!
//! Cooperative execution is an explicit capability: the cooperative pool
//! passes a [`Cooperative`] handle and the executor uses it wherever it would
//! otherwise block, instead of the engine patching blocking calls globally.
//!
//! 引擎从不亲自运行测试体。它把每个测试项交给 [`HostExecutor`]，
//! 由其执行 setup/call/teardown 协议并为每个阶段返回一条结果记录。
//!
//! 协作式执行是一种显式能力：协作池传入 [`Cooperative`] 句柄，
//! 执行器在原本会阻塞的地方使用它，而不是由引擎全局替换阻塞调用。

use crate::core::errors::ItemError;
use crate::core::models::{OutcomeRecord, TestItem};
use futures::future::LocalBoxFuture;
use std::io;
use std::process::Output;
use std::time::Duration;

/// Runs a single test item.
/// 运行单个测试项。
pub trait HostExecutor: Send + Sync {
    /// Runs `item` to completion on the calling thread.
    ///
    /// `next` is the item that will run right after this one on the same
    /// control flow, if the strategy can guarantee it. Executors use it to
    /// keep shared fixtures alive between consecutive items.
    fn execute(
        &self,
        item: &TestItem,
        next: Option<&TestItem>,
    ) -> Result<Vec<OutcomeRecord>, ItemError>;

    /// Runs `item` inside the cooperative pool.
    ///
    /// The default implementation has no yield points and simply runs
    /// [`HostExecutor::execute`]; it still works, it just does not overlap
    /// with sibling tasks.
    fn execute_cooperative<'a>(
        &'a self,
        item: &'a TestItem,
        coop: Cooperative,
    ) -> LocalBoxFuture<'a, Result<Vec<OutcomeRecord>, ItemError>> {
        let _ = coop;
        Box::pin(async move { self.execute(item, None) })
    }

    /// Called once after the last batch, on the session's thread.
    /// Releases anything the executor kept alive across items.
    fn finish(&self) {}
}

/// Yield-on-block capability handed to executors by the cooperative pool.
///
/// Every method suspends the current task and lets sibling tasks on the
/// same thread make progress.
///
/// 协作池交给执行器的“阻塞即让出”能力。
/// 每个方法都会挂起当前任务，让同一线程上的其他任务继续执行。
#[derive(Debug, Clone, Copy)]
pub struct Cooperative {
    _private: (),
}

impl Cooperative {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    pub async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    pub async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }

    /// Runs a child process to completion without blocking the thread.
    pub async fn run_command(&self, mut command: tokio::process::Command) -> io::Result<Output> {
        command.kill_on_drop(true).output().await
    }
}
