//! # vista-tasks
//!
//! 可视化应用抽取出的异步任务框架核心：一个可组合、可取消、支持层级进度汇报的
//! `Promise`/`Future` 抽象，既能在后台工作线程池上运行，也能在协作式主线程调度器
//! 上运行。
//!
//! # 设计背景（Why）
//!
//! 原始实现来自一个大型可视化应用，其任务框架与粒子/化学键数据容器、渲染管线、
//! 切片修改器等视图层代码混杂在同一代码库中。本 crate 只抽取"状态机 + 所有权
//! 纪律 + 并发契约"这部分——这正是原始实现中唯一难以正确复刻的部分；序列化、
//! 日志桥接、UI 信号转发等留给调用方，本 crate 只规定核心向它们暴露的观察者协议。
//!
//! # 契约说明（What）
//!
//! 十个组成部分按依赖关系从叶子到根排列：
//!
//! - [`task`] — C1 任务状态 + C2 进度扩展 + C3/C4 线程安全与主线程变体（合并为
//!   一个具体类型，通过组合而非继承区分）。
//! - [`dependency`] — C5 依赖句柄：独立于 `Arc` 强引用计数的"共享计数"，归零时
//!   触发取消。
//! - [`future`] — C6 `Future`/`SharedFuture` 读端句柄。
//! - [`promise`] — C7 `Promise` 写端句柄。
//! - [`continuation`] — C8 续延任务：`then`/`then_task`/`finally`/`on_error`。
//! - [`watcher`] — C9 单线程生命周期与进度观察者。
//! - [`manager`] — C10 任务管理器：注册、存活列表、阻塞等待并泵送事件循环。
//! - [`executor`] — 任务管理器与续延任务共同依赖的工作重定向抽象。
//! - [`error`] — 错误分类：取消、被捕获的生产者异常、契约违规。
//! - [`progress`] — 进度状态与加权子步骤投影算法，被 [`task`] 内嵌使用。
//!
//! # 取舍（Trade-offs）
//!
//! `no_std + alloc` 是基线；宿主线程原语（`Condvar`、`thread::park`）只在 `std`
//! 特性打开时才可用，这限定了 [`manager::TaskManager`] 的阻塞等待路径。
#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

pub mod continuation;
pub mod dependency;
pub mod error;
pub mod executor;
pub mod future;
pub mod manager;
pub mod progress;
pub mod promise;
pub mod sealed;
pub mod task;
pub mod watcher;

#[cfg(any(test, feature = "test-stubs"))]
pub mod test_stubs;

pub use dependency::Dependency;
pub use error::{CapturedError, TaskError};
pub use executor::{Executor, InlineExecutor};
pub use future::{Future, SharedFuture};
pub use manager::{TaskManager, TaskManagerOptions};
pub use promise::Promise;
pub use task::TaskId;
pub use watcher::{TaskEvent, Watcher};

/// 便捷别名：框架内几乎所有可能失败的操作都以此为 `Result` 的错误类型。
pub type TaskResult<T> = core::result::Result<T, TaskError>;
