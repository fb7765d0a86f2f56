//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryJobQueue**: 開発用・テスト用の JobQueueService
//! - **SubprocessPool**: tokio::process で worker を起動する ProcessPool
//! - **ProcHostProbe**: /proc から load average と空きメモリを読む
//!
//! 本番のジョブ保存先（DB など）は別クレートで JobQueueService を実装します。

pub mod inmem_queue;
pub mod proc_probe;
pub mod subprocess_pool;

pub use self::inmem_queue::{InMemoryJobQueue, StatusCounts};
pub use self::proc_probe::ProcHostProbe;
pub use self::subprocess_pool::{SubprocessPool, SubprocessPoolFactory};
