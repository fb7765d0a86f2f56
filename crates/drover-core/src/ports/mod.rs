//! Ports - 抽象化レイヤー
//!
//! runner が依存する外部システム（ジョブの保存先、サブプロセス pool、
//! ホスト情報、時刻、ID 生成）へのインターフェースです。
//! runner は具体的な実装を知りません。

pub mod clock;
pub mod host_probe;
pub mod id_generator;
pub mod job_queue;
pub mod process_pool;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::host_probe::{HostProbe, StaticHostProbe};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_queue::JobQueueService;
pub use self::process_pool::{PoolFactory, ProcessPool};
