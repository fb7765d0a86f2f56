//! drover-core
//!
//! Tick-driven runner that drains a job queue into a pool of worker subprocesses.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, job, state, rule, task, command, errors）
//! - **ports**: 抽象化レイヤー（JobQueueService, ProcessPool, HostProbe, Clock, IdGenerator）
//! - **app**: 設定と制御ループ（RunnerConfig, QueueRunner）
//! - **impls**: 実装（InMemoryJobQueue, SubprocessPool, ProcHostProbe）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{QueueRunner, RunnerConfig};
pub use domain::{JobDescriptor, JobStatus, QueueName, RunnerError};
