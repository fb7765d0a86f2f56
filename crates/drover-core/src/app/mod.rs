//! App - アプリケーション層
//!
//! ports を組み合わせて runner を組み立てます。
//!
//! # 主要コンポーネント
//! - **RunnerConfig**: 起動時に読む不変の設定
//! - **QueueRunner**: tick 駆動の制御ループ（claim → gate → initialize → dispatch）

pub mod config;
pub mod runner;

pub use self::config::{ConfigError, RunnerConfig};
pub use self::runner::QueueRunner;
