//! tendril-core
//!
//! Weak-reference subscriber registry with a background purge scheduler.
//!
//! # モジュール構成
//! - **ids**: ULID ベースの型付き ID（SourceId, SchedulerId）
//! - **source**: TopicSource（通知元の識別子）
//! - **reference**: CallableReference（weak / strong / static の購読者参照と同一性）
//! - **delegate**: Delegate（複数バインディングを束ねた呼び出し可能オブジェクト）
//! - **store**: SubscriberStore（順序付き購読者リスト、スナップショット通知、purge）
//! - **scheduler**: RecurringActionScheduler（非重複の定期実行、専用スレッド）
//! - **purge**: PurgeCoordinator（store の定期 purge）
//! - **config / stats / error**: 設定、統計、エラー型

pub mod config;
pub mod delegate;
pub mod error;
pub mod ids;
pub mod purge;
pub mod reference;
pub mod scheduler;
pub mod source;
pub mod stats;
pub mod store;

pub use config::{
    IntervalCommand, RUN_ONCE, STOP_AFTER_CYCLE, STOP_NOW, SchedulerConfig, StoreConfig,
};
pub use delegate::{Binding, Delegate};
pub use error::{HandlerError, HandlerResult, Result, TendrilError};
pub use ids::{SchedulerId, SourceId};
pub use purge::PurgeCoordinator;
pub use reference::{
    CallableReference, InvocableHandle, Method, MethodId, Owner, ReferenceKey, ReferenceState,
    TargetKey,
};
pub use scheduler::{RecurringActionScheduler, SchedulerState};
pub use source::TopicSource;
pub use stats::StoreStats;
pub use store::SubscriberStore;
