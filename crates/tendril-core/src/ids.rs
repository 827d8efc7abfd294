//! Strongly-typed identifiers.
//!
//! # ULID + Phantom type
//! `Id<T>` は ULID を包むジェネリック型で、`T` は実行時には使わない
//! マーカー型です。`SourceId` と `SchedulerId` はどちらも 128-bit の ULID
//! ですが、型が違うので混同できません。
//!
//! ULID は生成順にソートできるので、ログ上で store / scheduler の生成順を
//! 追いやすくなります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for each id kind.
///
/// Provides the prefix used by `Display` ("source-", "scheduler-").
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed id.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Fresh id from the current time and a random component.
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Last 8 characters of the ULID; enough to tell ids apart in thread names.
    pub fn short(&self) -> String {
        let s = self.ulid.to_string();
        s[s.len() - 8..].to_ascii_lowercase()
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型
// ========================================

/// Marker for notification sources (the owner of a subscriber store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {}

impl IdMarker for Source {
    fn prefix() -> &'static str {
        "source-"
    }
}

/// Marker for recurring-action schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scheduler {}

impl IdMarker for Scheduler {
    fn prefix() -> &'static str {
        "scheduler-"
    }
}

/// Identifier of a notification source.
pub type SourceId = Id<Source>;

/// Identifier of a recurring-action scheduler.
pub type SchedulerId = Id<Scheduler>;
