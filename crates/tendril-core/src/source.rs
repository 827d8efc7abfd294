//! Topic source: the identity of whoever owns a subscriber store.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::SourceId;

/// Identity of the event owner.
///
/// Passed to every subscriber invocation so a handler attached to several
/// stores can tell them apart. Two sources are equal only if their ids are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSource {
    id: SourceId,
    name: Cow<'static, str>,
}

impl TopicSource {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id: SourceId::generate(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for TopicSource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TopicSource {}

impl std::hash::Hash for TopicSource {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TopicSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
