use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::{DbError, Result};
use crate::model::Entity;

/// Lifecycle points of a table write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableEvent {
    PreSave,
    PostSave,
    PreInsert,
    PostInsert,
    PreUpdate,
    PostUpdate,
    PostDelete,
}

impl TableEvent {
    pub const ALL: [TableEvent; 7] = [
        Self::PreSave,
        Self::PostSave,
        Self::PreInsert,
        Self::PostInsert,
        Self::PreUpdate,
        Self::PostUpdate,
        Self::PostDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreSave => "pre_save",
            Self::PostSave => "post_save",
            Self::PreInsert => "pre_insert",
            Self::PostInsert => "post_insert",
            Self::PreUpdate => "pre_update",
            Self::PostUpdate => "post_update",
            Self::PostDelete => "post_delete",
        }
    }
}

impl FromStr for TableEvent {
    type Err = DbError;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == name)
            .ok_or_else(|| DbError::InvalidEvent(name.to_string()))
    }
}

impl fmt::Display for TableEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait EventListener: Send + Sync {
    fn handle(&self, event: TableEvent, entity: &mut Entity) -> Result<()>;
}

impl<F> EventListener for F
where
    F: Fn(TableEvent, &mut Entity) -> Result<()> + Send + Sync,
{
    fn handle(&self, event: TableEvent, entity: &mut Entity) -> Result<()> {
        self(event, entity)
    }
}

/// Callbacks per event, kept in registration order.
#[derive(Default, Clone)]
pub struct Listeners {
    by_event: HashMap<TableEvent, Vec<Arc<dyn EventListener>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: TableEvent, listener: Arc<dyn EventListener>) {
        self.by_event.entry(event).or_default().push(listener);
    }

    pub fn for_event(&self, event: TableEvent) -> Vec<Arc<dyn EventListener>> {
        self.by_event.get(&event).cloned().unwrap_or_default()
    }

    pub fn count(&self, event: TableEvent) -> usize {
        self.by_event.get(&event).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.by_event.clear();
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for event in TableEvent::ALL {
            let count = self.count(event);
            if count > 0 {
                map.entry(&event.as_str(), &count);
            }
        }
        map.finish()
    }
}
