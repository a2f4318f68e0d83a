use matrix_types::{EngineError, Key, Value};
use std::{collections::HashMap, future::Future};

/// Staged change to one key.
#[derive(Clone, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Status {
    Update(Value),
    Delete,
}

/// Backend-agnostic key/value state. `Layer` stacks on top of anything that
/// implements this.
pub trait State {
    fn get(&self, key: &Key) -> impl Future<Output = Option<Value>>;
    fn insert(&mut self, key: Key, value: Value) -> impl Future<Output = ()>;
    fn delete(&mut self, key: &Key) -> impl Future<Output = ()>;

    fn apply(&mut self, changes: Vec<(Key, Status)>) -> impl Future<Output = ()> {
        async {
            for (key, status) in changes {
                match status {
                    Status::Update(value) => self.insert(key, value).await,
                    Status::Delete => self.delete(&key).await,
                }
            }
        }
    }
}

/// In-memory store, the primary backend.
#[derive(Default)]
pub struct Memory {
    state: HashMap<Key, Value>,
}

impl Memory {
    /// Apply a committed batch with optimistic concurrency control: every
    /// versioned update must carry the version it was read at, or the whole
    /// batch is rejected before anything is written. On success each
    /// pre-existing versioned value is stored with its version bumped.
    pub async fn apply_guarded(&mut self, changes: Vec<(Key, Status)>) -> Result<(), EngineError> {
        for (key, status) in &changes {
            let Status::Update(value) = status else {
                continue;
            };
            let Some(read_version) = value.version() else {
                continue;
            };
            if let Some(current) = self.state.get(key).and_then(Value::version) {
                if current != read_version {
                    return Err(EngineError::VersionConflict {
                        key: key.to_string(),
                    });
                }
            }
        }
        for (key, status) in changes {
            match status {
                Status::Update(mut value) => {
                    if let Some(read_version) = value.version() {
                        if self.state.contains_key(&key) {
                            value.set_version(read_version + 1);
                        }
                    }
                    self.state.insert(key, value);
                }
                Status::Delete => {
                    self.state.remove(&key);
                }
            }
        }
        Ok(())
    }
}

impl State for Memory {
    async fn get(&self, key: &Key) -> Option<Value> {
        self.state.get(key).cloned()
    }

    async fn insert(&mut self, key: Key, value: Value) {
        self.state.insert(key, value);
    }

    async fn delete(&mut self, key: &Key) {
        self.state.remove(key);
    }
}
