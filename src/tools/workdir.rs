//! Component G: working-directory handle. Every mutating tool calls `get`
//! at the start of its operation rather than caching the path, so a
//! `change_dir` call takes effect for the very next tool invocation (§4.G).

use std::sync::{Arc, RwLock};

type Observer = Box<dyn Fn(&str) + Send + Sync>;

pub struct WorkdirHandle {
    path: RwLock<String>,
    observers: RwLock<Vec<Observer>>,
}

impl WorkdirHandle {
    pub fn new(initial: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            path: RwLock::new(initial.into()),
            observers: RwLock::new(Vec::new()),
        })
    }

    pub fn get(&self) -> String {
        self.path.read().unwrap().clone()
    }

    /// Atomic swap; observers run synchronously after the swap completes.
    pub fn set(&self, new_path: impl Into<String>) {
        let new_path = new_path.into();
        {
            let mut path = self.path.write().unwrap();
            *path = new_path.clone();
        }
        for observer in self.observers.read().unwrap().iter() {
            observer(&new_path);
        }
    }

    pub fn register_observer(&self, observer: Observer) {
        self.observers.write().unwrap().push(observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn get_reflects_latest_set() {
        let handle = WorkdirHandle::new("/start");
        handle.set("/elsewhere");
        assert_eq!(handle.get(), "/elsewhere");
    }

    #[test]
    fn observer_fires_after_set() {
        let handle = WorkdirHandle::new("/start");
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        handle.register_observer(Box::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        handle.set("/a");
        handle.set("/b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
