use std::hash::Hash;

use async_channel::{Receiver, Sender};
use cutline_core::collections::HashMap;

/// Fan-out of events to any number of receivers per key. Receivers that
/// have been dropped are pruned the next time their key is notified.
#[derive(Debug)]
pub struct Subscribers<K, E> {
    map: HashMap<K, Vec<Sender<E>>>,
}

impl<K, E> Subscribers<K, E> {
    pub fn new() -> Subscribers<K, E> {
        Subscribers {
            map: HashMap::default(),
        }
    }
}

impl<K: Copy + Eq + Hash, E: Clone> Subscribers<K, E> {
    pub fn subscribe(&mut self, key: K) -> Receiver<E> {
        let (sender, receiver) = async_channel::unbounded();
        self.map.entry(key).or_default().push(sender);
        receiver
    }

    pub fn notify(&mut self, key: K, event: E) {
        let Some(senders) = self.map.get_mut(&key) else {
            return;
        };

        let mut i = 0;
        while i < senders.len() {
            if i == senders.len() - 1 {
                if senders[i].try_send(event).is_err() {
                    senders.remove(i);
                }
                break;
            } else if senders[i].try_send(event.clone()).is_err() {
                senders.remove(i);
            } else {
                i += 1;
            }
        }
    }

    pub fn has_subscribers(&self, key: K) -> bool {
        self.map.get(&key).is_some_and(|v| !v.is_empty())
    }
}

impl<K, E> Default for Subscribers<K, E> {
    fn default() -> Subscribers<K, E> {
        Subscribers::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_reaches_every_receiver() {
        let mut subscribers = Subscribers::<u32, &str>::new();
        let a = subscribers.subscribe(1);
        let b = subscribers.subscribe(1);
        let other = subscribers.subscribe(2);

        subscribers.notify(1, "hello");

        assert_eq!(a.try_recv(), Ok("hello"));
        assert_eq!(b.try_recv(), Ok("hello"));
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut subscribers = Subscribers::<(), u32>::new();
        let kept = subscribers.subscribe(());
        drop(subscribers.subscribe(()));

        subscribers.notify((), 1);
        subscribers.notify((), 2);

        assert_eq!(kept.try_recv(), Ok(1));
        assert_eq!(kept.try_recv(), Ok(2));

        drop(kept);
        subscribers.notify((), 3);
        assert!(!subscribers.has_subscribers(()));
    }
}
