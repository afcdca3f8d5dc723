use crate::{DockPeekError, Result};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// Run the current thread's run loop for at most `timeout`, returning early
/// once a source (such as the event tap) has been handled.
pub fn run_main_loop_once(timeout: Duration) {
    platform::run_once(timeout);
}

#[cfg(target_os = "macos")]
mod platform {
    use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
    use std::time::Duration;

    pub fn run_once(timeout: Duration) {
        let _ = CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, timeout, true);
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use std::time::Duration;

    pub fn run_once(timeout: Duration) {
        std::thread::sleep(timeout);
    }
}

/// Mailbox drained by the main loop.
///
/// Senders may live anywhere (the preview surface, a signal thread); messages
/// are only ever handled on the thread that owns the queue.
pub struct MainQueue<T> {
    name: String,
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> std::fmt::Debug for MainQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueue")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T> MainQueue<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            name: name.into(),
            sender,
            receiver,
        }
    }

    pub fn sender(&self) -> MainSender<T> {
        MainSender {
            name: self.name.clone(),
            sender: self.sender.clone(),
        }
    }

    /// Everything queued so far, in send order
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

/// Sending half of a [`MainQueue`]
pub struct MainSender<T> {
    name: String,
    sender: Sender<T>,
}

impl<T> Clone for MainSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<T> std::fmt::Debug for MainSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainSender")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T> MainSender<T> {
    pub fn send(&self, message: T) -> Result<()> {
        self.sender.send(message).map_err(|_| {
            DockPeekError::MacOSAPIError(format!("main queue '{}' has been dropped", self.name))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_messages_in_order() {
        let queue = MainQueue::new("test");
        let sender = queue.sender();
        let from_thread = sender.clone();

        sender.send(1).unwrap();
        std::thread::spawn(move || from_thread.send(2).unwrap())
            .join()
            .unwrap();

        assert_eq!(queue.drain(), vec![1, 2]);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn send_fails_once_queue_is_dropped() {
        let queue = MainQueue::<u8>::new("gone");
        let sender = queue.sender();
        drop(queue);

        assert!(sender.send(1).is_err());
    }
}
