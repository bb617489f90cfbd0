use tokio::sync::watch;

use crate::EngineError;

/// Cancellation signal handed to every engine task.
///
/// Sending `true` on the paired sender asks the tasks to stop. Dropping the
/// sender without doing so is reported as [`EngineError::ShutdownLost`].
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn channel() -> (watch::Sender<bool>, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (tx, Shutdown { rx })
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once shutdown has been requested. Cancel safe.
    pub async fn wait(&mut self) -> Result<(), EngineError> {
        loop {
            if *self.rx.borrow_and_update() {
                return Ok(());
            }

            if self.rx.changed().await.is_err() {
                return if *self.rx.borrow() {
                    Ok(())
                } else {
                    Err(EngineError::ShutdownLost)
                };
            }
        }
    }
}
