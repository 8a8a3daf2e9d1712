use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    Closed,
}

/// Source of participant input lines.
pub trait InputSource {
    /// Block for up to `timeout` waiting for input.
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError>;
}

/// Reads stdin on a helper thread. The thread only forwards lines; all session
/// state stays on the caller's thread.
pub struct StdinSource {
    rx: Receiver<InputEvent>,
}

impl StdinSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(InputEvent::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = tx.send(InputEvent::Closed);
        });

        Self { rx }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for StdinSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Channel-fed source for tests.
#[cfg(test)]
pub struct ChannelSource {
    rx: Receiver<InputEvent>,
}

#[cfg(test)]
impl ChannelSource {
    pub fn new(rx: Receiver<InputEvent>) -> Self {
        Self { rx }
    }
}

#[cfg(test)]
impl InputSource for ChannelSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_out_without_input() {
        let (_tx, rx) = mpsc::channel();
        let source = ChannelSource::new(rx);
        assert_eq!(
            source.recv_timeout(Duration::from_millis(1)),
            Err(RecvTimeoutError::Timeout)
        );
    }

    #[test]
    fn passes_lines_through() {
        let (tx, rx) = mpsc::channel();
        tx.send(InputEvent::Line("skip".into())).unwrap();
        let source = ChannelSource::new(rx);
        assert_eq!(
            source.recv_timeout(Duration::from_millis(10)),
            Ok(InputEvent::Line("skip".into()))
        );
    }
}
