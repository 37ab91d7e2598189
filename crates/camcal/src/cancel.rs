use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal, checked once per loop iteration.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Cancel `token` when the operator types `q` + Enter.
///
/// With `cancel_on_eof`, a closed stdin cancels too. Runs on a detached
/// thread that ends with stdin.
pub fn watch_stdin(token: CancelToken, cancel_on_eof: bool) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) if l.trim().eq_ignore_ascii_case("q") => {
                    log::info!("stop requested from stdin");
                    token.cancel();
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("stdin watcher stopped: {e}");
                    break;
                }
            }
        }
        if cancel_on_eof {
            log::debug!("stdin closed");
            token.cancel();
        }
    });
}
