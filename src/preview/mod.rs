//! Live preview consumers
//!
//! Preview mode shows every processed frame twice: the stamped frame ("Live")
//! and the binarised difference mask ("Motion").
//! - `WindowPreview` (feature `preview`) opens two OpenCV highgui windows and
//!   stops the run when `q` is pressed in either of them
//! - [`PreviewSink`] refreshes two JPEG snapshots on disk for builds without
//!   OpenCV; quitting is a `q` line on stdin via [`spawn_quit_watcher`]
//!
//! Both swallow and log their own failures so a broken preview never
//! affects recording.

mod snapshot;
#[cfg(feature = "preview")]
mod window;

pub use snapshot::{PreviewSink, LIVE_FILE, MOTION_FILE};
#[cfg(feature = "preview")]
pub use window::{WindowPreview, LIVE_WINDOW, MOTION_WINDOW};

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Raise `stop` when a line reading `q` arrives on stdin.
///
/// The watcher thread is detached; it exits on `q`, EOF or a read error.
pub fn spawn_quit_watcher(stop: Arc<AtomicBool>) {
    let spawned = thread::Builder::new()
        .name("quit-watcher".to_string())
        .spawn(move || watch_for_quit(std::io::stdin().lock(), &stop));
    if let Err(e) = spawned {
        log::warn!("Could not watch stdin for quit: {}", e);
    }
}

fn watch_for_quit(input: impl BufRead, stop: &AtomicBool) {
    for line in input.lines() {
        match line {
            Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                log::info!("Quit requested");
                stop.store(true, Ordering::Relaxed);
                return;
            }
            Ok(_) => {}
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_quit_watcher_reacts_to_q() {
        let stop = AtomicBool::new(false);
        watch_for_quit(Cursor::new("hello\n q \n"), &stop);
        assert!(stop.load(Ordering::Relaxed));
    }

    #[test]
    fn test_quit_watcher_ignores_other_input() {
        let stop = AtomicBool::new(false);
        watch_for_quit(Cursor::new("quit\nx\n"), &stop);
        assert!(!stop.load(Ordering::Relaxed));
    }
}
