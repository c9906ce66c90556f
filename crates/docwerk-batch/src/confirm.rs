// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Overwrite confirmation.
//
// The batch worker asks over a request/response channel and blocks on the
// reply; whoever owns the receiving end (a terminal prompt, a test) answers.
// A dropped request or a closed channel counts as "no".

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, warn};

/// Decides whether an existing output file may be replaced.
pub trait OverwriteDecider: Send + Sync {
    fn confirm_overwrite(&self, path: &Path) -> bool;
}

impl<F> OverwriteDecider for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn confirm_overwrite(&self, path: &Path) -> bool {
        self(path)
    }
}

/// One pending question from the batch worker.
#[derive(Debug)]
pub struct OverwriteRequest {
    pub path: PathBuf,
    reply: Sender<bool>,
}

impl OverwriteRequest {
    pub fn respond(self, overwrite: bool) {
        if self.reply.send(overwrite).is_err() {
            debug!(path = %self.path.display(), "Overwrite answer arrived after the asker left");
        }
    }
}

/// Decider that forwards every question to a [`Receiver<OverwriteRequest>`].
pub struct ChannelDecider {
    requests: Sender<OverwriteRequest>,
}

impl ChannelDecider {
    pub fn new() -> (Self, Receiver<OverwriteRequest>) {
        let (requests, rx) = mpsc::channel();
        (Self { requests }, rx)
    }
}

impl OverwriteDecider for ChannelDecider {
    fn confirm_overwrite(&self, path: &Path) -> bool {
        let (reply, answer) = mpsc::channel();
        let request = OverwriteRequest {
            path: path.to_path_buf(),
            reply,
        };
        if self.requests.send(request).is_err() {
            warn!(path = %path.display(), "Nobody is answering overwrite questions, skipping");
            return false;
        }
        answer.recv().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_travel_back_to_the_asker() {
        let (decider, requests) = ChannelDecider::new();
        let responder = std::thread::spawn(move || {
            for request in requests {
                let yes = request.path.ends_with("yes.pdf");
                request.respond(yes);
            }
        });

        assert!(decider.confirm_overwrite(Path::new("/out/yes.pdf")));
        assert!(!decider.confirm_overwrite(Path::new("/out/no.pdf")));

        drop(decider);
        responder.join().expect("responder");
    }

    #[test]
    fn unanswered_request_means_no() {
        let (decider, requests) = ChannelDecider::new();
        let responder = std::thread::spawn(move || {
            if let Ok(request) = requests.recv() {
                drop(request);
            }
        });
        assert!(!decider.confirm_overwrite(Path::new("/out/a.pdf")));
        responder.join().expect("responder");

        // Receiver is gone now.
        assert!(!decider.confirm_overwrite(Path::new("/out/b.pdf")));
    }
}
