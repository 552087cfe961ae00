// Journal writer actor
// Appends are queued to one writer thread, which drains everything waiting,
// writes it, and syncs once for the whole group before answering each caller

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use contest_common::ContestError;
use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Writer messages
struct AppendRequest {
    line: Vec<u8>,
    respond_to: oneshot::Sender<Result<(), ContestError>>,
}

pub(crate) struct JournalWriter {
    sender: Option<UnboundedSender<AppendRequest>>,
    file: Arc<Mutex<File>>,
    syncs: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl JournalWriter {
    /// Start the writer thread for an already opened journal
    pub(crate) fn spawn(file: File, path: &Path) -> Result<Self, ContestError> {
        let (sender, receiver) = unbounded_channel();
        let file = Arc::new(Mutex::new(file));
        let syncs = Arc::new(AtomicU64::new(0));

        let handle = std::thread::Builder::new()
            .name("contest-journal".to_string())
            .spawn({
                let file = file.clone();
                let syncs = syncs.clone();
                let path = path.to_path_buf();
                move || run(receiver, file, syncs, path)
            })?;

        Ok(Self {
            sender: Some(sender),
            file,
            syncs,
            handle: Some(handle),
        })
    }

    /// Queue one encoded journal line and wait until it is on disk
    pub(crate) async fn append(&self, line: Vec<u8>) -> Result<(), ContestError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .as_ref()
            .ok_or_else(writer_stopped)?
            .send(AppendRequest { line, respond_to })
            .map_err(|_| writer_stopped())?;
        response.await.map_err(|_| writer_stopped())?
    }

    pub(crate) fn file(&self) -> &Mutex<File> {
        &self.file
    }

    /// Number of group writes synced so far
    pub(crate) fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::Relaxed)
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        // Closing the channel ends the writer loop once the queue is drained
        self.sender.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Journal writer thread panicked");
        }
    }
}

fn writer_stopped() -> ContestError {
    ContestError::Storage("journal writer stopped".to_string())
}

fn run(
    mut receiver: UnboundedReceiver<AppendRequest>,
    file: Arc<Mutex<File>>,
    syncs: Arc<AtomicU64>,
    path: PathBuf,
) {
    while let Some(first) = receiver.blocking_recv() {
        let mut group = vec![first];
        while let Ok(next) = receiver.try_recv() {
            group.push(next);
        }

        let result = write_group(&file, &group, &path);
        syncs.fetch_add(1, Ordering::Relaxed);
        debug!(appends = group.len(), ok = result.is_ok(), "Journal group synced");

        for request in group {
            // A caller that went away still had its line written
            let _ = request.respond_to.send(result.clone());
        }
    }
}

fn write_group(
    file: &Mutex<File>,
    group: &[AppendRequest],
    path: &Path,
) -> Result<(), ContestError> {
    let mut file = file.lock();
    let len = file.metadata()?.len();

    let mut result = Ok(());
    for request in group {
        result = file.write_all(&request.line);
        if result.is_err() {
            break;
        }
    }
    if let Err(e) = result.and_then(|_| file.sync_data()) {
        // Cut the partial group off so the next append starts on a clean boundary
        if let Err(te) = file.set_len(len) {
            warn!(path = %path.display(), error = %te, "Failed to roll back journal append");
        }
        return Err(ContestError::Storage(format!(
            "journal append to {} failed: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}
