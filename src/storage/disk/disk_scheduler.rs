use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::{Bytes, BytesMut};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::debug;

use crate::common::{PageId, Result, StrataError, PAGE_SIZE};

use super::DiskManager;

/// A page I/O request for the scheduler's worker thread. Each request carries the channel on
/// which the worker reports completion.
pub enum DiskRequest {
    Read {
        page_id: PageId,
        reply: Sender<Result<Bytes>>,
    },
    Write {
        page_id: PageId,
        data: Bytes,
        reply: Sender<Result<()>>,
    },
}

/// DiskScheduler owns a background worker thread that performs page I/O against the
/// DiskManager. Requests are queued over a channel; the `*_sync` helpers block until the
/// worker answers.
pub struct DiskScheduler {
    /// The disk manager for actual I/O operations
    disk_manager: Arc<DiskManager>,
    /// Request queue; dropped on shutdown so the worker drains and exits
    request_sender: Option<Sender<DiskRequest>>,
    /// Handle to the background worker thread
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a new DiskScheduler and spawns its worker thread.
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(128);
        let dm_clone = Arc::clone(&disk_manager);

        let worker_handle = thread::spawn(move || {
            Self::start_worker_thread(dm_clone, receiver);
        });

        Self {
            disk_manager,
            request_sender: Some(sender),
            worker_handle: Some(worker_handle),
        }
    }

    /// Queues a request for the worker.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        let sender = self
            .request_sender
            .as_ref()
            .ok_or_else(|| StrataError::DiskScheduler("scheduler is shut down".to_string()))?;
        sender
            .send(request)
            .map_err(|e| StrataError::DiskScheduler(format!("Failed to schedule request: {}", e)))
    }

    /// Reads a page and waits for the bytes.
    pub fn schedule_read_sync(&self, page_id: PageId) -> Result<Bytes> {
        let (reply, done) = bounded(1);
        self.schedule(DiskRequest::Read { page_id, reply })?;
        done.recv().map_err(|e| {
            StrataError::DiskScheduler(format!("Failed to receive completion: {}", e))
        })?
    }

    /// Writes a page and waits until the write has reached the file.
    pub fn schedule_write_sync(&self, page_id: PageId, data: Bytes) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);
        let (reply, done) = bounded(1);
        self.schedule(DiskRequest::Write {
            page_id,
            data,
            reply,
        })?;
        done.recv().map_err(|e| {
            StrataError::DiskScheduler(format!("Failed to receive completion: {}", e))
        })?
    }

    /// Processes requests until every sender is gone.
    fn start_worker_thread(disk_manager: Arc<DiskManager>, receiver: Receiver<DiskRequest>) {
        for request in receiver.iter() {
            Self::process_request(&disk_manager, request);
        }
        debug!("disk scheduler worker exiting");
    }

    fn process_request(disk_manager: &DiskManager, request: DiskRequest) {
        // A caller that stopped waiting is not an error for the worker.
        match request {
            DiskRequest::Read { page_id, reply } => {
                let mut buf = BytesMut::zeroed(PAGE_SIZE);
                let result = disk_manager
                    .read_page(page_id, &mut buf)
                    .map(|_| buf.freeze());
                let _ = reply.send(result);
            }
            DiskRequest::Write {
                page_id,
                data,
                reply,
            } => {
                let _ = reply.send(disk_manager.write_page(page_id, &data));
            }
        }
    }

    /// Returns a reference to the underlying DiskManager.
    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the queue lets the worker finish what is queued and exit.
        self.request_sender.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_disk_scheduler_read_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let page_id = scheduler.disk_manager().allocate_page().unwrap();

        let mut write_data = BytesMut::zeroed(PAGE_SIZE);
        write_data[0] = 42;
        write_data[100] = 255;
        scheduler
            .schedule_write_sync(page_id, write_data.freeze())
            .unwrap();

        let read_data = scheduler.schedule_read_sync(page_id).unwrap();
        assert_eq!(read_data.len(), PAGE_SIZE);
        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
    }

    #[test]
    fn test_disk_scheduler_reports_errors() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let result = scheduler.schedule_read_sync(crate::common::INVALID_PAGE_ID);
        assert!(matches!(result, Err(StrataError::InvalidPageId(_))));
    }

    #[test]
    fn test_disk_scheduler_shared_between_threads() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = Arc::new(DiskScheduler::new(dm));
        let pages: Vec<_> = (0..4)
            .map(|_| scheduler.disk_manager().allocate_page().unwrap())
            .collect();

        let handles: Vec<_> = pages
            .iter()
            .map(|&page_id| {
                let scheduler = Arc::clone(&scheduler);
                thread::spawn(move || {
                    let data = Bytes::from(vec![page_id.as_u32() as u8 + 1; PAGE_SIZE]);
                    scheduler.schedule_write_sync(page_id, data).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for page_id in pages {
            let data = scheduler.schedule_read_sync(page_id).unwrap();
            assert_eq!(data[PAGE_SIZE - 1], page_id.as_u32() as u8 + 1);
        }
    }
}
