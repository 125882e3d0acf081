//! The writeback controller
//!
//! A dedicated controller thread owns the event loop and all dispatch
//! state; update operations run on background worker threads, one per
//! in-flight task. Initialization happens on the controller thread and is
//! handed back to the caller through a condition variable, so a failure to
//! register the message surface surfaces as a startup error.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use lazy_static::lazy_static;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::config::WritebackConfig;
use crate::error::WritebackError;
use crate::storage::MetadataStore;
use crate::writeback::file::guess_content_type;
use crate::writeback::module::{builtin_modules, rdf_types_match, Writeback, WritebackModuleDesc};
use crate::writeback::{Cancellation, TaskCompletion, WritebackRows};

/// The well-known name the controller claims on its message transport
pub const WRITEBACK_SERVICE: &str = "org.freedesktop.Tracker1.Writeback";

lazy_static! {
    /// Transport names owned by controllers in this process. Claiming an
    /// owned name fails initialization, like a second bus-name owner would.
    static ref OWNED_NAMES: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
}

struct NameGuard(String);

impl Drop for NameGuard {
    fn drop(&mut self) {
        OWNED_NAMES.lock().unwrap().remove(&self.0);
    }
}

enum Request {
    GetPid {
        reply: oneshot::Sender<u32>,
    },
    PerformWriteback {
        subject: String,
        rdf_types: Vec<String>,
        results: WritebackRows,
        reply: oneshot::Sender<Vec<TaskCompletion>>,
    },
    CancelTasks {
        subjects: Vec<String>,
    },
    MountPointRemoved {
        mount_path: String,
    },
    Shutdown,
}

/// Controller construction options
#[derive(Clone)]
pub struct ControllerOptions {
    pub service_name: String,
    /// Seconds of idleness before the loop quits; 0 disables the timer
    pub shutdown_timeout: u64,
    pub max_workers: usize,
    pub modules: Vec<WritebackModuleDesc>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        ControllerOptions {
            service_name: WRITEBACK_SERVICE.to_string(),
            shutdown_timeout: 30,
            max_workers: 4,
            modules: builtin_modules(),
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &WritebackConfig) -> Self {
        ControllerOptions {
            shutdown_timeout: config.shutdown_timeout,
            max_workers: config.max_workers,
            ..ControllerOptions::default()
        }
    }
}

/// Acknowledgement of a submitted writeback request; resolves once every
/// dispatched task has posted its completion.
pub struct WritebackAck {
    rx: oneshot::Receiver<Vec<TaskCompletion>>,
}

impl WritebackAck {
    /// Block until all tasks of the request completed
    pub fn wait(self) -> Result<Vec<TaskCompletion>, WritebackError> {
        self.rx.blocking_recv().map_err(|_| WritebackError::NotRunning)
    }
}

/// A cloneable handle onto the controller's message surface
#[derive(Clone)]
pub struct WritebackHandle {
    tx: mpsc::Sender<Request>,
}

impl WritebackHandle {
    fn send(&self, request: Request) -> Result<(), WritebackError> {
        self.tx
            .blocking_send(request)
            .map_err(|_| WritebackError::NotRunning)
    }

    /// The controller's process id
    pub fn get_pid(&self) -> Result<u32, WritebackError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::GetPid { reply })?;
        rx.blocking_recv().map_err(|_| WritebackError::NotRunning)
    }

    /// Submit a writeback request. Returns once the request is queued; the
    /// returned acknowledgement resolves when the dispatched tasks finish.
    pub fn perform_writeback(
        &self,
        subject: &str,
        rdf_types: Vec<String>,
        results: WritebackRows,
    ) -> Result<WritebackAck, WritebackError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::PerformWriteback {
            subject: subject.to_string(),
            rdf_types,
            results,
            reply,
        })?;
        Ok(WritebackAck { rx })
    }

    /// Cancel queued-or-running tasks whose subject matches
    pub fn cancel_tasks(&self, subjects: Vec<String>) -> Result<(), WritebackError> {
        self.send(Request::CancelTasks { subjects })
    }

    /// Cancel tasks whose rows reference files under the removed mount
    pub fn notify_mount_removed(&self, mount_path: &str) -> Result<(), WritebackError> {
        self.send(Request::MountPointRemoved {
            mount_path: mount_path.to_string(),
        })
    }
}

/// The writeback controller process host
pub struct Controller {
    handle: WritebackHandle,
    thread: Option<thread::JoinHandle<()>>,
}

type InitSlot = Arc<(Mutex<Option<Result<(), WritebackError>>>, Condvar)>;

fn notify_init(init: &InitSlot, result: Result<(), WritebackError>) {
    let (lock, ready) = &**init;
    *lock.lock().unwrap() = Some(result);
    ready.notify_one();
}

impl Controller {
    /// Start the controller: claim the transport name, open the storage
    /// connection and spin up the event loop on its own thread. Blocks
    /// until initialization succeeded or failed.
    pub fn start(options: ControllerOptions) -> Result<Controller, WritebackError> {
        let (tx, rx) = mpsc::channel(64);
        let init: InitSlot = Arc::new((Mutex::new(None), Condvar::new()));
        let init_thread = Arc::clone(&init);

        let thread = thread::Builder::new()
            .name("tracker-writeback".to_string())
            .spawn(move || {
                let name = options.service_name.clone();
                {
                    let mut owned = OWNED_NAMES.lock().unwrap();
                    if !owned.insert(name.clone()) {
                        notify_init(
                            &init_thread,
                            Err(WritebackError::Init(format!(
                                "Could not acquire name '{name}', perhaps it's already taken?"
                            ))),
                        );
                        return;
                    }
                }
                let _name_guard = NameGuard(name);

                let store = match MetadataStore::new() {
                    Ok(store) => store,
                    Err(e) => {
                        notify_init(&init_thread, Err(WritebackError::Init(e.to_string())));
                        return;
                    }
                };

                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        notify_init(&init_thread, Err(WritebackError::Init(e.to_string())));
                        return;
                    }
                };

                tracing::info!("Registered writeback service '{}'", options.service_name);
                notify_init(&init_thread, Ok(()));

                runtime.block_on(run(rx, store, options));

                // The storage connection closes and the transport name is
                // released when this frame unwinds
                tracing::info!("Writeback controller shut down");
            })
            .map_err(|e| WritebackError::Init(e.to_string()))?;

        let (lock, ready) = &*init;
        let mut slot = lock.lock().unwrap();
        while slot.is_none() {
            slot = ready.wait(slot).unwrap();
        }
        let result = slot.take().unwrap();
        drop(slot);

        match result {
            Ok(()) => Ok(Controller {
                handle: WritebackHandle { tx },
                thread: Some(thread),
            }),
            Err(e) => {
                let _ = thread.join();
                Err(e)
            }
        }
    }

    pub fn handle(&self) -> WritebackHandle {
        self.handle.clone()
    }

    /// Ask the loop to quit and wait for it
    pub fn stop(mut self) {
        let _ = self.handle.send(Request::Shutdown);
        self.join();
    }

    /// Wait until the loop quits on its own (idle timeout)
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.handle.send(Request::Shutdown);
            self.join();
        }
    }
}

struct Task {
    id: u64,
    request_id: u64,
    subject: String,
    urls: Vec<String>,
    rows: Arc<WritebackRows>,
    cancellation: Cancellation,
    module_name: &'static str,
    create: Arc<dyn Fn() -> Box<dyn Writeback> + Send + Sync>,
    started: bool,
}

struct PendingRequest {
    remaining: usize,
    completions: Vec<TaskCompletion>,
    reply: oneshot::Sender<Vec<TaskCompletion>>,
}

struct RunState {
    tasks: Vec<Task>,
    requests: HashMap<u64, PendingRequest>,
    running: usize,
    max_workers: usize,
    next_task_id: u64,
    next_request_id: u64,
}

async fn idle_timer(timeout: u64, deadline: Instant) {
    if timeout == 0 {
        std::future::pending::<()>().await
    } else {
        tokio::time::sleep_until(deadline).await
    }
}

async fn run(mut rx: mpsc::Receiver<Request>, store: MetadataStore, options: ControllerOptions) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(u64, u64, TaskCompletion)>();
    let mut state = RunState {
        tasks: Vec::new(),
        requests: HashMap::new(),
        running: 0,
        max_workers: options.max_workers.max(1),
        next_task_id: 1,
        next_request_id: 1,
    };

    let timeout = options.shutdown_timeout;
    let mut deadline = Instant::now() + Duration::from_secs(timeout.max(1));
    let mut rx_open = true;

    loop {
        tokio::select! {
            request = rx.recv(), if rx_open => {
                match request {
                    Some(request) => {
                        // Every incoming request restarts the idle countdown
                        deadline = Instant::now() + Duration::from_secs(timeout.max(1));
                        match request {
                            Request::GetPid { reply } => {
                                let _ = reply.send(std::process::id());
                            }
                            Request::PerformWriteback { subject, rdf_types, results, reply } => {
                                dispatch(&mut state, &options.modules, subject, rdf_types, results, reply);
                                spawn_ready(&mut state, &store, &done_tx);
                            }
                            Request::CancelTasks { subjects } => {
                                for task in &state.tasks {
                                    if subjects.iter().any(|subject| subject == &task.subject) {
                                        tracing::info!(
                                            "Cancelling not yet processed task ('{}')",
                                            task.subject
                                        );
                                        task.cancellation.cancel();
                                    }
                                }
                            }
                            Request::MountPointRemoved { mount_path } => {
                                let mount_url = mount_url_prefix(&mount_path);
                                for task in &state.tasks {
                                    for url in &task.urls {
                                        if url_under_mount(url, &mount_url) {
                                            tracing::info!("Cancelling task ('{url}')");
                                            task.cancellation.cancel();
                                        }
                                    }
                                }
                            }
                            Request::Shutdown => break,
                        }
                    }
                    None => {
                        rx_open = false;
                        if state.tasks.is_empty() && state.requests.is_empty() {
                            break;
                        }
                    }
                }
            }
            Some((request_id, task_id, completion)) = done_rx.recv() => {
                state.tasks.retain(|task| task.id != task_id);
                state.running -= 1;

                if let Some(request) = state.requests.get_mut(&request_id) {
                    request.completions.push(completion);
                    request.remaining -= 1;
                    if request.remaining == 0 {
                        let request = state.requests.remove(&request_id).unwrap();
                        let _ = request.reply.send(request.completions);
                    }
                }

                spawn_ready(&mut state, &store, &done_tx);

                if !rx_open && state.tasks.is_empty() && state.requests.is_empty() {
                    break;
                }
            }
            _ = idle_timer(timeout, deadline) => {
                if state.tasks.is_empty() {
                    tracing::info!("Shutting down due to no activity");
                    break;
                }
                deadline = Instant::now() + Duration::from_secs(timeout.max(1));
            }
        }
    }
}

fn dispatch(
    state: &mut RunState,
    modules: &[WritebackModuleDesc],
    subject: String,
    rdf_types: Vec<String>,
    results: WritebackRows,
    reply: oneshot::Sender<Vec<TaskCompletion>>,
) {
    let rows = Arc::new(results);
    let urls: Vec<String> = rows.iter().filter_map(|row| row.first().cloned()).collect();
    let request_id = state.next_request_id;
    state.next_request_id += 1;

    let mut spawned = 0;
    for module in modules {
        if !rdf_types_match(module.rdf_types, &rdf_types) {
            continue;
        }

        // File modules advertise the content types they can rewrite; skip
        // them early when the target clearly is something else
        if !module.content_types.is_empty() {
            if let Some(url) = urls.first() {
                if let Some(mime) = guess_content_type(url) {
                    if !module.content_types.contains(&mime) {
                        tracing::debug!(
                            "module '{}' does not handle {mime}, skipping {url}",
                            module.name
                        );
                        continue;
                    }
                }
            }
        }

        tracing::info!(
            "Updating metadata for subject:'{}' using module:'{}'",
            subject,
            module.name
        );

        let id = state.next_task_id;
        state.next_task_id += 1;
        state.tasks.push(Task {
            id,
            request_id,
            subject: subject.clone(),
            urls: urls.clone(),
            rows: Arc::clone(&rows),
            cancellation: Cancellation::new(),
            module_name: module.name,
            create: Arc::clone(&module.create),
            started: false,
        });
        spawned += 1;
    }

    if spawned == 0 {
        // Nothing matched; acknowledge right away
        let _ = reply.send(Vec::new());
    } else {
        state.requests.insert(
            request_id,
            PendingRequest {
                remaining: spawned,
                completions: Vec::new(),
                reply,
            },
        );
    }
}

fn spawn_ready(
    state: &mut RunState,
    store: &MetadataStore,
    done_tx: &mpsc::UnboundedSender<(u64, u64, TaskCompletion)>,
) {
    while state.running < state.max_workers {
        let Some(task) = state.tasks.iter_mut().find(|task| !task.started) else {
            break;
        };
        task.started = true;
        state.running += 1;

        let id = task.id;
        let request_id = task.request_id;
        let subject = task.subject.clone();
        let module_name = task.module_name;
        let create = Arc::clone(&task.create);
        let rows = Arc::clone(&task.rows);
        let cancellation = task.cancellation.clone();
        let store = store.clone();
        let done_tx = done_tx.clone();

        tokio::task::spawn_blocking(move || {
            // A task cancelled while still queued never reaches its module
            let (success, cancelled) = if cancellation.is_cancelled() {
                (false, true)
            } else {
                let mut writeback = create();
                let success = writeback.update_metadata(&rows, &store, &cancellation);
                if !success && !cancellation.is_cancelled() {
                    tracing::warn!(
                        "{}",
                        WritebackError::Module {
                            module: module_name.to_string(),
                            message: "update_metadata failed".to_string(),
                        }
                    );
                }
                (success, cancellation.is_cancelled())
            };

            let completion = TaskCompletion {
                module: module_name.to_string(),
                subject,
                success,
                cancelled,
            };
            let _ = done_tx.send((request_id, id, completion));
        });
    }
}

fn mount_url_prefix(mount_path: &str) -> String {
    format!("file://{}", mount_path.trim_end_matches('/'))
}

fn url_under_mount(url: &str, mount_url: &str) -> bool {
    url == mount_url || url.starts_with(&format!("{mount_url}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_under_mount() {
        let mount = mount_url_prefix("/media/usb/");
        assert!(url_under_mount("file:///media/usb/a.jpg", &mount));
        assert!(url_under_mount("file:///media/usb", &mount));
        assert!(!url_under_mount("file:///media/usbdrive/a.jpg", &mount));
        assert!(!url_under_mount("file:///home/user/a.jpg", &mount));
    }

    #[test]
    fn test_start_and_stop() {
        let options = ControllerOptions {
            service_name: "org.freedesktop.Tracker1.Writeback.TestStartStop".to_string(),
            shutdown_timeout: 0,
            ..ControllerOptions::default()
        };

        let controller = Controller::start(options).unwrap();
        let pid = controller.handle().get_pid().unwrap();
        assert_eq!(pid, std::process::id());
        controller.stop();
    }

    #[test]
    fn test_duplicate_service_name_fails_init() {
        let options = ControllerOptions {
            service_name: "org.freedesktop.Tracker1.Writeback.TestDuplicate".to_string(),
            shutdown_timeout: 0,
            ..ControllerOptions::default()
        };

        let first = Controller::start(options.clone()).unwrap();
        let second = Controller::start(options.clone());
        assert!(matches!(second, Err(WritebackError::Init(_))));

        first.stop();

        // Once the first owner is gone the name can be claimed again
        let third = Controller::start(options).unwrap();
        third.stop();
    }
}
