use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::{self, ArcWake, Context, Poll};
use futures_channel::oneshot;
use intmap::IntMap;
use queues::{IsQueue, Queue};
use std::{cell::RefCell, future::Future, pin::Pin, sync::Arc};

// Every simulation runs on a single thread; each thread owns its executor so
// independent simulations (e.g. parallel unit tests) never share tasks.
thread_local! {
    static EXECUTOR: RefCell<Executor> = RefCell::new(Executor::new());
}

struct Executor {
    tasks: IntMap<TaskSlot>,
    ready: Queue<u64>,
    next_id: u64,
}

impl Executor {
    fn new() -> Self {
        Self {
            tasks: IntMap::new(),
            ready: Queue::new(),
            next_id: 0,
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum TaskState {
    Pending,
    Cancelled,
}

struct TaskSlot {
    future: Option<LocalBoxFuture<'static, ()>>,
    state: TaskState,
    // already sitting in the ready queue
    scheduled: bool,
    name: String,
    waker: Arc<TaskWaker>,
}

struct TaskWaker {
    id: u64,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(arc_self.id);
    }
}

pub(crate) fn schedule_task(id: u64) {
    // try_with: wakers may outlive the thread-local during thread shutdown
    let _ = EXECUTOR.try_with(|e| {
        let mut e = e.borrow_mut();
        let queue = match e.tasks.get_mut(id) {
            Some(task) if !task.scheduled && task.state == TaskState::Pending => {
                task.scheduled = true;
                true
            }
            _ => false,
        };
        if queue {
            let _ = e.ready.add(id);
        }
    });
}

fn next_task() -> Option<u64> {
    EXECUTOR.with(|e| e.borrow_mut().ready.remove().ok())
}

/// Polls ready tasks until none is left.
#[inline]
pub fn run_once() {
    while let Some(id) = next_task() {
        process_task(id);
    }
}

#[inline]
fn process_task(id: u64) {
    // take the future out so the executor is not borrowed while polling:
    // the polled task may spawn, wake or cancel other tasks
    let slot = EXECUTOR.with(|e| {
        let mut e = e.borrow_mut();
        let cancelled = match e.tasks.get_mut(id) {
            Some(task) => {
                task.scheduled = false;
                task.state == TaskState::Cancelled
            }
            None => return None,
        };
        if cancelled {
            // do not execute if cancelled, drop it instead
            e.tasks.remove(id);
            return None;
        }
        e.tasks
            .get_mut(id)
            .and_then(|task| task.future.take().map(|fut| (fut, task.waker.clone())))
    });
    let (mut fut, waker) = match slot {
        Some(slot) => slot,
        None => return,
    };

    let waker = task::waker_ref(&waker);
    let context = &mut Context::from_waker(&*waker);
    let done = fut.as_mut().poll(context).is_ready();

    EXECUTOR.with(|e| {
        let mut e = e.borrow_mut();
        let keep = match e.tasks.get_mut(id) {
            Some(task) if !done && task.state == TaskState::Pending => {
                task.future = Some(fut);
                true
            }
            Some(_) => false,
            None => return,
        };
        if !keep {
            if let Some(task) = e.tasks.remove(id) {
                log::trace!("task '{}' finished", task.name);
            }
        }
    });
}

/// Drops every task of the current thread. Called when a test is torn down.
pub(crate) fn clear_tasks() {
    // move the tasks out before dropping them: dropping a future may drop
    // channel ends, which in turn may try to wake other tasks
    let tasks = EXECUTOR.with(|e| std::mem::replace(&mut *e.borrow_mut(), Executor::new()));
    drop(tasks);
}

#[cfg(test)]
pub(crate) fn task_count() -> usize {
    EXECUTOR.with(|e| e.borrow().tasks.len())
}

fn cancel_task(id: u64) {
    let future = EXECUTOR.with(|e| {
        e.borrow_mut().tasks.get_mut(id).and_then(|task| {
            // executor drops the task instead of polling it
            task.state = TaskState::Cancelled;
            task.future.take()
        })
    });
    drop(future);
}

pub struct Task;

impl Task {
    /// Spawns `future` as a new task, scheduled to run on the next `run_once`.
    pub fn fork<T: 'static>(future: impl Future<Output = T> + 'static) -> JoinHandle<T> {
        Task::spawn(future, "forked")
    }

    pub fn spawn<T: 'static>(
        future: impl Future<Output = T> + 'static,
        name: &str,
    ) -> JoinHandle<T> {
        let (tx, rx) = oneshot::channel::<T>();
        let wrapped = async move {
            let result = future.await;
            // the join handle may have been dropped
            let _ = tx.send(result);
        }
        .boxed_local();
        let id = EXECUTOR.with(|e| {
            let mut e = e.borrow_mut();
            let id = e.next_id;
            e.next_id += 1;
            e.tasks.insert(
                id,
                TaskSlot {
                    future: Some(wrapped),
                    state: TaskState::Pending,
                    scheduled: false,
                    name: name.to_string(),
                    waker: Arc::new(TaskWaker { id }),
                },
            );
            id
        });
        schedule_task(id);
        JoinHandle { task: id, join_rx: rx }
    }
}

pub struct JoinHandle<T> {
    task: u64,
    join_rx: oneshot::Receiver<T>,
}

impl<T> JoinHandle<T> {
    pub fn cancel(self) {
        cancel_task(self.task);
    }

    /// Result of the task if it already completed.
    pub fn try_result(&mut self) -> Option<T> {
        self.join_rx.try_recv().ok().flatten()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // a cancelled task never completes
            Poll::Ready(Err(oneshot::Canceled)) | Poll::Pending => Poll::Pending,
        }
    }
}
