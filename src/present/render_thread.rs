/// Render thread
///
/// A single worker draining boxed commands from a crossbeam channel.
/// `flush` is the synchronous rendezvous used for teardown and resize:
/// it returns once every command enqueued before it has run.

use std::thread;

use crossbeam_channel::{bounded, unbounded, Sender};

use super::error::{render_thread_error, PresentErrorContext, PresentResult};

type Command = Box<dyn FnOnce() + Send + 'static>;

enum RenderCommand {
    Execute(Command),
    Fence(Sender<()>),
    Shutdown,
}

pub struct RenderThread {
    sender: Sender<RenderCommand>,
    worker: Option<thread::JoinHandle<()>>,
    name: String,
}

impl RenderThread {
    pub fn spawn(name: &str) -> PresentResult<Self> {
        let (sender, receiver) = unbounded::<RenderCommand>();
        let thread_name = name.to_string();

        let worker = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                log::debug!("[RenderThread] {} started", thread_name);
                while let Ok(command) = receiver.recv() {
                    match command {
                        RenderCommand::Execute(command) => command(),
                        RenderCommand::Fence(reply) => {
                            let _ = reply.send(());
                        }
                        RenderCommand::Shutdown => break,
                    }
                }
                log::debug!("[RenderThread] {} stopped", thread_name);
            })
            .render_thread_context("spawn")?;

        Ok(Self {
            sender,
            worker: Some(worker),
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `command` behind everything already enqueued.
    pub fn enqueue<F>(&self, command: F) -> PresentResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(RenderCommand::Execute(Box::new(command)))
            .map_err(|_| render_thread_error("enqueue", "render thread has stopped"))
    }

    /// Block until every previously enqueued command has executed.
    pub fn flush(&self) -> PresentResult<()> {
        let (reply, done) = bounded(1);
        self.sender
            .send(RenderCommand::Fence(reply))
            .map_err(|_| render_thread_error("flush", "render thread has stopped"))?;
        done.recv().render_thread_context("flush")
    }

    /// Stop the worker after the queued commands and wait for it.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.sender.send(RenderCommand::Shutdown);
            if worker.join().is_err() {
                log::warn!("[RenderThread] {} panicked", self.name);
            }
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
