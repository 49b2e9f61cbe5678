// The per-run context handed to every component.
//
// CANCELLATION
//
// Cancellation is a zero-capacity channel that nobody ever sends on.  The Canceller owns the only
// sender; cancel() (or just dropping the Canceller) disconnects the channel, and every receiver
// then sees the disconnect.  That makes it a broadcast that fires exactly once and that can sit in
// a crossbeam select! next to the data channels.
//
// ERRORS
//
// Errors from any thread are posted on an unbounded channel so that reporting never blocks.  The
// receiving end is returned to whoever created the context; if it has been dropped, errors are
// logged instead.
//
// LOGGING
//
// The context carries the name of the component it was handed to, and components log with that
// name as the log target, so `RUST_LOG=output_json=debug` selects one component.

use crate::error::Error;
use crate::registry::Registry;

use std::sync::Arc;

use crossbeam::channel;

#[derive(Clone)]
pub struct Context {
    done: channel::Receiver<()>,
    errors: channel::Sender<Error>,
    registry: Arc<Registry>,
    component: &'static str,
}

pub struct Canceller {
    // Never sent on; dropping it is the signal.
    _done: channel::Sender<()>,
}

impl Canceller {
    pub fn cancel(self) {}
}

impl Context {
    // Returns the context, the handle that cancels it, and the receiving end of the error channel.
    pub fn new(registry: Registry) -> (Context, Canceller, channel::Receiver<Error>) {
        let (done_sender, done) = channel::bounded(0);
        let (errors, error_receiver) = channel::unbounded();
        (
            Context {
                done,
                errors,
                registry: Arc::new(registry),
                component: "session",
            },
            Canceller { _done: done_sender },
            error_receiver,
        )
    }

    pub fn with_component(&self, component: &'static str) -> Context {
        Context {
            component,
            ..self.clone()
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    // Becomes ready (with a disconnect error) once the run is canceled.  Use in select!.
    pub fn done(&self) -> &channel::Receiver<()> {
        &self.done
    }

    pub fn is_canceled(&self) -> bool {
        matches!(
            self.done.try_recv(),
            Err(channel::TryRecvError::Disconnected)
        )
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn report(&self, e: Error) {
        if let Err(channel::SendError(e)) = self.errors.send(e) {
            log::error!(target: self.component, "{e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_cancel_reaches_every_clone() {
        let (ctx, canceller, _errors) = Context::new(Registry::new());
        let waiters = (0..4)
            .map(|_| {
                let ctx = ctx.with_component("waiter");
                thread::spawn(move || {
                    let _ = ctx.done().recv();
                    ctx.is_canceled()
                })
            })
            .collect::<Vec<_>>();
        assert!(!ctx.is_canceled());
        canceller.cancel();
        for w in waiters {
            assert!(w.join().unwrap());
        }
        assert!(ctx.is_canceled());
    }

    #[test]
    fn test_dropped_canceller_cancels() {
        let (ctx, canceller, _errors) = Context::new(Registry::new());
        drop(canceller);
        assert_eq!(
            ctx.done().recv_timeout(Duration::from_secs(1)),
            Err(channel::RecvTimeoutError::Disconnected)
        );
        assert!(ctx.is_canceled());
    }

    #[test]
    fn test_report() {
        let (ctx, _canceller, errors) = Context::new(Registry::new());
        ctx.report(Error::Copy(std::io::Error::other("boom")));
        assert!(matches!(errors.try_recv(), Ok(Error::Copy(_))));

        // Nobody listening: must not panic or block.
        drop(errors);
        ctx.report(Error::Copy(std::io::Error::other("boom")));
    }

    #[test]
    fn test_component() {
        let (ctx, _canceller, _errors) = Context::new(Registry::new());
        assert_eq!(ctx.component(), "session");
        assert_eq!(ctx.with_component("pipe").component(), "pipe");
    }
}
