use std::{
    fmt::Debug,
    future::Future,
    sync::{Arc, OnceLock},
};

use eframe::egui;
use futures::{Stream, StreamExt};
use tokio::{runtime::Handle, sync::mpsc::UnboundedSender};
use tokio_util::sync::{CancellationToken, DropGuard};

type Dispatch<A> = Arc<dyn Fn(A) + Send + Sync>;

/// Runs background work on the tokio runtime and posts the resulting actions
/// back to the UI thread.
///
/// Scoped workers share the runtime, the cancellation token, and the egui
/// context of the worker they were created from. All outstanding work is
/// cancelled once every worker sharing the token has been dropped.
pub(crate) struct StateWorker<A> {
    rt: Handle,
    dispatch: Dispatch<A>,
    token: CancellationToken,
    egui_ctx: Arc<OnceLock<egui::Context>>,
    _guard: Arc<DropGuard>,
}

impl<A> Clone for StateWorker<A> {
    fn clone(&self) -> Self {
        Self {
            rt: self.rt.clone(),
            dispatch: self.dispatch.clone(),
            token: self.token.clone(),
            egui_ctx: self.egui_ctx.clone(),
            _guard: self._guard.clone(),
        }
    }
}

impl<A> StateWorker<A>
where
    A: Debug + Send + 'static,
{
    pub(crate) fn new(rt: Handle, tx: UnboundedSender<A>, token: CancellationToken) -> Self {
        let dispatch: Dispatch<A> = Arc::new(move |action| {
            if let Err(err) = tx.send(action) {
                tracing::warn!("could not dispatch action: {err}");
            }
        });

        Self {
            rt,
            dispatch,
            _guard: Arc::new(token.clone().drop_guard()),
            token,
            egui_ctx: Default::default(),
        }
    }

    /// Set the context used to wake the UI when an action arrives. Only the
    /// first call has any effect.
    pub(crate) fn set_egui_ctx(&mut self, ctx: egui::Context) {
        if self.egui_ctx.set(ctx).is_err() {
            tracing::warn!("egui context was already set");
        }
    }

    /// A worker for a component whose actions are wrapped into ours.
    pub(crate) fn scoped<B>(&self, wrap: fn(B) -> A) -> StateWorker<B>
    where
        B: Debug + Send + 'static,
    {
        let dispatch = self.dispatch.clone();

        StateWorker {
            rt: self.rt.clone(),
            dispatch: Arc::new(move |action| dispatch(wrap(action))),
            token: self.token.clone(),
            egui_ctx: self.egui_ctx.clone(),
            _guard: self._guard.clone(),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn send(&self, action: A) {
        (self.dispatch)(action);

        if let Some(ctx) = self.egui_ctx.get() {
            ctx.request_repaint();
        }
    }

    /// Resolve a future to a stream and send every action it yields.
    pub(crate) fn stream<F, S>(&self, fut: F)
    where
        F: Future<Output = S> + Send + 'static,
        S: Stream<Item = A> + Send + 'static,
    {
        let worker = self.clone();

        self.rt.spawn(async move {
            let stream = tokio::select! {
                stream = fut => stream,
                _ = worker.token.cancelled() => return,
            };
            futures::pin_mut!(stream);

            loop {
                tokio::select! {
                    item = stream.next() => match item {
                        Some(action) => worker.send(action),
                        None => break,
                    },
                    _ = worker.token.cancelled() => {
                        tracing::debug!("worker cancelled, ending stream");
                        break;
                    }
                }
            }
        });
    }

    /// Apply an action to component state.
    pub(crate) fn apply<S, F>(&self, state: &mut S, action: A, f: F)
    where
        F: FnOnce(&mut S, A),
    {
        let span = tracing::debug_span!("apply", ?action);
        let _entered = span.enter();

        f(state, action);
    }
}
