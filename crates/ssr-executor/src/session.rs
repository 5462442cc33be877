//! Per-request render session: mode dispatch and cancellation.

use std::fmt::Display;
use std::future::Future;

use futures::future::{self, AbortHandle, AbortRegistration, Abortable, Aborted, Either};
use futures::{pin_mut, Sink};
use ssr_core::{RenderConfig, RenderError, TimingContext};
use ssr_streaming::{ComponentNode, StreamingSink};

use crate::stream::{ResolutionStream, SessionReport};

/// One render of one component tree.
///
/// The session can be cancelled from outside through its abort handle,
/// whatever the mode. Cancelling drops every unsettled computation, moves
/// the sink to `Aborted` and makes the render return
/// `RenderError::Aborted`.
#[derive(Debug)]
pub struct RenderSession {
    config: RenderConfig,
    handle: AbortHandle,
    registration: AbortRegistration,
}

impl RenderSession {
    /// Create a session with the given configuration.
    pub fn new(config: RenderConfig) -> Self {
        let (handle, registration) = AbortHandle::new_pair();
        Self {
            config,
            handle,
            registration,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Handle that aborts this session when triggered.
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.clone()
    }

    /// Wait for every slot and return the substituted document.
    ///
    /// Nothing is written anywhere until this returns, regardless of the
    /// configured mode.
    pub async fn render_to_string(self, root: ComponentNode) -> Result<String, RenderError> {
        let sink = StreamingSink::new(futures::sink::drain(), TimingContext::new());
        let mut stream = ResolutionStream::new(sink, self.config);

        match Abortable::new(stream.render_substituted(root), self.registration).await {
            Ok(result) => result,
            Err(Aborted) => {
                stream.abort("session aborted");
                Err(RenderError::Aborted)
            }
        }
    }

    /// Render into `sink` according to the configured mode.
    pub async fn stream<S, E>(
        self,
        root: ComponentNode,
        sink: StreamingSink<S, E>,
    ) -> Result<SessionReport, RenderError>
    where
        S: Sink<Vec<u8>, Error = E> + Unpin,
        E: Display,
    {
        self.stream_until_closed(root, sink, future::pending::<()>()).await
    }

    /// Like [`stream`](Self::stream), but aborts as soon as `closed`
    /// resolves.
    ///
    /// `closed` signals that the reader of the sink has gone away. Without
    /// it a disconnect is only noticed at the next write, which may be
    /// arbitrarily far away when every slot is still pending.
    pub async fn stream_until_closed<S, E, C>(
        self,
        root: ComponentNode,
        sink: StreamingSink<S, E>,
        closed: C,
    ) -> Result<SessionReport, RenderError>
    where
        S: Sink<Vec<u8>, Error = E> + Unpin,
        E: Display,
        C: Future<Output = ()>,
    {
        let mode = self.config.mode;
        let mut stream = ResolutionStream::new(sink, self.config);
        tracing::debug!(%mode, "render session started");

        let outcome = {
            let run = Abortable::new(stream.run(root), self.registration);
            pin_mut!(run);
            pin_mut!(closed);
            match future::select(run, closed).await {
                Either::Left((result, _)) => Some(result),
                Either::Right(((), _)) => None,
            }
        };

        let Some(outcome) = outcome else {
            tracing::debug!(%mode, "peer disconnected, aborting render");
            stream.abort("peer disconnected");
            return Err(RenderError::Aborted);
        };

        match outcome {
            Ok(Ok(())) => {
                let report = stream.report();
                tracing::debug!(
                    %mode,
                    slots = report.slots,
                    failed = report.failed,
                    "render session complete"
                );
                Ok(report)
            }
            Ok(Err(e)) => {
                if e.is_fatal() {
                    stream.abort(&e.to_string());
                }
                Err(e)
            }
            Err(Aborted) => {
                stream.abort("session aborted");
                Err(RenderError::Aborted)
            }
        }
    }
}
