//! One synthetic user: connect, authenticate, bootstrap, then listen and act until stopped.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, info_span, Instrument};

use crate::config::BotConfig;
use crate::dispatch::Dispatcher;
use crate::listen;
use crate::protocol::Inbound;
use crate::scheduler::Scheduler;
use crate::session::{self, Phase};
use crate::state::{ClientState, Outbox, SharedState};
use crate::transport::{Connection, Connector, FrameSink, FrameStream};
use crate::{Error, Result};

/// Invoked once, with bootstrap complete, the first time a run reaches [`Phase::Ready`].
pub type ConnectedCallback = Box<dyn FnOnce(&ClientState) + Send>;

pub struct Bot<C: Connector> {
    config: BotConfig,
    connector: C,
    dispatcher: Dispatcher,
    state: SharedState,
    phase: watch::Sender<Phase>,
    running: Arc<watch::Sender<bool>>,
    on_connected: Option<ConnectedCallback>,
    reached_ready: bool,
}

impl<C: Connector> Bot<C> {
    pub fn new(config: BotConfig, connector: C) -> Self {
        let (phase, _) = watch::channel(Phase::Disconnected);
        let (running, _) = watch::channel(true);
        Self {
            config,
            connector,
            dispatcher: Dispatcher::default(),
            state: ClientState::shared(),
            phase,
            running: Arc::new(running),
            on_connected: None,
            reached_ready: false,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn on_connected(mut self, callback: impl FnOnce(&ClientState) + Send + 'static) -> Self {
        self.on_connected = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: self.running.clone(),
        }
    }

    /// Whether the last run got as far as [`Phase::Ready`].
    pub fn reached_ready(&self) -> bool {
        self.reached_ready
    }

    /// Perform one full run on a fresh connection with an empty cache.
    /// Counters in [`Stats`](crate::Stats) carry over from earlier runs.
    ///
    /// Returns `Ok` once stopped through a [`StopHandle`]. Any failure ends
    /// the run; it is not retried here.
    pub async fn run(&mut self) -> Result<()> {
        let span = info_span!("bot", user = %self.config.username);
        self.run_once().instrument(span).await
    }

    async fn run_once(&mut self) -> Result<()> {
        self.reached_ready = false;
        if !*self.running.borrow() {
            return Ok(());
        }
        {
            let mut state = self.state.lock().await;
            let stats = std::mem::take(&mut state.stats);
            *state = ClientState {
                stats,
                ..ClientState::default()
            };
        }

        let run = Run {
            config: &self.config,
            connector: &self.connector,
            dispatcher: &self.dispatcher,
            state: &self.state,
            phase: &self.phase,
            running: &self.running,
        };
        let result = run.drive(&mut self.on_connected, &mut self.reached_ready).await;
        run.set_phase(Phase::Closed);
        result
    }
}

/// Cloneable handle that stops a running bot from anywhere.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        if self.running.send_replace(false) {
            info!("stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Resolves once [`StopHandle::stop`] has been called.
    pub async fn stopped(&self) {
        stopped(&mut self.running.subscribe()).await;
    }
}

async fn stopped(running: &mut watch::Receiver<bool>) {
    let _ = running.wait_for(|running| !*running).await;
}

/// Borrowed view of a bot for the duration of one run.
struct Run<'a, C> {
    config: &'a BotConfig,
    connector: &'a C,
    dispatcher: &'a Dispatcher,
    state: &'a SharedState,
    phase: &'a watch::Sender<Phase>,
    running: &'a watch::Sender<bool>,
}

impl<C: Connector> Run<'_, C> {
    fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            info!(%phase, "phase");
        }
    }

    async fn drive(
        &self,
        callback: &mut Option<ConnectedCallback>,
        reached_ready: &mut bool,
    ) -> Result<()> {
        let mut scheduler = Scheduler::new(&self.config.behavior)?;
        let mut running = self.running.subscribe();

        self.set_phase(Phase::Connecting);
        let connected = tokio::select! {
            connected = self.connector.connect() => Some(connected),
            _ = stopped(&mut running) => None,
        };
        let Some(connected) = connected else {
            return Ok(());
        };
        let Connection { mut sink, mut stream } = connected?;
        info!(endpoint = %self.connector.endpoint(), "connected");

        let result = self
            .converse(
                sink.as_mut(),
                stream.as_mut(),
                &mut scheduler,
                &mut running,
                callback,
                reached_ready,
            )
            .await;

        self.set_phase(Phase::Closing);
        if let Err(err) = sink.close().await {
            debug!(error = %err, "close failed");
        }
        result
    }

    async fn converse(
        &self,
        sink: &mut dyn FrameSink,
        stream: &mut dyn FrameStream,
        scheduler: &mut Scheduler,
        running: &mut watch::Receiver<bool>,
        callback: &mut Option<ConnectedCallback>,
        reached_ready: &mut bool,
    ) -> Result<()> {
        self.set_phase(Phase::Authenticating);
        let reply = tokio::select! {
            reply = session::authenticate(&mut *sink, &mut *stream, self.config) => Some(reply),
            _ = stopped(&mut *running) => None,
        };
        let Some(reply) = reply else {
            return Ok(());
        };
        let reply = reply?;

        let (outbox, queue) = Outbox::channel();
        let bootstrapped = {
            let mut state = self.state.lock().await;
            self.dispatcher
                .dispatch(&mut state, Inbound::Session(reply), &outbox)?;
            state.bootstrap.arm()
        };
        self.set_phase(Phase::Bootstrapping);
        outbox.client_user_info()?;
        outbox.client_groups()?;

        let timeout = self.config.bootstrap_timeout();
        let writer = listen::write_loop(sink, queue);
        let listener = listen::listen_loop(stream, self.dispatcher, self.state, &outbox);
        let steady = async {
            match tokio::time::timeout(timeout, bootstrapped).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Err(Error::Logic("bootstrap notifier dropped".to_string())),
                Err(_) => {
                    return Err(Error::Protocol(format!(
                        "bootstrap replies missing after {:?}",
                        timeout
                    )))
                }
            }
            self.set_phase(Phase::Ready);
            *reached_ready = true;
            if let Some(callback) = callback.take() {
                let state = self.state.lock().await;
                callback(&*state);
            }
            scheduler
                .run(self.state, &outbox, self.running.subscribe())
                .await
        };

        tokio::select! {
            result = writer => result,
            result = listener => result,
            result = steady => result,
            _ = stopped(running) => Ok(()),
        }
    }
}
