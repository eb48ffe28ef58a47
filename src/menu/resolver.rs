// ABOUTME: Async resolver that keeps the focused application's menu tree current
// ABOUTME: Retries empty menu bars with backoff, caches per process, and drops everything on focus change

use super::extract::{Extraction, extract_menu_bar};
use super::{ElementHandle, MenuSnapshot, ProcessIdentity};
use crate::platform::MenuSource;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverPolicy {
    pub retry_interval: Duration,
    /// `None` retries until canceled by a focus change.
    pub max_attempts: Option<u32>,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(100),
            max_attempts: Some(50),
        }
    }
}

#[derive(Debug)]
enum Request {
    FocusChanged(Option<ProcessIdentity>),
    EnsureLoaded,
    Reload,
    Invoke(ElementHandle),
    Shutdown,
}

enum Delivery<E> {
    Resolved {
        process: ProcessIdentity,
        extraction: Extraction<E>,
        attempts: u32,
    },
    Exhausted {
        pass: u64,
        process: ProcessIdentity,
        attempts: u32,
    },
}

/// Cloneable entry point into a running resolver.
#[derive(Debug, Clone)]
pub struct ResolverHandle {
    tx: mpsc::UnboundedSender<Request>,
}

impl ResolverHandle {
    pub fn focus_changed(&self, process: Option<ProcessIdentity>) {
        self.send(Request::FocusChanged(process));
    }

    /// Starts a resolution for the focused process unless a tree is already
    /// cached or one is in flight.
    pub fn ensure_loaded(&self) {
        self.send(Request::EnsureLoaded);
    }

    /// Re-resolves the focused process even if a tree is cached.
    pub fn reload(&self) {
        self.send(Request::Reload);
    }

    /// Fire-and-forget press of the element behind `handle`.
    pub fn invoke(&self, handle: ElementHandle) {
        self.send(Request::Invoke(handle));
    }

    pub fn shutdown(&self) {
        self.send(Request::Shutdown);
    }

    fn send(&self, request: Request) {
        if self.tx.send(request).is_err() {
            debug!("menu resolver has stopped; request dropped");
        }
    }
}

struct CachedMenu<E> {
    extraction: Arc<Extraction<E>>,
    resolved_at: Instant,
}

pub struct MenuResolver<S: MenuSource> {
    source: Arc<S>,
    policy: ResolverPolicy,
    current: Option<ProcessIdentity>,
    cache: HashMap<ProcessIdentity, CachedMenu<S::Element>>,
    pass: u64,
    task: Option<JoinHandle<()>>,
    published: watch::Sender<MenuSnapshot>,
    requests_tx: mpsc::UnboundedSender<Request>,
    requests_rx: Option<mpsc::UnboundedReceiver<Request>>,
    deliveries_tx: mpsc::UnboundedSender<Delivery<S::Element>>,
    deliveries_rx: Option<mpsc::UnboundedReceiver<Delivery<S::Element>>>,
}

impl<S: MenuSource> MenuResolver<S> {
    pub fn new(source: Arc<S>, policy: ResolverPolicy) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();
        let (published, _) = watch::channel(MenuSnapshot::default());

        Self {
            source,
            policy,
            current: None,
            cache: HashMap::new(),
            pass: 0,
            task: None,
            published,
            requests_tx,
            requests_rx: Some(requests_rx),
            deliveries_tx,
            deliveries_rx: Some(deliveries_rx),
        }
    }

    pub fn handle(&self) -> ResolverHandle {
        ResolverHandle {
            tx: self.requests_tx.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MenuSnapshot> {
        self.published.subscribe()
    }

    /// True from the start of a pass until its delivery has been handled, so a
    /// finished pass whose tree is still queued counts as in flight.
    pub fn is_resolving(&self) -> bool {
        self.task.is_some()
    }

    pub async fn run(mut self) {
        let (Some(mut requests), Some(mut deliveries)) =
            (self.requests_rx.take(), self.deliveries_rx.take())
        else {
            return;
        };

        info!("menu resolver started");
        loop {
            tokio::select! {
                Some(request) = requests.recv() => {
                    if matches!(request, Request::Shutdown) {
                        break;
                    }
                    self.handle_request(request);
                }
                Some(delivery) = deliveries.recv() => self.handle_delivery(delivery),
                else => break,
            }
        }

        self.cancel_resolution();
        info!("menu resolver stopped");
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::FocusChanged(process) => self.focus_changed(process),
            Request::EnsureLoaded => self.ensure_loaded(),
            Request::Reload => self.reload(),
            Request::Invoke(handle) => self.invoke(handle),
            Request::Shutdown => {}
        }
    }

    pub fn focus_changed(&mut self, process: Option<ProcessIdentity>) {
        if process == self.current {
            debug!(process = ?process.as_ref().map(|p| &p.name), "focus unchanged");
            return;
        }

        info!(
            from = ?self.current.as_ref().map(|p| &p.name),
            to = ?process.as_ref().map(|p| &p.name),
            "focus changed, invalidating menu cache"
        );

        self.cancel_resolution();
        self.cache.clear();
        self.current = process;
        self.published
            .send_replace(MenuSnapshot::empty(self.current.clone()));

        if self.current.is_some() {
            self.start_resolution();
        }
    }

    pub fn ensure_loaded(&mut self) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        if let Some(cached) = self
            .cache
            .get(current)
            .filter(|cached| !cached.extraction.is_empty())
        {
            let age = cached.resolved_at.elapsed();
            debug!(process = %current.name, ?age, "menu already loaded");
            return;
        }
        if self.is_resolving() {
            debug!(process = %current.name, "menu resolution already in flight");
            return;
        }
        self.start_resolution();
    }

    pub fn reload(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.start_resolution();
    }

    pub fn invoke(&self, handle: ElementHandle) {
        let element = self
            .current
            .as_ref()
            .and_then(|current| self.cache.get(current))
            .and_then(|cached| cached.extraction.element(handle).cloned());

        let Some(element) = element else {
            debug!(?handle, "ignoring press on stale menu handle");
            return;
        };

        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || {
            if !source.press(&element) {
                debug!("menu press was refused");
            }
        });
    }

    fn cancel_resolution(&mut self) {
        self.pass += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn start_resolution(&mut self) {
        let Some(process) = self.current.clone() else {
            return;
        };

        self.cancel_resolution();
        let pass = self.pass;
        let source = Arc::clone(&self.source);
        let deliveries = self.deliveries_tx.clone();
        let policy = self.policy;

        debug!(process = %process.name, pass, "starting menu resolution");
        self.task = Some(tokio::spawn(async move {
            let mut attempts = 0u32;
            loop {
                attempts += 1;

                let (worker_source, worker_process) = (Arc::clone(&source), process.clone());
                let extraction = tokio::task::spawn_blocking(move || {
                    extract_menu_bar(&*worker_source, &worker_process, pass)
                })
                .await
                .unwrap_or_else(|err| {
                    warn!("menu extraction worker failed: {err}");
                    Extraction::empty(pass)
                });

                if !extraction.is_empty() {
                    let _ = deliveries.send(Delivery::Resolved {
                        process,
                        extraction,
                        attempts,
                    });
                    return;
                }

                if policy.max_attempts.is_some_and(|max| attempts >= max) {
                    let _ = deliveries.send(Delivery::Exhausted {
                        pass,
                        process,
                        attempts,
                    });
                    return;
                }

                debug!(process = %process.name, attempts, "menu bar empty, retrying");
                tokio::time::sleep(policy.retry_interval).await;
            }
        }));
    }

    fn handle_delivery(&mut self, delivery: Delivery<S::Element>) {
        match delivery {
            Delivery::Resolved {
                process,
                extraction,
                attempts,
            } => {
                if extraction.pass != self.pass || self.current.as_ref() != Some(&process) {
                    debug!(process = %process.name, "discarding stale menu tree");
                    return;
                }

                self.task = None;
                let cached = CachedMenu {
                    extraction: Arc::new(extraction),
                    resolved_at: Instant::now(),
                };
                let snapshot = MenuSnapshot {
                    process: Some(process.clone()),
                    items: Arc::new(cached.extraction.items.clone()),
                    resolved_at: Some(cached.resolved_at),
                };

                info!(
                    process = %process.name,
                    items = snapshot.items.len(),
                    attempts,
                    "menu tree resolved"
                );
                self.cache.insert(process, cached);
                self.published.send_replace(snapshot);
            }
            Delivery::Exhausted {
                pass,
                process,
                attempts,
            } => {
                if pass != self.pass {
                    return;
                }
                self.task = None;
                warn!(
                    process = %process.name,
                    attempts,
                    "menu bar stayed empty, giving up until the next reload"
                );
            }
        }
    }
}
