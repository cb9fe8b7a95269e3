//! An in-process fake [`Exchanger`], standing in for the `wiremock`/
//! `mockito` servers used to test the teacher crate's HTTP client bindings.
//! Since the exchanger contract here is in-process rather than over the
//! wire, a scripted fake needs no server and no port.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ExchangeFailure;
use crate::exchanger::Exchanger;
use crate::model::{Request, Response};

/// A single scripted outcome: either a canned response or a failure,
/// produced by a closure so tests can inspect the request that arrived.
pub type Script = Box<dyn Fn(&Request) -> Result<Response, ExchangeFailure> + Send + Sync>;

/// A fake [`Exchanger`] that returns pre-scripted responses in order,
/// recording every request it was asked to forward.
pub struct ScriptedExchanger {
    scripts: Mutex<Vec<Script>>,
    calls: Mutex<Vec<Request>>,
    call_count: AtomicUsize,
}

impl ScriptedExchanger {
    /// Creates an exchanger with no scripted responses. Calling
    /// [`exchange`](Exchanger::exchange) before pushing a script panics,
    /// which surfaces "you forgot to script this call" immediately in tests.
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Queues a response to return on the next call to `exchange`.
    pub fn push_response(&self, response: Response) {
        self.scripts.lock().unwrap().push(Box::new(move |_req| Ok(response.clone())));
    }

    /// Queues a closure producing the outcome for the next call, given the
    /// request that arrived — used to assert on headers the middleware
    /// under test is expected to attach or strip.
    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push(script);
    }

    /// The number of times `exchange` has been called so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The requests observed so far, in call order.
    pub fn requests(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for ScriptedExchanger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptedExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedExchanger").finish_non_exhaustive()
    }
}

#[async_trait]
impl Exchanger for ScriptedExchanger {
    async fn exchange(
        &self,
        request: Request,
        _cancel: CancellationToken,
    ) -> Result<Response, ExchangeFailure> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(request.clone());
        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                panic!("ScriptedExchanger: no script queued for call {}", self.call_count());
            }
            scripts.remove(0)
        };
        script(&request)
    }
}
