//! Panic containment for probe tasks.
//!
//! A process-wide panic hook is installed once. While a probe is being
//! polled on a thread, panics on that thread have their backtrace stashed in
//! a thread-local instead of being printed; everything else is forwarded to
//! the previously installed hook.

use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

/// Message used when a panic payload is neither `&str` nor `String`
pub const UNKNOWN_PANIC: &str = "PANIC";

static INSTALL: Once = Once::new();

thread_local! {
    static IN_PROBE: Cell<bool> = const { Cell::new(false) };
    static LAST_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// A probe panic converted into data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crash {
    /// Panic payload rendered as text
    pub message: String,
    /// Backtrace captured at the panic site
    pub trace: String,
}

fn install_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_PROBE.with(Cell::get) {
                let trace = format!("{}\n{}", info, Backtrace::force_capture());
                LAST_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as polling a probe for the guard's lifetime
struct ProbeScope {
    was: bool,
}

impl ProbeScope {
    fn enter() -> Self {
        Self {
            was: IN_PROBE.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for ProbeScope {
    fn drop(&mut self) {
        IN_PROBE.with(|flag| flag.set(self.was));
    }
}

/// Future wrapper that flags every poll as happening inside a probe
struct Scoped<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _scope = ProbeScope::enter();
        self.inner.as_mut().poll(cx)
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        UNKNOWN_PANIC.to_string()
    }
}

/// Drive `fut` to completion, turning a panic into a [`Crash`].
pub async fn contain<F>(fut: F) -> Result<F::Output, Crash>
where
    F: Future,
{
    install_hook();
    let scoped = Scoped { inner: Box::pin(fut) };
    match AssertUnwindSafe(scoped).catch_unwind().await {
        Ok(output) => Ok(output),
        Err(payload) => {
            let trace = LAST_TRACE
                .with(|slot| slot.borrow_mut().take())
                .unwrap_or_else(|| Backtrace::force_capture().to_string());
            Err(Crash {
                message: payload_message(payload.as_ref()),
                trace,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_contain_passes_output_through() {
        let result = contain(async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_contain_str_payload() {
        let crash = contain(async { panic!("OH. MY. GOD.") }).await.unwrap_err();
        assert_eq!(crash.message, "OH. MY. GOD.");
        assert!(!crash.trace.is_empty());
    }

    #[tokio::test]
    async fn test_contain_string_payload() {
        let name = "disk";
        let crash = contain(async move { panic!("{} exploded", name) })
            .await
            .unwrap_err();
        assert_eq!(crash.message, "disk exploded");
    }

    #[tokio::test]
    async fn test_contain_unknown_payload() {
        let crash = contain(async { std::panic::panic_any(42u32) })
            .await
            .unwrap_err();
        assert_eq!(crash.message, UNKNOWN_PANIC);
    }

    #[tokio::test]
    async fn test_contain_panic_after_await() {
        let crash = contain(async {
            tokio::task::yield_now().await;
            panic!("late")
        })
        .await
        .unwrap_err();
        assert_eq!(crash.message, "late");
        assert!(crash.trace.contains("late"));
    }

    #[test]
    fn test_scope_restores_flag() {
        assert!(!IN_PROBE.with(Cell::get));
        {
            let _outer = ProbeScope::enter();
            assert!(IN_PROBE.with(Cell::get));
        }
        assert!(!IN_PROBE.with(Cell::get));
    }
}
