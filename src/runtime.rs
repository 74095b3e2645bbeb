use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// The bridge's private async runtime. Host threads block on it; nothing here ever runs on
/// a host scheduler.
pub(crate) struct BridgeRuntime {
    rt: Runtime,
}

impl BridgeRuntime {
    pub(crate) fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(config.thread_name.clone());
        if let Some(workers) = config.worker_threads {
            builder.worker_threads(workers.max(1));
        }
        let rt = builder
            .build()
            .map_err(|e| BridgeError::Internal(format!("failed to start bridge runtime: {e}")))?;
        Ok(Self { rt })
    }

    /// Drive `fut` to completion from a host thread. A panic anywhere inside becomes
    /// [`BridgeError::Internal`]; so does calling this from within an async task.
    pub(crate) fn block_on<T, F>(&self, fut: F) -> Result<T, BridgeError>
    where
        F: Future<Output = Result<T, BridgeError>>,
    {
        guard(|| self.rt.block_on(fut))
    }
}

/// Run a synchronous bridge operation with panics converted to errors. Used directly by
/// operations that never touch the runtime.
pub(crate) fn guard<T>(f: impl FnOnce() -> Result<T, BridgeError>) -> Result<T, BridgeError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(%message, "native call panicked");
        Err(BridgeError::Internal(format!("native call panicked: {message}")))
    })
}

/// Bound a native future by `after`.
pub(crate) async fn with_timeout<T, F>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, BridgeError>
where
    F: Future<Output = Result<T, BridgeError>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| BridgeError::Timeout { operation, after })?
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panics_become_internal_errors() {
        let result: Result<(), BridgeError> = guard(|| {
            let empty: Vec<()> = Vec::new();
            if empty.is_empty() {
                panic!("boom");
            }
            Ok(())
        });
        assert_eq!(
            result,
            Err(BridgeError::Internal("native call panicked: boom".into()))
        );
    }

    #[test]
    fn block_on_catches_panics_inside_futures() -> Result<(), BridgeError> {
        let rt = BridgeRuntime::new(&BridgeConfig::default())?;
        let result: Result<u8, BridgeError> = rt.block_on(async {
            let empty: Vec<u8> = Vec::new();
            Ok(empty[3])
        });
        assert!(matches!(result, Err(BridgeError::Internal(_))));
        assert_eq!(rt.block_on(async { Ok(7) })?, 7);
        Ok(())
    }

    #[test]
    fn timeouts_name_the_operation() -> Result<(), BridgeError> {
        let rt = BridgeRuntime::new(&BridgeConfig::default())?;
        let result: Result<(), BridgeError> = rt.block_on(with_timeout(
            "sync_until",
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        ));
        assert_eq!(
            result,
            Err(BridgeError::Timeout {
                operation: "sync_until",
                after: Duration::from_millis(10)
            })
        );
        Ok(())
    }
}
