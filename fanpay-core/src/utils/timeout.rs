use std::future::Future;
use std::time::Duration;

/// Errors that can represent an elapsed deadline.
pub trait TimeoutError {
    fn timed_out(limit: Duration) -> Self;
}

/// Run `fut` with a deadline, mapping expiry into the caller's error type.
pub async fn time_boxed<T, E, F>(limit: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: TimeoutError,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(E::timed_out(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Elapsed(Duration);

    impl TimeoutError for Elapsed {
        fn timed_out(limit: Duration) -> Self {
            Elapsed(limit)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_future_is_cut_off() {
        let result: Result<(), Elapsed> = time_boxed(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(Elapsed(Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn fast_future_passes_through() {
        let result: Result<u8, Elapsed> = time_boxed(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
