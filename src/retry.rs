use std::{future::Future, time::Duration};

/// Retries `async_fn` until it succeeds or `max_attempts` is reached,
/// sleeping `retry_interval` between attempts. Ported from the
/// unbounded retry helper this crate's durable-queue calls are modeled
/// on, but bounded: the producer controller's durable queue is an ask
/// with a timeout, not a connection it can wait on forever.
pub async fn retry<AttemptF, ErrF, F, Fut, T, E>(
    retry_interval: Duration,
    max_attempts: u32,
    attempt_log_fn: AttemptF,
    error_log_fn: ErrF,
    mut async_fn: F,
) -> Result<T, E>
where
    AttemptF: Fn(u32),
    ErrF: Fn(u32, &E),
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        attempt_log_fn(attempt);

        match async_fn().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                error_log_fn(attempt, &err);
                if attempt >= max_attempts {
                    return Err(err);
                }
            }
        }

        tokio::time::sleep(retry_interval).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retrying_when_first_attempt_succeeds() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            Duration::from_millis(1),
            5,
            |_| {},
            |_, _: &&str| {},
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            },
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            Duration::from_millis(1),
            5,
            |_| {},
            |_, _: &&str| {},
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err("not yet")
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            Duration::from_millis(1),
            3,
            |_| {},
            |_, _: &&str| {},
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("always fails") }
            },
        )
        .await;

        assert_eq!(result, Err("always fails"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
