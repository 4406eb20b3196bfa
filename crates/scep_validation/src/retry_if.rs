// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use again::RetryPolicy;
use futures::{Future, FutureExt};

use crate::error::ServiceError;

const PHI_OVER_SQRT_5: f64 = 0.72360679775;
const PHI: f64 = 1.61803398875;

/// Exponential backoff by factor φ starting from φ/√5, i.e. very nearly
/// Fibonacci, with jitter.
pub fn retry_policy_jittered_fibonacci() -> RetryPolicy {
    RetryPolicy::exponential(Duration::from_secs_f64(PHI_OVER_SQRT_5))
        .with_backoff_exponent(PHI)
        .with_jitter(true)
}

/// Add a timeout of `duration` to the given `ServiceError`-returning future.
/// If the timeout is exceeded, a retriable `ServiceError::Timeout` is returned.
pub async fn with_timeout<F, Value>(duration: Duration, future: F) -> Result<Value, ServiceError>
where
    F: Future<Output = Result<Value, ServiceError>>,
{
    let mut future = Box::pin(future).fuse();
    let mut delay = futures_timer::Delay::new(duration).fuse();
    futures::select_biased! {
        res = future => res,
        _ = delay => Err(ServiceError::Timeout { after: duration })
    }
}
