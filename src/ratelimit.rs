use governor::{
    Quota, RateLimiter as GovernorRateLimiter,
    clock::{QuantaClock, QuantaInstant},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use nonzero_ext::nonzero;
use std::{num::NonZeroU32, time::Duration};

// The proxy enforces its own limits on top of these.
const DEFAULT_REQ_PER_SEC: NonZeroU32 = nonzero!(5u32);
const DEFAULT_MS_BETWEEN_REQ: Duration = Duration::from_millis(100);

type SpecificGovernorRateLimiter =
    GovernorRateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware<QuantaInstant>>;

pub struct RateLimiter {
    req_per_sec: SpecificGovernorRateLimiter,
    ms_between_req: SpecificGovernorRateLimiter,
}

impl RateLimiter {
    pub fn new(req_per_sec: u32, ms_between_req: u64) -> Self {
        let req_per_sec = NonZeroU32::new(req_per_sec).unwrap_or(DEFAULT_REQ_PER_SEC);
        let ms_between_req = match ms_between_req {
            0 => DEFAULT_MS_BETWEEN_REQ,
            ms => Duration::from_millis(ms),
        };

        // Limit to X total req/sec on average.
        let per_second = GovernorRateLimiter::direct(Quota::per_second(req_per_sec));

        // No two requests closer than Y ms.
        let spacing = Quota::with_period(ms_between_req).unwrap_or(Quota::per_second(req_per_sec));
        let spacing = GovernorRateLimiter::direct(spacing);

        RateLimiter {
            req_per_sec: per_second,
            ms_between_req: spacing,
        }
    }

    pub async fn wait_until_ready(&self) {
        // Clear the average-rate hurdle first so waiters queue there, then
        // let the spacing limiter release them one at a time.
        self.req_per_sec.until_ready().await;
        self.ms_between_req.until_ready().await;
    }
}
