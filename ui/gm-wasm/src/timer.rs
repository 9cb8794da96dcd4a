use async_trait::async_trait;
use gm_chain_client::Timer;
use std::time::Duration;

/// `setTimeout`-backed sleep for the poll loops.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooTimer;

#[async_trait(?Send)]
impl Timer for GlooTimer {
    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}
