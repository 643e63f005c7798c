#[cfg(test)]
mod tests {
    use crate::shutdown::ShutdownSignal;
    use std::time::Duration;
    use tokio::time;

    #[tokio::test(start_paused = true)]
    async fn resolves_when_deadline_elapses() {
        let shutdown = ShutdownSignal::new().unwrap().with_deadline(Duration::from_secs(30));
        let start = time::Instant::now();

        shutdown.await;

        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn stays_pending_without_deadline_or_signal() {
        let shutdown = ShutdownSignal::new().unwrap().with_optional_deadline(None);

        let result = time::timeout(Duration::from_secs(3600), shutdown).await;

        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_work_wins_over_deadline() {
        let shutdown =
            ShutdownSignal::new().unwrap().with_optional_deadline(Some(Duration::from_secs(10)));

        let outcome = tokio::select! {
            _ = time::sleep(Duration::from_secs(1)) => "completed",
            _ = shutdown => "cancelled",
        };

        assert_eq!(outcome, "completed");
    }
}
