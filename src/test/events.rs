#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::timeout;

    use crate::events::{EventHub, TeamEvent};
    use crate::models::TimerStatus;
    use crate::test::test_portal::standard_builder;

    #[tokio::test]
    async fn test_progress_event_reaches_subscriber() {
        let services = standard_builder().build_services().await;
        let mut rx = services.hub.subscribe("alpha");

        services
            .service
            .approve("alpha")
            .await
            .expect("Failed to approve");

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Timed out waiting for event")
            .expect("Channel closed");

        match event {
            TeamEvent::Progress {
                team,
                current_step,
                total_challenges,
                completed,
            } => {
                assert_eq!(team, "alpha");
                assert_eq!(current_step, 2);
                assert_eq!(total_challenges, 3);
                assert!(!completed);
            }
            other => panic!("Expected a progress event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stopwatch_events_announced() {
        let services = standard_builder().build_services().await;
        let mut rx = services.hub.subscribe("alpha");

        services
            .timers
            .start("alpha")
            .await
            .expect("Failed to start stopwatch");

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Timed out waiting for event")
            .expect("Channel closed");
        match event {
            TeamEvent::Timer {
                team,
                status,
                running_since,
                ..
            } => {
                assert_eq!(team, "alpha");
                assert_eq!(status, TimerStatus::Running);
                assert!(running_since.is_some());
            }
            other => panic!("Expected a timer event, got {:?}", other),
        }

        services
            .timers
            .stop("alpha")
            .await
            .expect("Failed to stop stopwatch");

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Timed out waiting for event")
            .expect("Channel closed");
        match event {
            TeamEvent::Timer {
                status,
                running_since,
                ..
            } => {
                assert_eq!(status, TimerStatus::Stopped);
                assert!(running_since.is_none());
            }
            other => panic!("Expected a timer event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_events_are_scoped_per_team() {
        let services = standard_builder().build_services().await;
        let mut alpha_rx = services.hub.subscribe("alpha");
        let mut bravo_rx = services.hub.subscribe("bravo");

        services
            .service
            .approve("alpha")
            .await
            .expect("Failed to approve");

        timeout(Duration::from_secs(1), alpha_rx.recv())
            .await
            .expect("Timed out waiting for event")
            .expect("Channel closed");

        assert!(matches!(bravo_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_noop() {
        let hub = EventHub::new();

        hub.publish(TeamEvent::Progress {
            team: "alpha".to_string(),
            current_step: 2,
            total_challenges: 3,
            completed: false,
        });

        // The event is not buffered for later subscribers.
        let mut rx = hub.subscribe("alpha");
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_event_wire_shape() {
        let progress = TeamEvent::Progress {
            team: "alpha".to_string(),
            current_step: 2,
            total_challenges: 3,
            completed: false,
        };
        assert_eq!(
            serde_json::to_value(&progress).expect("Failed to serialize event"),
            json!({
                "type": "progress",
                "team": "alpha",
                "current_step": 2,
                "total_challenges": 3,
                "completed": false
            })
        );

        let timer = TeamEvent::Timer {
            team: "alpha".to_string(),
            status: TimerStatus::Running,
            accumulated_seconds: 40,
            running_since: None,
        };
        assert_eq!(
            serde_json::to_value(&timer).expect("Failed to serialize event"),
            json!({
                "type": "timer",
                "team": "alpha",
                "status": "running",
                "accumulated_seconds": 40,
                "running_since": null
            })
        );
    }
}
