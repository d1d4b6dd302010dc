//! Application router configuration.

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    AppState, endpoints,
    import::{bulk_create_endpoint, get_job_progress_endpoint},
    logging::logging_middleware,
    reports::{get_calendar_endpoint, get_trend_endpoint},
    transaction::get_transactions_endpoint,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::TRANSACTIONS_API, get(get_transactions_endpoint))
        .route(endpoints::BULK_IMPORT, post(bulk_create_endpoint))
        .route(endpoints::IMPORT_JOB, get(get_job_progress_endpoint))
        .route(endpoints::CALENDAR_API, get(get_calendar_endpoint))
        .route(endpoints::TRENDS_API, get(get_trend_endpoint))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{
        AppState, build_router, endpoints,
        endpoints::format_endpoint,
        import::{BulkCreateResponse, ImportConfig, JobProgress, JobStatus},
    };

    fn get_test_server() -> TestServer {
        let state = AppState::new(
            Connection::open_in_memory().expect("Could not open in-memory SQLite database"),
            "Etc/UTC",
            ImportConfig {
                chunk_size: 2,
                job_retention: Duration::from_secs(60),
            },
        )
        .expect("Could not create app state");

        TestServer::try_new(build_router(state)).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn imported_transactions_show_up_in_reports() {
        let server = get_test_server();

        let response = server
            .post(endpoints::BULK_IMPORT)
            .json(&json!({
                "records": [
                    { "date": "2024-03-01", "amount": 50, "direction": "loss" },
                    { "date": "2024-03-01", "amount": 20, "direction": "gain" },
                    { "date": "2024-03-15", "amount": 10, "direction": "loss" },
                    { "date": null, "amount": 99, "direction": "loss" },
                ]
            }))
            .await;
        response.assert_status(StatusCode::ACCEPTED);
        let job_id = response.json::<BulkCreateResponse>().job_id;

        let progress_path = format_endpoint(endpoints::IMPORT_JOB, &job_id);
        let mut progress: JobProgress = server.get(&progress_path).await.json();
        while !progress.status.is_terminal() {
            tokio::task::yield_now().await;
            progress = server.get(&progress_path).await.json();
        }
        assert_eq!(progress.status, JobStatus::Completed);
        assert_eq!(progress.processed, 4);

        let calendar: Value = server
            .get(endpoints::CALENDAR_API)
            .add_query_param("anchor", "2024-03-20")
            .await
            .json();
        let days = calendar["grid"]["days"].as_array().unwrap();
        assert_eq!(days[0]["net_total"], -30.0);
        assert_eq!(days[14]["net_total"], -10.0);

        let transactions: Value = server
            .get(endpoints::TRANSACTIONS_API)
            .await
            .json();
        assert_eq!(transactions.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn errors_are_json() {
        let server = get_test_server();

        let response = server
            .get(endpoints::TRENDS_API)
            .add_query_param("start", "2024-03-01")
            .add_query_param("end", "not a date")
            .expect_failure()
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["error"].as_str().is_some_and(|error| error.contains("not a date")));
    }
}
