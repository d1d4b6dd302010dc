//! JSON endpoints for the month calendar with its heatmap, and for trend series.
//!
//! Both endpoints bucket records with [aggregate_by_day] and read buckets
//! through the same [MagnitudeSource], so a day's value on the calendar is
//! always the value the trend chart plots for it.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    date::parse_query_date,
    heatmap::{HeatCell, HeatmapScaler, MagnitudeSource},
    timezone,
    transaction::{
        DateRange, MonthGrid, MonthRef, TransactionQuery, aggregate_by_day, get_transactions,
    },
    trend::{Granularity, TrendPoint, build_trend},
};

/// The state needed for calendar and trend reports.
#[derive(Debug, Clone)]
pub struct ReportState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for ReportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Query string for [get_calendar_endpoint].
#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    /// Months relative to the current month, e.g. -1 for last month.
    #[serde(default)]
    pub offset: i32,
    /// The day to treat as today, as `YYYY-MM-DD`. Defaults to the current
    /// day in the server's timezone.
    pub anchor: Option<String>,
    /// The shared ledger to read from. Omit for the caller's own ledger.
    pub target_id: Option<i64>,
    /// Which daily total drives the heatmap.
    #[serde(default)]
    pub source: MagnitudeSource,
    /// The day of the month salary is paid.
    pub salary_day: Option<u8>,
}

/// A month of day buckets and the heatmap for those days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarResponse {
    /// Every day of the month.
    pub grid: MonthGrid,
    /// One cell per day of `grid`, in the same order.
    pub heatmap: Vec<HeatCell>,
}

/// Route handler for a month calendar.
///
/// # Errors
/// Returns a 400 response for a malformed anchor or an offset that leaves the
/// supported calendar, and a 500 response if the timezone is invalid or the
/// database cannot be read.
pub async fn get_calendar_endpoint(
    State(state): State<ReportState>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarResponse>, Error> {
    let today = match &query.anchor {
        Some(anchor) => parse_query_date(anchor)?,
        None => timezone::today(&state.local_timezone)?,
    };

    let month = MonthRef::from_offset(today, query.offset).ok_or_else(|| {
        Error::InvalidDate(format!("{} months from {today}", query.offset))
    })?;

    let records = {
        let connection = lock_connection(&state.db_connection)?;
        get_transactions(
            &TransactionQuery {
                target_id: query.target_id,
                range: Some(month.range()),
                direction: None,
            },
            &connection,
        )?
    };

    let buckets = aggregate_by_day(&records);
    let grid = MonthGrid::build(&buckets, month, query.offset, query.salary_day);
    let heatmap = HeatmapScaler::default().scale(&grid.days, query.source);

    Ok(Json(CalendarResponse { grid, heatmap }))
}

/// Query string for [get_trend_endpoint].
#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    /// The first day of the series, as `YYYY-MM-DD`.
    pub start: String,
    /// The last day of the series, as `YYYY-MM-DD`.
    pub end: String,
    /// One point per day or per month. Defaults to [Granularity::for_range].
    pub granularity: Option<Granularity>,
    /// Which daily total is plotted.
    #[serde(default)]
    pub source: MagnitudeSource,
    /// The shared ledger to read from. Omit for the caller's own ledger.
    pub target_id: Option<i64>,
}

/// Route handler for a trend series.
///
/// A range that ends before it starts is not an error: the series is empty.
///
/// # Errors
/// Returns a 400 response for malformed dates, and a 500 response if the
/// database cannot be read.
pub async fn get_trend_endpoint(
    State(state): State<ReportState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>, Error> {
    let start = parse_query_date(&query.start)?;
    let end = parse_query_date(&query.end)?;

    let range = match DateRange::new(start, end) {
        Ok(range) => range,
        Err(error) => {
            tracing::warn!("Returning an empty trend series: {error}");
            return Ok(Json(Vec::new()));
        }
    };

    let records = {
        let connection = lock_connection(&state.db_connection)?;
        get_transactions(
            &TransactionQuery {
                target_id: query.target_id,
                range: Some(range),
                direction: None,
            },
            &connection,
        )?
    };

    let buckets = aggregate_by_day(&records);
    let granularity = query
        .granularity
        .unwrap_or_else(|| Granularity::for_range(range));

    Ok(Json(build_trend(&buckets, range, granularity, query.source)))
}

fn lock_connection(
    db_connection: &Mutex<Connection>,
) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::Value;
    use time::macros::date;

    use crate::{
        db::initialize,
        endpoints,
        reports::{ReportState, get_calendar_endpoint, get_trend_endpoint},
        transaction::{Direction, Label, NewTransaction, insert_transactions},
        trend::TrendPoint,
    };

    fn get_test_server() -> TestServer {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");
        insert_transactions(
            &[
                NewTransaction::new(date!(2024 - 03 - 01), 50.0, Direction::Outflow)
                    .category(Label::named("Groceries")),
                NewTransaction::new(date!(2024 - 03 - 01), 20.0, Direction::Inflow),
                NewTransaction::new(date!(2024 - 03 - 15), 10.0, Direction::Outflow)
                    .category(Label::named("Groceries")),
                NewTransaction::new(date!(2024 - 04 - 02), 5.0, Direction::Outflow),
            ],
            None,
            &connection,
        )
        .expect("Could not insert transactions");
        insert_transactions(
            &[NewTransaction::new(
                date!(2024 - 03 - 01),
                999.0,
                Direction::Outflow,
            )],
            Some(9),
            &connection,
        )
        .expect("Could not insert shared transactions");

        report_server(connection)
    }

    fn report_server(connection: Connection) -> TestServer {
        let app = Router::new()
            .route(endpoints::CALENDAR_API, get(get_calendar_endpoint))
            .route(endpoints::TRENDS_API, get(get_trend_endpoint))
            .with_state(ReportState {
                db_connection: Arc::new(Mutex::new(connection)),
                local_timezone: "Etc/UTC".to_owned(),
            });

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn calendar_walks_the_whole_month() {
        let server = get_test_server();

        let body: Value = server
            .get(endpoints::CALENDAR_API)
            .add_query_param("anchor", "2024-04-20")
            .add_query_param("offset", "-1")
            .add_query_param("salary_day", "31")
            .await
            .json();

        let grid = &body["grid"];
        assert_eq!(grid["month"], "2024-03");
        assert_eq!(grid["label"], "Mar 2024");
        assert_eq!(grid["salary_day"], 31);
        let days = grid["days"].as_array().unwrap();
        assert_eq!(days.len(), 31);
        assert_eq!(days[0]["outflow_total"], 50.0);
        assert_eq!(days[0]["inflow_total"], 20.0);
        assert_eq!(days[0]["net_total"], -30.0);
        assert_eq!(days[14]["net_total"], -10.0);
        assert_eq!(days[1]["net_total"], 0.0);
    }

    #[tokio::test]
    async fn calendar_heatmap_matches_the_grid() {
        let server = get_test_server();

        let body: Value = server
            .get(endpoints::CALENDAR_API)
            .add_query_param("anchor", "2024-03-10")
            .await
            .json();

        let heatmap = body["heatmap"].as_array().unwrap();
        assert_eq!(heatmap.len(), 31);
        assert_eq!(heatmap[0]["date"], "2024-03-01");
        assert_eq!(heatmap[0]["intensity"], 1.0);
        assert_eq!(heatmap[14]["intensity"], 0.2);
        assert_eq!(heatmap[1]["intensity"], 0.0);
    }

    #[tokio::test]
    async fn calendar_reads_the_requested_ledger() {
        let server = get_test_server();

        let body: Value = server
            .get(endpoints::CALENDAR_API)
            .add_query_param("anchor", "2024-03-10")
            .add_query_param("target_id", "9")
            .await
            .json();

        assert_eq!(body["grid"]["days"][0]["outflow_total"], 999.0);
    }

    #[tokio::test]
    async fn calendar_counts_days_imported_with_padded_dates() {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");
        insert_transactions(
            &[NewTransaction {
                date: Some(" 2024-03-05".to_owned()),
                ..NewTransaction::new(date!(2024 - 03 - 05), 40.0, Direction::Outflow)
            }],
            None,
            &connection,
        )
        .expect("Could not insert transactions");
        let server = report_server(connection);

        let body: Value = server
            .get(endpoints::CALENDAR_API)
            .add_query_param("anchor", "2024-03-10")
            .await
            .json();

        assert_eq!(body["grid"]["days"][4]["date"], "2024-03-05");
        assert_eq!(body["grid"]["days"][4]["outflow_total"], 40.0);
        assert_eq!(body["heatmap"][4]["intensity"], 1.0);
    }

    #[tokio::test]
    async fn calendar_rejects_malformed_anchor() {
        let server = get_test_server();

        server
            .get(endpoints::CALENDAR_API)
            .add_query_param("anchor", "03/10/2024")
            .expect_failure()
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn trend_defaults_to_daily_for_short_ranges() {
        let server = get_test_server();

        let points: Vec<TrendPoint> = server
            .get(endpoints::TRENDS_API)
            .add_query_param("start", "2024-03-01")
            .add_query_param("end", "2024-03-03")
            .await
            .json();

        assert_eq!(
            points
                .iter()
                .map(|point| point.period_key.as_str())
                .collect::<Vec<_>>(),
            vec!["2024-03-01", "2024-03-02", "2024-03-03"]
        );
        assert_eq!(points[0].amount, 50.0);
        assert_eq!(points[2].running_average, 16.67);
    }

    #[tokio::test]
    async fn trend_defaults_to_monthly_for_long_ranges() {
        let server = get_test_server();

        let points: Vec<TrendPoint> = server
            .get(endpoints::TRENDS_API)
            .add_query_param("start", "2024-02-01")
            .add_query_param("end", "2024-04-30")
            .add_query_param("source", "net")
            .await
            .json();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].amount, 0.0);
        assert_eq!(points[1].period_label, "Mar 2024");
        assert_eq!(points[1].amount, -40.0);
        assert_eq!(points[2].amount, -5.0);
    }

    #[tokio::test]
    async fn inverted_trend_range_is_empty() {
        let server = get_test_server();

        let points: Vec<TrendPoint> = server
            .get(endpoints::TRENDS_API)
            .add_query_param("start", "2024-03-31")
            .add_query_param("end", "2024-03-01")
            .await
            .json();

        assert!(points.is_empty());
    }
}
