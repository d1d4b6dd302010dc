//! Explicit state for the calendar and trend views.
//!
//! Each view owns what it last computed and replaces it wholesale when a new
//! result arrives. Fetching records is left to the caller: a view hands out a
//! [Ticket] describing what to fetch, and only accepts the result if no newer
//! request was made in the meantime.

use time::Date;

use crate::{
    heatmap::{HeatCell, HeatmapScaler, MagnitudeSource},
    transaction::{DateRange, MonthGrid, MonthRef, TransactionRecord, aggregate_by_day},
    trend::{Granularity, TrendPoint, build_trend},
};

/// Identifies one request made through a [LatestRequest].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<K> {
    key: K,
    sequence: u64,
}

impl<K> Ticket<K> {
    /// What the request is for.
    pub fn key(&self) -> &K {
        &self.key
    }
}

/// Tracks the most recent request so results of superseded requests can be
/// discarded.
#[derive(Debug, Clone)]
pub struct LatestRequest<K> {
    next_sequence: u64,
    latest: Option<Ticket<K>>,
}

impl<K> Default for LatestRequest<K> {
    fn default() -> Self {
        Self {
            next_sequence: 0,
            latest: None,
        }
    }
}

impl<K: Clone + PartialEq> LatestRequest<K> {
    /// Start a request for `key`, superseding any earlier one.
    pub fn begin(&mut self, key: K) -> Ticket<K> {
        let ticket = Ticket {
            key,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.latest = Some(ticket.clone());

        ticket
    }

    /// Whether `ticket` is for the latest request. Accepting a ticket
    /// consumes it, so each result is applied at most once.
    pub fn accept(&mut self, ticket: &Ticket<K>) -> bool {
        if self.latest.as_ref() == Some(ticket) {
            self.latest = None;
            return true;
        }

        false
    }

    /// Forget the outstanding request, if any.
    pub fn cancel(&mut self) {
        self.latest = None;
    }
}

/// The calendar view: one month of day buckets and its heatmap.
#[derive(Debug, Clone, Default)]
pub struct CalendarViewState {
    month_offset: i32,
    salary_day: Option<u8>,
    source: MagnitudeSource,
    scaler: HeatmapScaler,
    requests: LatestRequest<DateRange>,
    grid: Option<MonthGrid>,
    heatmap: Vec<HeatCell>,
}

impl CalendarViewState {
    /// Create a view showing the current month.
    pub fn new(salary_day: Option<u8>, source: MagnitudeSource) -> Self {
        Self {
            salary_day,
            source,
            ..Default::default()
        }
    }

    /// How many months the view is from the current month.
    pub fn month_offset(&self) -> i32 {
        self.month_offset
    }

    /// Move the view by `months` and drop what was shown.
    pub fn navigate(&mut self, months: i32) {
        self.month_offset = self.month_offset.saturating_add(months);
        self.invalidate();
    }

    /// Change which total drives the heatmap, rescaling what is shown.
    pub fn set_source(&mut self, source: MagnitudeSource) {
        self.source = source;
        if let Some(grid) = &self.grid {
            self.heatmap = self.scaler.scale(&grid.days, source);
        }
    }

    /// Start loading the visible month, with `today` as the current day.
    ///
    /// Returns a ticket whose key is the date range to fetch records for, or
    /// `None` if the offset leaves the supported calendar.
    pub fn request(&mut self, today: Date) -> Option<Ticket<DateRange>> {
        let month = MonthRef::from_offset(today, self.month_offset)?;

        Some(self.requests.begin(month.range()))
    }

    /// Build the month from `records` fetched for `ticket`.
    ///
    /// Returns false, leaving the view unchanged, if the ticket was superseded.
    pub fn resolve(&mut self, ticket: &Ticket<DateRange>, records: &[TransactionRecord]) -> bool {
        if !self.requests.accept(ticket) {
            tracing::debug!("Discarding stale calendar result for {:?}", ticket.key());
            return false;
        }

        let month = MonthRef::containing(ticket.key().start);
        let buckets = aggregate_by_day(records);
        let grid = MonthGrid::build(&buckets, month, self.month_offset, self.salary_day);
        self.heatmap = self.scaler.scale(&grid.days, self.source);
        self.grid = Some(grid);

        true
    }

    /// Drop the computed month and any outstanding request.
    pub fn invalidate(&mut self) {
        self.grid = None;
        self.heatmap.clear();
        self.requests.cancel();
    }

    /// The month last resolved, if it is still valid.
    pub fn grid(&self) -> Option<&MonthGrid> {
        self.grid.as_ref()
    }

    /// The heatmap for [CalendarViewState::grid].
    pub fn heatmap(&self) -> &[HeatCell] {
        &self.heatmap
    }
}

/// The trend view: a series over a chosen date range.
#[derive(Debug, Clone)]
pub struct TrendViewState {
    range: DateRange,
    granularity: Option<Granularity>,
    source: MagnitudeSource,
    requests: LatestRequest<DateRange>,
    series: Option<Vec<TrendPoint>>,
}

impl TrendViewState {
    /// Create a view over `range`. The granularity follows
    /// [Granularity::for_range] until one is set.
    pub fn new(range: DateRange, source: MagnitudeSource) -> Self {
        Self {
            range,
            granularity: None,
            source,
            requests: LatestRequest::default(),
            series: None,
        }
    }

    /// The range the view covers.
    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Show a different range and drop the current series.
    pub fn set_range(&mut self, range: DateRange) {
        self.range = range;
        self.invalidate();
    }

    /// Force daily or monthly points, or `None` to pick by range length.
    pub fn set_granularity(&mut self, granularity: Option<Granularity>) {
        self.granularity = granularity;
        self.invalidate();
    }

    /// Start loading the series. The ticket's key is the range to fetch.
    pub fn request(&mut self) -> Ticket<DateRange> {
        self.requests.begin(self.range)
    }

    /// Build the series from `records` fetched for `ticket`.
    ///
    /// Returns false, leaving the view unchanged, if the ticket was superseded.
    pub fn resolve(&mut self, ticket: &Ticket<DateRange>, records: &[TransactionRecord]) -> bool {
        if !self.requests.accept(ticket) {
            tracing::debug!("Discarding stale trend result for {:?}", ticket.key());
            return false;
        }

        let range = *ticket.key();
        let granularity = self
            .granularity
            .unwrap_or_else(|| Granularity::for_range(range));
        let buckets = aggregate_by_day(records);
        self.series = Some(build_trend(&buckets, range, granularity, self.source));

        true
    }

    /// Drop the computed series and any outstanding request.
    pub fn invalidate(&mut self) {
        self.series = None;
        self.requests.cancel();
    }

    /// The series last resolved, if it is still valid.
    pub fn series(&self) -> Option<&[TrendPoint]> {
        self.series.as_deref()
    }
}

/// Every view whose contents depend on stored transactions.
#[derive(Debug, Clone)]
pub struct ViewStates {
    /// The calendar view.
    pub calendar: CalendarViewState,
    /// The trend view.
    pub trend: TrendViewState,
}

impl ViewStates {
    /// Drop everything the views computed, e.g. after an import completes.
    pub fn invalidate_all(&mut self) {
        tracing::debug!("Invalidating calendar and trend views");
        self.calendar.invalidate();
        self.trend.invalidate();
    }
}
