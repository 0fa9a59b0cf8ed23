//! Usage statistics endpoints.

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::error::Result;
use crate::params::Params;
use crate::service::{kind, Service};

/// Time window and granularity of a statistics request.
///
/// Month is only sent with a year, and day only with a month.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub level: Option<String>,
}

impl StatisticsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn month(mut self, month: u32) -> Self {
        self.month = Some(month);
        self
    }

    pub fn day(mut self, day: u32) -> Self {
        self.day = Some(day);
        self
    }

    /// Aggregation level, e.g. `year`, `month`, `day` or `hour`.
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Query a single calendar day.
    pub fn on(date: NaiveDate) -> Self {
        Self::new()
            .year(date.year())
            .month(date.month())
            .day(date.day())
    }

    fn sub_path(&self, name: &str, id: &str) -> String {
        let mut path = format!("/{}/{}", name, urlencoding::encode(id));
        if let Some(year) = self.year {
            path.push_str(&format!("/{}", year));
            if let Some(month) = self.month {
                path.push_str(&format!("/{}", month));
                if let Some(day) = self.day {
                    path.push_str(&format!("/{}", day));
                }
            }
        }
        path
    }

    fn params(&self) -> Option<Params> {
        self.level
            .as_ref()
            .map(|level| Params::new().set("level", level.as_str()))
    }
}

/// Statistics service at `/statistics`.
#[derive(Debug, Clone)]
pub struct Statistics {
    service: Service<kind::Statistics>,
}

macro_rules! statistic {
    ($(#[$meta:meta])* $method:ident, $name:literal) => {
        $(#[$meta])*
        pub async fn $method(&self, id: &str, query: &StatisticsQuery) -> Result<Value> {
            self.fetch($name, id, query).await
        }
    };
}

impl Statistics {
    pub(crate) fn new(service: Service<kind::Statistics>) -> Self {
        Self { service }
    }

    /// Fetch any statistic by its platform name.
    pub async fn fetch(&self, name: &str, id: &str, query: &StatisticsQuery) -> Result<Value> {
        let path = query.sub_path(name, id);
        Ok(self
            .service
            .request("GET", &path, None, query.params())
            .await?
            .body)
    }

    statistic!(
        /// Drops added to a flow.
        flow_drop_added,
        "flowDropAdded"
    );
    statistic!(flow_tracked, "flowTracked");
    statistic!(track_hit, "trackHit");
    statistic!(track_pass, "trackPass");
    statistic!(api_call_by_identity, "apiCallByIdentity");
    statistic!(drop_created_by, "dropCreatedBy");
}
