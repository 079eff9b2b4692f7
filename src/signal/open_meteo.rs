//! Open-Meteo historical weather provider
//!
//! Serves drought (monthly precipitation totals) and extreme heat (monthly
//! peak of the daily maximum temperature) from the reanalysis archive. Both
//! yield at most one observation per calendar month.

use super::http::{get_text, HttpConfig};
use super::{FetchError, SignalObservation, SignalProvider, SignalQuery};
use crate::policy::Peril;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Open-Meteo archive API base URL
pub const OPEN_METEO_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1";

const SOURCE: &str = "open-meteo";

/// Daily variable requested for a peril
fn daily_variable(peril: Peril) -> Option<&'static str> {
    match peril {
        Peril::Drought => Some("precipitation_sum"),
        Peril::ExtremeHeat => Some("temperature_2m_max"),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: DailySeries,
}

#[derive(Debug, Deserialize)]
struct DailySeries {
    time: Vec<NaiveDate>,
    #[serde(default)]
    precipitation_sum: Option<Vec<Option<Decimal>>>,
    #[serde(default)]
    temperature_2m_max: Option<Vec<Option<Decimal>>>,
}

/// Decode the archive body into (day, value) pairs for the requested variable
fn parse_daily(body: &str, peril: Peril) -> Result<Vec<(NaiveDate, Decimal)>, FetchError> {
    let response: ArchiveResponse =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
    let daily = response.daily;

    let values = match peril {
        Peril::Drought => daily.precipitation_sum,
        _ => daily.temperature_2m_max,
    }
    .ok_or_else(|| FetchError::InvalidResponse(format!("missing daily series for {}", peril)))?;

    if values.len() != daily.time.len() {
        return Err(FetchError::InvalidResponse(format!(
            "daily series length mismatch: {} dates, {} values",
            daily.time.len(),
            values.len()
        )));
    }

    Ok(daily
        .time
        .into_iter()
        .zip(values)
        .filter_map(|(day, value)| value.map(|v| (day, v)))
        .collect())
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

fn start_of_day(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt))
}

/// Sum daily rainfall into calendar-month totals
///
/// Months with any missing day are dropped: a partial month would read as a
/// drought.
fn monthly_totals(days: &[(NaiveDate, Decimal)]) -> Vec<SignalObservation> {
    let mut months: BTreeMap<(i32, u32), (u32, Decimal)> = BTreeMap::new();
    for (day, value) in days {
        let entry = months
            .entry((day.year(), day.month()))
            .or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += *value;
    }

    months
        .into_iter()
        .filter(|((year, month), (count, _))| *count == days_in_month(*year, *month))
        .filter_map(|((year, month), (_, total))| {
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(SignalObservation::new(
                start_of_day(first)?,
                total,
                format!("{}:{:04}-{:02}", SOURCE, year, month),
            ))
        })
        .collect()
}

/// Peak daily maximum temperature per calendar month
///
/// A heat wave inside one month is a single reading. Partial months are
/// kept since missing days can only lower the peak.
fn monthly_maxima(days: &[(NaiveDate, Decimal)]) -> Vec<SignalObservation> {
    let mut months: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();
    for (day, value) in days {
        months
            .entry((day.year(), day.month()))
            .and_modify(|peak| *peak = (*peak).max(*value))
            .or_insert(*value);
    }

    months
        .into_iter()
        .filter_map(|((year, month), peak)| {
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(SignalObservation::new(
                start_of_day(first)?,
                peak,
                format!("{}:{:04}-{:02}", SOURCE, year, month),
            ))
        })
        .collect()
}

/// Reanalysis archive provider for weather perils
pub struct OpenMeteoProvider {
    base_url: String,
    client: Client,
}

impl OpenMeteoProvider {
    pub fn new(base_url: impl Into<String>, http: &HttpConfig) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http.build_client()?,
        })
    }
}

#[async_trait]
impl SignalProvider for OpenMeteoProvider {
    async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalObservation>, FetchError> {
        let variable = daily_variable(query.peril).ok_or_else(|| FetchError::UnsupportedPeril {
            peril: query.peril,
            reason: "Open-Meteo serves drought and extreme-heat signals only".to_string(),
        })?;

        let params = [
            ("latitude", query.latitude.to_string()),
            ("longitude", query.longitude.to_string()),
            ("start_date", query.start.date_naive().to_string()),
            ("end_date", query.end.date_naive().to_string()),
            ("daily", variable.to_string()),
            ("timezone", "UTC".to_string()),
        ];
        let url = format!("{}/archive", self.base_url);
        let body = get_text(&self.client, &url, &params, query.peril).await?;
        let days = parse_daily(&body, query.peril)?;

        Ok(match query.peril {
            Peril::Drought => monthly_totals(&days),
            _ => monthly_maxima(&days),
        })
    }

    fn earliest_available(&self, _peril: Peril) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1940, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }
}
