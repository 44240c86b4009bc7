use futures::stream::{self, Stream, TryStreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::cache::{CachedFetchClient, FetchRequest};
use crate::credentials::TogglSettings;
use crate::day::CalendarDay;
use crate::error::{Result, SlipError};
use crate::models::{Project, TimeEntry};

pub const NEXT_ROW_HEADER: &str = "x-next-row-number";

/// Talks to the detailed report and projects endpoints through the cache.
#[derive(Clone)]
pub struct ReportSource {
    client: CachedFetchClient,
    settings: TogglSettings,
}

impl ReportSource {
    pub fn new(client: CachedFetchClient, settings: TogglSettings) -> Self {
        ReportSource { client, settings }
    }

    fn search_url(&self) -> String {
        format!(
            "{}/workspace/{}/search/time_entries",
            self.settings.reports_url.trim_end_matches('/'),
            self.settings.workspace_id
        )
    }

    fn projects_url(&self) -> String {
        format!(
            "{}/workspaces/{}/projects",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.workspace_id
        )
    }

    fn authed(&self, request: FetchRequest) -> FetchRequest {
        request.with_basic_auth(&self.settings.api_token, "api_token")
    }

    /// Entries logged from `start` through `end`, fetched one page at a time.
    pub fn time_entries(&self, start: CalendarDay, end: CalendarDay) -> EntryPages {
        EntryPages {
            source: self.clone(),
            start,
            end,
            cursor: Cursor::First,
        }
    }

    pub async fn projects(&self) -> Result<HashMap<u64, String>> {
        let request = self.authed(FetchRequest::get(self.projects_url()));
        let response = self.client.fetch_with_cache(&request).await?;
        // An empty workspace answers with `null`
        if response.body.is_null() {
            return Ok(HashMap::new());
        }
        let projects: Vec<Project> = serde_json::from_value(response.body)
            .map_err(|e| SlipError::ResponseSchemaInvalid(format!("projects listing: {}", e)))?;

        debug!(count = projects.len(), "loaded projects");
        Ok(projects.into_iter().map(|p| (p.id, p.name)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    First,
    Row(u64),
    Done,
}

/// Lazy walk over the paginated search endpoint. Each call to
/// [`EntryPages::next_page`] issues at most one request.
pub struct EntryPages {
    source: ReportSource,
    start: CalendarDay,
    end: CalendarDay,
    cursor: Cursor,
}

impl EntryPages {
    fn request_body(&self) -> Value {
        let mut body = json!({
            "start_date": self.start.to_string(),
            "end_date": self.end.to_string(),
        });
        if let Cursor::Row(row) = self.cursor {
            body["first_row_number"] = json!(row);
        }
        body
    }

    pub async fn next_page(&mut self) -> Result<Option<Vec<TimeEntry>>> {
        if self.cursor == Cursor::Done {
            return Ok(None);
        }

        match self.fetch_page().await {
            Ok((entries, next)) => {
                self.cursor = next;
                info!(entries = entries.len(), more = next != Cursor::Done, "fetched report page");
                Ok(Some(entries))
            }
            Err(e) => {
                self.cursor = Cursor::Done;
                Err(e)
            }
        }
    }

    async fn fetch_page(&self) -> Result<(Vec<TimeEntry>, Cursor)> {
        let request = self
            .source
            .authed(FetchRequest::post(self.source.search_url(), self.request_body()));
        let response = self.source.client.fetch_with_cache(&request).await?;
        let entries = parse_entries(response.body)?;

        let next = match response.headers.get(NEXT_ROW_HEADER) {
            Some(raw) => Cursor::Row(raw.trim().parse().map_err(|_| {
                SlipError::ResponseSchemaInvalid(format!(
                    "{} header is not a row number: {}",
                    NEXT_ROW_HEADER, raw
                ))
            })?),
            None => Cursor::Done,
        };

        Ok((entries, next))
    }

    /// Flattens the pages into a stream of entries.
    pub fn into_stream(self) -> impl Stream<Item = Result<TimeEntry>> {
        stream::try_unfold(self, |mut pages| async move {
            let page = pages.next_page().await?;
            Ok::<_, SlipError>(
                page.map(|page| (stream::iter(page.into_iter().map(Ok::<_, SlipError>)), pages)),
            )
        })
        .try_flatten()
    }
}

fn parse_entries(body: Value) -> Result<Vec<TimeEntry>> {
    let entries: Vec<TimeEntry> = serde_json::from_value(body)
        .map_err(|e| SlipError::ResponseSchemaInvalid(format!("time entries: {}", e)))?;

    if let Some(empty) = entries.iter().find(|e| e.segments.is_empty()) {
        return Err(SlipError::ResponseSchemaInvalid(format!(
            "entry '{}' has no time segments",
            empty.description
        )));
    }

    Ok(entries)
}
