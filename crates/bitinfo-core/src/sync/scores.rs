use async_trait::async_trait;
use tracing::{debug, info};

use crate::api::{endpoints, ApiError, Realm, Request, Transport};
use crate::auth::session::check_authenticated;
use crate::auth::Session;
use crate::models::{ScoreCache, ScoreDelta, ScoreDetail, ScoreRecord, ScoreRow};
use crate::scrape::{parse_score_detail, parse_score_list};

/// Where per-course analytics come from. One call is one upstream request.
#[async_trait]
pub trait ScoreDetailSource: Send + Sync {
    async fn score_detail(&self, row: &ScoreRow) -> Result<ScoreDetail, ApiError>;
}

/// Merge freshly listed rows into `cache`, fetching details only for rows
/// that are new (or for all rows when `force_refresh`). Returns the records
/// added or replaced by this call.
///
/// The cache is updated row by row, so an error partway through keeps
/// everything merged before it.
pub async fn sync_scores<S: ScoreDetailSource + ?Sized>(
    source: &S,
    fresh: Vec<ScoreRow>,
    cache: &mut ScoreCache,
    force_refresh: bool,
) -> Result<ScoreDelta, ApiError> {
    let mut delta = ScoreDelta::new();
    let mut skipped = 0usize;

    for row in fresh {
        let key = row.key();
        if delta.contains_key(&key) {
            debug!(%key, "Duplicate row in listing");
            skipped += 1;
            continue;
        }
        if !force_refresh && cache.contains(&key) {
            skipped += 1;
            continue;
        }

        debug!(%key, "Fetching score detail");
        let detail = source.score_detail(&row).await?;
        let record = ScoreRecord::merge(row, detail);
        cache.insert(record.clone());
        delta.insert(key, record);
    }

    info!(
        updated = delta.len(),
        skipped,
        cached = cache.len(),
        force_refresh,
        "Score sync complete"
    );
    Ok(delta)
}

/// Detail pages served by the legacy system through the tunnel
struct TunnelScoreDetails<'a, T: Transport> {
    transport: &'a T,
    student_id: &'a str,
}

#[async_trait]
impl<'a, T: Transport> ScoreDetailSource for TunnelScoreDetails<'a, T> {
    async fn score_detail(&self, row: &ScoreRow) -> Result<ScoreDetail, ApiError> {
        let request = Request::get(endpoints::score_detail_url())
            .query("xs0101id", self.student_id)
            .query("xnxq01id", row.term.as_str())
            .query("kch", row.course_id.as_str());
        let response = check_authenticated(self.transport.send(Realm::Tunnel, request).await?)?;
        parse_score_detail(&response.body)
    }
}

impl<T: Transport> Session<T> {
    /// Scrape the score listing and merge it into the cached scores.
    pub async fn refresh_scores(&mut self, force_refresh: bool) -> Result<ScoreDelta, ApiError> {
        self.ensure_tunnel().await?;

        let listing = self
            .fetch(Realm::Tunnel, Request::get(endpoints::score_list_url()))
            .await?;
        let rows = parse_score_list(&listing.body)?;
        debug!(rows = rows.len(), "Score listing parsed");

        let source = TunnelScoreDetails {
            transport: &self.transport,
            student_id: &self.state.username,
        };
        let result = sync_scores(&source, rows, &mut self.state.scores, force_refresh).await;
        self.note_auth_error(Realm::Tunnel, result)
    }
}
