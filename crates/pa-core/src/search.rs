//! # Search Orchestrator
//!
//! Entry point of ad search. Resolves the requester's location and history,
//! delegates to the [`AdRepo`], then remembers the search in the background.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{GeoPoint, RespAd, SearchFilter, SearchHistory};
use crate::ranking::RankingContext;
use crate::traits::{AdRepo, SearchHistoryRepo, UserLocator};

/// Pagination bounds for searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    pub default_limit: u32,
    pub max_limit: u32,
    pub default_offset: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            default_offset: 0,
        }
    }
}

impl SearchLimits {
    /// An unconstrained filter with this deployment's default page.
    pub fn filter(&self) -> SearchFilter {
        SearchFilter {
            limit: self.default_limit,
            offset: self.default_offset,
            ..Default::default()
        }
    }

    /// Caps a requested limit at `max_limit`.
    pub fn cap(&self, limit: u32) -> u32 {
        limit.min(self.max_limit)
    }
}

pub struct SearchOrchestrator {
    ads: Arc<dyn AdRepo>,
    history: Arc<dyn SearchHistoryRepo>,
    locator: Arc<dyn UserLocator>,
    /// Parent of every background write's token; independent of any request
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl SearchOrchestrator {
    pub fn new(
        ads: Arc<dyn AdRepo>,
        history: Arc<dyn SearchHistoryRepo>,
        locator: Arc<dyn UserLocator>,
    ) -> Self {
        Self {
            ads,
            history,
            locator,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Searches ads on behalf of `requester` (`None` for anonymous callers).
    ///
    /// Missing personalization data never fails the search: an unknown location drops
    /// the radius constraint and an unreadable history means no personalization.
    pub async fn search_ads(&self, requester: Option<Uuid>, filter: SearchFilter) -> Result<Vec<RespAd>> {
        let history = match requester {
            Some(user_id) => self.load_history(user_id).await,
            None => None,
        };

        let wants_origin =
            filter.radius.is_some() || history.as_ref().is_some_and(|h| h.radius.is_some());
        let origin = match requester {
            Some(user_id) if wants_origin => self.resolve_origin(user_id).await,
            _ => None,
        };

        let mut effective = filter.clone();
        if effective.radius.is_some() && origin.is_none() {
            log::info!("radius filter dropped: requester location is unknown");
            effective.radius = None;
        }

        let ranking = RankingContext { origin, history };
        let found = self.ads.search_ads(&effective, &ranking).await?;

        if let Some(user_id) = requester {
            if filter.is_meaningful() {
                self.remember(SearchHistory::from_filter(user_id, &filter, Utc::now()));
            }
        }

        Ok(found)
    }

    async fn load_history(&self, user_id: Uuid) -> Option<SearchHistory> {
        match self.history.get_history(user_id).await {
            Ok(history) => history,
            Err(err) => {
                log::warn!("failed to load search history of user {user_id}: {err}");
                None
            }
        }
    }

    async fn resolve_origin(&self, user_id: Uuid) -> Option<GeoPoint> {
        match self.locator.locate_user(user_id).await {
            Ok(Some(point)) => Some(point),
            Ok(None) => {
                log::info!("user {user_id} has no locality set");
                None
            }
            Err(err) => {
                log::warn!("failed to locate user {user_id}: {err}");
                None
            }
        }
    }

    /// Fire-and-forget upsert. Runs under its own token so a dropped request cannot abort it.
    fn remember(&self, record: SearchHistory) {
        let repo = Arc::clone(&self.history);
        let token = self.shutdown.child_token();

        self.tracker.spawn(async move {
            let user_id = record.user_id;
            if token.is_cancelled() {
                log::warn!("search history write for user {user_id} skipped: shutting down");
                return;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::warn!("search history write for user {user_id} cancelled");
                }
                outcome = repo.upsert_history(&record) => match outcome {
                    Ok(()) => log::debug!("search history saved for user {user_id}"),
                    Err(err) => log::error!("failed to save search history of user {user_id}: {err}"),
                },
            }
        });
    }

    /// Waits until every background history write has finished.
    pub async fn drain_background(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancels pending background writes.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::traits::{MockAdRepo, MockSearchHistoryRepo, MockUserLocator};

    const HOME: GeoPoint = GeoPoint { latitude: 55.75, longitude: 37.61 };

    fn filter() -> SearchFilter {
        SearchLimits::default().filter()
    }

    fn orchestrator(ads: MockAdRepo, history: MockSearchHistoryRepo, locator: MockUserLocator) -> SearchOrchestrator {
        SearchOrchestrator::new(Arc::new(ads), Arc::new(history), Arc::new(locator))
    }

    #[test]
    fn test_limits_cap_and_defaults() {
        let limits = SearchLimits { default_limit: 10, max_limit: 50, default_offset: 0 };
        assert_eq!(limits.cap(500), 50);
        assert_eq!(limits.cap(7), 7);
        let f = limits.filter();
        assert_eq!((f.limit, f.offset, f.all_statuses), (10, 0, false));
    }

    #[tokio::test]
    async fn test_anonymous_radius_is_dropped() {
        let mut ads = MockAdRepo::new();
        ads.expect_search_ads()
            .withf(|f, ctx| f.radius.is_none() && f.min_price == Some(100) && ctx == &RankingContext::default())
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let mut history = MockSearchHistoryRepo::new();
        history.expect_get_history().never();
        history.expect_upsert_history().never();
        let mut locator = MockUserLocator::new();
        locator.expect_locate_user().never();

        let search = orchestrator(ads, history, locator);
        let f = SearchFilter { min_price: Some(100), max_price: Some(200), radius: Some(10), ..filter() };
        assert!(search.search_ads(None, f).await.unwrap().is_empty());
        search.drain_background().await;
    }

    #[tokio::test]
    async fn test_first_search_saves_history() {
        let user = Uuid::new_v4();
        let animal = Uuid::new_v4();

        let mut ads = MockAdRepo::new();
        ads.expect_search_ads()
            .withf(|_, ctx| ctx.history.is_none() && ctx.origin.is_none())
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let mut history = MockSearchHistoryRepo::new();
        history.expect_get_history().times(1).returning(|_| Ok(None));
        history
            .expect_upsert_history()
            .withf(move |h| {
                h.user_id == user
                    && h.animal_id == Some(animal)
                    && h.breed_id.is_none()
                    && h.min_price.is_none()
                    && h.max_price.is_none()
                    && h.radius.is_none()
            })
            .times(1)
            .returning(|_| Ok(()));

        let search = orchestrator(ads, history, MockUserLocator::new());
        let f = SearchFilter { animal_id: Some(animal), owner_id: Some(Uuid::new_v4()), ..filter() };
        search.search_ads(Some(user), f).await.unwrap();
        search.drain_background().await;
    }

    #[tokio::test]
    async fn test_history_and_origin_reach_the_store() {
        let user = Uuid::new_v4();
        let stored = SearchHistory {
            user_id: user,
            animal_id: None,
            breed_id: None,
            min_price: Some(5),
            max_price: None,
            radius: Some(30),
            created_at: Utc::now(),
        };
        let expected = stored.clone();

        let mut ads = MockAdRepo::new();
        ads.expect_search_ads()
            .withf(move |f, ctx| f.radius.is_none() && ctx.origin == Some(HOME) && ctx.history.as_ref() == Some(&expected))
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let mut history = MockSearchHistoryRepo::new();
        history.expect_get_history().returning(move |_| Ok(Some(stored.clone())));
        // no meaningful filter: nothing to remember
        history.expect_upsert_history().never();
        let mut locator = MockUserLocator::new();
        locator.expect_locate_user().times(1).returning(|_| Ok(Some(HOME)));

        let search = orchestrator(ads, history, locator);
        search.search_ads(Some(user), filter()).await.unwrap();
        search.drain_background().await;
    }

    #[tokio::test]
    async fn test_history_failure_is_not_fatal() {
        let mut ads = MockAdRepo::new();
        ads.expect_search_ads()
            .withf(|_, ctx| ctx.history.is_none())
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let mut history = MockSearchHistoryRepo::new();
        history
            .expect_get_history()
            .returning(|_| Err(AppError::Internal("db gone".into())));
        history.expect_upsert_history().times(1).returning(|_| Ok(()));

        let search = orchestrator(ads, history, MockUserLocator::new());
        let f = SearchFilter { max_price: Some(10), ..filter() };
        assert!(search.search_ads(Some(Uuid::new_v4()), f).await.is_ok());
        search.drain_background().await;
    }

    #[tokio::test]
    async fn test_locator_failure_drops_radius_but_keeps_it_in_history() {
        let mut ads = MockAdRepo::new();
        ads.expect_search_ads()
            .withf(|f, ctx| f.radius.is_none() && ctx.origin.is_none())
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let mut history = MockSearchHistoryRepo::new();
        history.expect_get_history().returning(|_| Ok(None));
        history
            .expect_upsert_history()
            .withf(|h| h.radius == Some(25))
            .times(1)
            .returning(|_| Ok(()));
        let mut locator = MockUserLocator::new();
        locator
            .expect_locate_user()
            .returning(|id| Err(AppError::not_found("User", id)));

        let search = orchestrator(ads, history, locator);
        let f = SearchFilter { radius: Some(25), ..filter() };
        search.search_ads(Some(Uuid::new_v4()), f).await.unwrap();
        search.drain_background().await;
    }

    #[tokio::test]
    async fn test_unset_locality_drops_radius() {
        let mut ads = MockAdRepo::new();
        ads.expect_search_ads()
            .withf(|f, _| f.radius.is_none())
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let mut history = MockSearchHistoryRepo::new();
        history.expect_get_history().returning(|_| Ok(None));
        history.expect_upsert_history().returning(|_| Ok(()));
        let mut locator = MockUserLocator::new();
        locator.expect_locate_user().returning(|_| Ok(None));

        let search = orchestrator(ads, history, locator);
        let f = SearchFilter { radius: Some(3), ..filter() };
        search.search_ads(Some(Uuid::new_v4()), f).await.unwrap();
        search.drain_background().await;
    }

    #[tokio::test]
    async fn test_store_failure_propagates_without_history_write() {
        let mut ads = MockAdRepo::new();
        ads.expect_search_ads()
            .returning(|_, _| Err(AppError::Internal("disk".into())));
        let mut history = MockSearchHistoryRepo::new();
        history.expect_get_history().returning(|_| Ok(None));
        history.expect_upsert_history().never();

        let search = orchestrator(ads, history, MockUserLocator::new());
        let f = SearchFilter { breed_id: Some(Uuid::new_v4()), ..filter() };
        let err = search.search_ads(Some(Uuid::new_v4()), f).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        search.drain_background().await;
    }

    #[tokio::test]
    async fn test_history_write_failure_is_silent() {
        let mut ads = MockAdRepo::new();
        ads.expect_search_ads().returning(|_, _| Ok(vec![]));
        let mut history = MockSearchHistoryRepo::new();
        history.expect_get_history().returning(|_| Ok(None));
        history
            .expect_upsert_history()
            .times(1)
            .returning(|_| Err(AppError::Internal("locked".into())));

        let search = orchestrator(ads, history, MockUserLocator::new());
        let f = SearchFilter { min_price: Some(1), ..filter() };
        assert!(search.search_ads(Some(Uuid::new_v4()), f).await.is_ok());
        search.drain_background().await;
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_writes() {
        let mut ads = MockAdRepo::new();
        ads.expect_search_ads().returning(|_, _| Ok(vec![]));
        let mut history = MockSearchHistoryRepo::new();
        history.expect_get_history().returning(|_| Ok(None));
        history.expect_upsert_history().never();

        let search = orchestrator(ads, history, MockUserLocator::new());
        search.shutdown();
        let f = SearchFilter { animal_id: Some(Uuid::new_v4()), ..filter() };
        search.search_ads(Some(Uuid::new_v4()), f).await.unwrap();
        search.drain_background().await;
    }
}
