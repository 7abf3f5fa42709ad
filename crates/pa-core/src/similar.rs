//! # Similar Ads
//!
//! Colour tagging of ad photos and the "same animal" lookup built on it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::colors::{distance, ColorThresholds};
use crate::error::{AppError, Result};
use crate::models::{PhotoUpload, RespAd};
use crate::traits::{AdRepo, ColorRepo, DescriptionService, PhotoClassifier};

pub struct SimilarityService {
    colors: Arc<dyn ColorRepo>,
    ads: Arc<dyn AdRepo>,
    thresholds: ColorThresholds,
    max_results: usize,
}

impl SimilarityService {
    pub fn new(colors: Arc<dyn ColorRepo>, ads: Arc<dyn AdRepo>, thresholds: ColorThresholds, max_results: u32) -> Self {
        Self {
            colors,
            ads,
            thresholds,
            max_results: max_results as usize,
        }
    }

    /// Actual ads whose colour is within the thresholds of ad `id`, closest first.
    ///
    /// `NotFound` when `id` has no colour tag. The ad itself is never returned.
    pub async fn same_ads(&self, id: Uuid) -> Result<Vec<RespAd>> {
        let color = self
            .colors
            .get_color(id)
            .await?
            .ok_or_else(|| AppError::not_found("Description", id))?;

        let mut near: Vec<(u32, Uuid)> = self
            .colors
            .active_colors()
            .await?
            .into_iter()
            .filter(|(other, _)| *other != id)
            .filter_map(|(other, tag)| distance(color, tag, &self.thresholds).map(|d| (d, other)))
            .collect();
        near.sort_unstable();
        near.truncate(self.max_results);

        let order: HashMap<Uuid, usize> = near.iter().enumerate().map(|(rank, (_, ad))| (*ad, rank)).collect();
        let ids: Vec<Uuid> = near.into_iter().map(|(_, ad)| ad).collect();

        let mut ads = self.ads.get_ads(&ids).await?;
        ads.sort_by_key(|ad| order.get(&ad.info.id).copied());
        log::debug!("ad {id} ({color}): {} similar ads", ads.len());
        Ok(ads)
    }
}

/// [`DescriptionService`] that stores the classifier's colour for each ad.
pub struct ColorDescriber {
    classifier: Arc<dyn PhotoClassifier>,
    colors: Arc<dyn ColorRepo>,
}

impl ColorDescriber {
    pub fn new(classifier: Arc<dyn PhotoClassifier>, colors: Arc<dyn ColorRepo>) -> Self {
        Self { classifier, colors }
    }
}

#[async_trait]
impl DescriptionService for ColorDescriber {
    /// An unrecognised photo drops the previous tag, if any.
    async fn describe(&self, ad_id: Uuid, photo: &PhotoUpload) -> Result<()> {
        match self.classifier.classify(photo).await? {
            Some(color) => {
                self.colors.set_color(ad_id, color, Utc::now()).await?;
                log::info!("ad {ad_id} tagged with colour {color}");
            }
            None => {
                log::debug!("no colour recognised on the photo of ad {ad_id}");
                self.colors.remove_color(ad_id).await?;
            }
        }
        Ok(())
    }

    async fn forget(&self, ad_id: Uuid) -> Result<()> {
        self.colors.remove_color(ad_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::Color;
    use crate::models::{Ad, AdInfo, AdStatus};
    use crate::traits::{MockAdRepo, MockColorRepo, MockPhotoClassifier};
    use mockall::predicate::eq;

    const GINGER: Color = Color::new(200, 120, 40);

    fn stored(id: Uuid) -> RespAd {
        let now = Utc::now();
        RespAd {
            info: Ad {
                id,
                owner_id: Uuid::new_v4(),
                status: AdStatus::Actual,
                photo_url: format!("{id}.jpg"),
                title: "Ryzhik".into(),
                description: String::new(),
                animal_id: Uuid::new_v4(),
                breed_id: Uuid::new_v4(),
                price: 0,
                contacts: String::new(),
                created_at: now,
                updated_at: now,
            },
            extra_info: AdInfo {
                username: "owner".into(),
                animal_name: "cat".into(),
                breed_name: "mixed".into(),
                locality_name: None,
            },
        }
    }

    fn service(colors: MockColorRepo, ads: MockAdRepo, max_results: u32) -> SimilarityService {
        SimilarityService::new(Arc::new(colors), Arc::new(ads), ColorThresholds::default(), max_results)
    }

    /// Serves `get_ads` in reverse so ordering has to come from the service.
    fn ads_in_reverse() -> MockAdRepo {
        let mut ads = MockAdRepo::new();
        ads.expect_get_ads()
            .returning(|ids| Ok(ids.iter().rev().map(|id| stored(*id)).collect()));
        ads
    }

    #[tokio::test]
    async fn test_same_ads_excludes_the_ad_itself() {
        let me = Uuid::new_v4();
        let twin = Uuid::new_v4();
        let mut colors = MockColorRepo::new();
        colors.expect_get_color().with(eq(me)).returning(|_| Ok(Some(GINGER)));
        colors
            .expect_active_colors()
            .returning(move || Ok(vec![(me, GINGER), (twin, GINGER)]));

        let found = service(colors, ads_in_reverse(), 100).same_ads(me).await.unwrap();
        let ids: Vec<Uuid> = found.iter().map(|ad| ad.info.id).collect();
        assert_eq!(ids, vec![twin]);
    }

    #[tokio::test]
    async fn test_same_ads_orders_by_distance_and_drops_far_colours() {
        let me = Uuid::new_v4();
        let (close, closer, far_channel, far_sum) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut colors = MockColorRepo::new();
        colors.expect_get_color().returning(|_| Ok(Some(GINGER)));
        colors.expect_active_colors().returning(move || {
            Ok(vec![
                (close, Color::new(230, 120, 40)),
                (far_channel, Color::new(200, 161, 40)),
                (closer, Color::new(205, 120, 40)),
                (far_sum, Color::new(230, 150, 71)),
            ])
        });

        let found = service(colors, ads_in_reverse(), 100).same_ads(me).await.unwrap();
        let ids: Vec<Uuid> = found.iter().map(|ad| ad.info.id).collect();
        assert_eq!(ids, vec![closer, close]);
    }

    #[tokio::test]
    async fn test_same_ads_caps_results() {
        let me = Uuid::new_v4();
        let nearest = Uuid::new_v4();
        let mut colors = MockColorRepo::new();
        colors.expect_get_color().returning(|_| Ok(Some(GINGER)));
        colors.expect_active_colors().returning(move || {
            Ok(vec![(Uuid::new_v4(), Color::new(210, 120, 40)), (nearest, GINGER), (Uuid::new_v4(), Color::new(220, 120, 40))])
        });
        let mut ads = MockAdRepo::new();
        ads.expect_get_ads()
            .withf(move |ids| ids == [nearest])
            .times(1)
            .returning(|ids| Ok(ids.iter().map(|id| stored(*id)).collect()));

        let found = service(colors, ads, 1).same_ads(me).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_same_ads_without_tag_is_not_found() {
        let mut colors = MockColorRepo::new();
        colors.expect_get_color().returning(|_| Ok(None));
        colors.expect_active_colors().never();
        let mut ads = MockAdRepo::new();
        ads.expect_get_ads().never();

        let err = service(colors, ads, 100).same_ads(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_describe_stores_recognised_colour() {
        let id = Uuid::new_v4();
        let mut classifier = MockPhotoClassifier::new();
        classifier.expect_classify().returning(|_| Ok(Some(GINGER)));
        let mut colors = MockColorRepo::new();
        colors
            .expect_set_color()
            .withf(move |ad, color, _| *ad == id && *color == GINGER)
            .times(1)
            .returning(|_, _, _| Ok(()));
        colors.expect_remove_color().never();

        let describer = ColorDescriber::new(Arc::new(classifier), Arc::new(colors));
        let photo = PhotoUpload { data: vec![0], extension: ".jpg".into() };
        describer.describe(id, &photo).await.unwrap();
    }

    #[tokio::test]
    async fn test_describe_unrecognised_photo_drops_stale_tag() {
        let id = Uuid::new_v4();
        let mut classifier = MockPhotoClassifier::new();
        classifier.expect_classify().returning(|_| Ok(None));
        let mut colors = MockColorRepo::new();
        colors.expect_set_color().never();
        colors.expect_remove_color().with(eq(id)).times(1).returning(|_| Ok(()));

        let describer = ColorDescriber::new(Arc::new(classifier), Arc::new(colors));
        let photo = PhotoUpload { data: vec![0], extension: ".jpg".into() };
        describer.describe(id, &photo).await.unwrap();
    }

    #[tokio::test]
    async fn test_forget_removes_tag() {
        let id = Uuid::new_v4();
        let mut colors = MockColorRepo::new();
        colors.expect_remove_color().with(eq(id)).times(1).returning(|_| Ok(()));

        let describer = ColorDescriber::new(Arc::new(MockPhotoClassifier::new()), Arc::new(colors));
        describer.forget(id).await.unwrap();
    }
}
