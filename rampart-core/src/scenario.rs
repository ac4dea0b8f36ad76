use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::collector::{Collector, RequestMeta};
use crate::config::{Config, ConfigError, Pagination, ThinkTime};
use crate::response::{CategorySummary, ProductDetail, ProductSummary, decode};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Behavioral patterns a virtual user can run, mirroring how real customers
/// move through a product catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ScenarioKind {
    /// Page through the product listing.
    BrowseProducts,
    /// Search by term, sometimes filtered by status.
    SearchProducts,
    /// Open the listing, then the detail page of a random result.
    ViewProduct,
    /// Load the category tree.
    ViewCategories,
    /// Categories -> listing -> detail -> reviews, with pauses throughout.
    UserJourney,
}

/// Everything a scenario needs: target service coordinates, behavior knobs,
/// the transport seam, and the sample sink. Shared read-only across VUs.
#[derive(Debug)]
pub(crate) struct ScenarioEnv<T> {
    base: url::Url,
    pagination: Pagination,
    search_terms: Vec<String>,
    statuses: Vec<String>,
    think_time: Option<ThinkTime>,
    request_timeout: Duration,
    transport: Arc<T>,
    collector: Arc<Collector>,
}

impl<T: Transport> ScenarioEnv<T> {
    pub(crate) fn new(
        config: &Config,
        transport: Arc<T>,
        collector: Arc<Collector>,
    ) -> Result<Self, ConfigError> {
        let base = url::Url::parse(&config.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(config.base_url.clone()))?;

        Ok(Self {
            base,
            pagination: config.pagination,
            search_terms: config.search_terms.clone(),
            statuses: config.statuses.clone(),
            think_time: config.think_time,
            request_timeout: config.request_timeout,
            transport,
            collector,
        })
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> String {
        let mut url = self.base.clone();
        url.set_path(path);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        url.into()
    }

    /// Issue one GET, record its sample, and return the response. Transport
    /// failures are recorded as failed samples and yield `None`; they never
    /// propagate.
    async fn get(
        &self,
        scenario: &str,
        step: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Option<ApiResponse> {
        let req =
            ApiRequest::get(self.url(path, query)).with_timeout(self.request_timeout);

        let started = std::time::Instant::now();
        match self.transport.send(req).await {
            Ok(resp) => {
                self.collector.record_request(RequestMeta {
                    scenario,
                    step,
                    method: "GET",
                    status: Some(resp.status),
                    error: None,
                    duration: resp.duration,
                });
                Some(resp)
            }
            Err(err) => {
                self.collector.record_request(RequestMeta {
                    scenario,
                    step,
                    method: "GET",
                    status: None,
                    error: Some(err.kind()),
                    duration: started.elapsed(),
                });
                None
            }
        }
    }

    fn check(&self, scenario: &str, name: &str, ok: bool) -> bool {
        self.collector.record_check(scenario, name, ok);
        ok
    }

    async fn think(&self, rng: &mut ChaCha8Rng) {
        if let Some(t) = self.think_time
            && t.max_secs > 0
        {
            let secs = rng.random_range(t.min_secs..=t.max_secs);
            if secs > 0 {
                tokio::time::sleep(Duration::from_secs(secs)).await;
            }
        }
    }

    fn random_element<'a>(&self, items: &'a [String], rng: &mut ChaCha8Rng) -> Option<&'a str> {
        if items.is_empty() {
            return None;
        }
        let idx = rng.random_range(0..items.len());
        items.get(idx).map(String::as_str)
    }
}

/// Run one iteration of `kind`. Infallible by design: every failure mode is
/// a recorded sample, not an error.
pub(crate) async fn run_scenario<T: Transport>(
    kind: ScenarioKind,
    env: &ScenarioEnv<T>,
    rng: &mut ChaCha8Rng,
) {
    match kind {
        ScenarioKind::BrowseProducts => browse_products(env, rng).await,
        ScenarioKind::SearchProducts => search_products(env, rng).await,
        ScenarioKind::ViewProduct => view_product(env, rng).await,
        ScenarioKind::ViewCategories => view_categories(env, rng).await,
        ScenarioKind::UserJourney => user_journey(env, rng).await,
    }
}

const PRODUCTS_PATH: &str = "/api/v1/products";
const CATEGORIES_PATH: &str = "/api/v1/categories";

fn within(resp: &ApiResponse, ceiling_ms: u64) -> bool {
    resp.duration < Duration::from_millis(ceiling_ms)
}

async fn browse_products<T: Transport>(env: &ScenarioEnv<T>, rng: &mut ChaCha8Rng) {
    let scenario = "browse_products";
    let page = rng.random_range(1..=env.pagination.max_page);
    let query = [
        ("page", page.to_string()),
        ("limit", env.pagination.default_limit.to_string()),
    ];

    if let Some(resp) = env.get(scenario, "list_products", PRODUCTS_PATH, &query).await {
        env.check(scenario, "status is 200", resp.status == 200);
        let decoded = decode::<Vec<ProductSummary>>(&resp.body);
        env.check(scenario, "body has data array", decoded.is_some());
        env.check(scenario, "latency under 500ms", within(&resp, 500));
    }

    env.think(rng).await;
}

async fn search_products<T: Transport>(env: &ScenarioEnv<T>, rng: &mut ChaCha8Rng) {
    let scenario = "search_products";

    let mut query: Vec<(&str, String)> = Vec::with_capacity(2);
    if let Some(term) = env.random_element(&env.search_terms, rng) {
        query.push(("search", term.to_string()));
    }
    if rng.random_bool(0.5)
        && let Some(status) = env.random_element(&env.statuses, rng)
    {
        query.push(("status", status.to_string()));
    }

    if let Some(resp) = env.get(scenario, "search_products", PRODUCTS_PATH, &query).await {
        env.check(scenario, "status is 200", resp.status == 200);
        let valid = decode::<serde_json::Value>(&resp.body).is_some();
        env.check(scenario, "body is valid json", valid);
        env.check(scenario, "latency under 500ms", within(&resp, 500));
    }

    env.think(rng).await;
}

async fn view_product<T: Transport>(env: &ScenarioEnv<T>, rng: &mut ChaCha8Rng) {
    let scenario = "view_product";
    let query = [
        ("page", "1".to_string()),
        ("limit", env.pagination.default_limit.to_string()),
    ];

    let list = env.get(scenario, "list_products", PRODUCTS_PATH, &query).await;

    // An unreachable listing, a non-200, or an empty/undecodable page means
    // there is nothing to open; the step is skipped, not an error.
    let products = list
        .filter(|resp| resp.status == 200)
        .and_then(|resp| decode::<Vec<ProductSummary>>(&resp.body))
        .map(|envelope| envelope.data)
        .unwrap_or_default();
    if products.is_empty() {
        env.think(rng).await;
        return;
    }

    let product = &products[rng.random_range(0..products.len())];
    env.think(rng).await;

    let detail_path = format!("{PRODUCTS_PATH}/{}", product.id);
    if let Some(resp) = env.get(scenario, "product_detail", &detail_path, &[]).await {
        env.check(scenario, "status is 200", resp.status == 200);
        let detail = decode::<ProductDetail>(&resp.body);
        env.check(
            scenario,
            "body has product id",
            detail.is_some_and(|d| d.data.id == product.id),
        );
        env.check(scenario, "latency under 300ms", within(&resp, 300));
    }

    env.think(rng).await;
}

async fn view_categories<T: Transport>(env: &ScenarioEnv<T>, rng: &mut ChaCha8Rng) {
    let scenario = "view_categories";

    if let Some(resp) = env.get(scenario, "list_categories", CATEGORIES_PATH, &[]).await {
        env.check(scenario, "status is 200", resp.status == 200);
        let decoded = decode::<Vec<CategorySummary>>(&resp.body);
        env.check(scenario, "body has data array", decoded.is_some());
        env.check(scenario, "latency under 200ms", within(&resp, 200));
    }

    env.think(rng).await;
}

async fn user_journey<T: Transport>(env: &ScenarioEnv<T>, rng: &mut ChaCha8Rng) {
    let scenario = "user_journey";

    if let Some(resp) = env.get(scenario, "list_categories", CATEGORIES_PATH, &[]).await {
        env.check(scenario, "categories loaded", resp.status == 200);
    }
    env.think(rng).await;

    let query = [
        ("page", "1".to_string()),
        ("limit", env.pagination.default_limit.to_string()),
    ];
    let list = env.get(scenario, "list_products", PRODUCTS_PATH, &query).await;
    let Some(list) = list else {
        return;
    };
    env.check(scenario, "products loaded", list.status == 200);

    let products = decode::<Vec<ProductSummary>>(&list.body)
        .map(|envelope| envelope.data)
        .unwrap_or_default();
    if list.status != 200 || products.is_empty() {
        return;
    }
    env.think(rng).await;

    let product = &products[rng.random_range(0..products.len())];
    let detail_path = format!("{PRODUCTS_PATH}/{}", product.id);
    if let Some(resp) = env.get(scenario, "product_detail", &detail_path, &[]).await {
        env.check(scenario, "product detail loaded", resp.status == 200);
    }
    env.think(rng).await;

    let reviews_path = format!("{PRODUCTS_PATH}/{}/reviews", product.id);
    if let Some(resp) = env.get(scenario, "product_reviews", &reviews_path, &[]).await {
        env.check(scenario, "reviews loaded", resp.status == 200);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn scenario_names_round_trip_snake_case() {
        assert_eq!(ScenarioKind::BrowseProducts.to_string(), "browse_products");
        assert_eq!(ScenarioKind::UserJourney.to_string(), "user_journey");
        assert_eq!(
            ScenarioKind::from_str("view_categories").ok(),
            Some(ScenarioKind::ViewCategories)
        );
        assert!(ScenarioKind::from_str("nope").is_err());
    }
}
