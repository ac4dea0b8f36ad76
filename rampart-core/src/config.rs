use std::time::Duration;

use crate::scenario::ScenarioKind;
use crate::thresholds::parse_threshold_expr;

/// Hard ceiling on concurrent virtual users. Profiles asking for more are
/// rejected at validation time rather than silently clamped.
pub const MAX_VUS: u64 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

/// Concurrency shape of a run: a constant VU count held for a duration, or a
/// sequence of ramp stages interpolated linearly between targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadProfile {
    Flat { vus: u64, duration: Duration },
    Staged { start: u64, stages: Vec<Stage> },
}

impl LoadProfile {
    pub fn staged(stages: impl IntoIterator<Item = (u64, u64)>) -> Self {
        Self::Staged {
            start: 0,
            stages: stages
                .into_iter()
                .map(|(secs, target)| Stage {
                    duration: Duration::from_secs(secs),
                    target,
                })
                .collect(),
        }
    }

    /// Built-in profile by name; mirrors the canonical suite shapes.
    pub fn named(name: &str) -> Option<Self> {
        let profile = match name {
            "smoke" => Self::Flat {
                vus: 1,
                duration: Duration::from_secs(10),
            },
            "light" => Self::staged([(30, 10), (60, 10), (30, 0)]),
            "medium" => Self::staged([(60, 50), (180, 50), (60, 0)]),
            "stress" => Self::staged([(60, 300), (60, 400)]),
            "spike" => Self::staged([
                (10, 10),
                (60, 10),
                (10, 200),
                (60, 200),
                (10, 10),
                (60, 10),
                (10, 0),
            ]),
            _ => return None,
        };
        Some(profile)
    }

    pub fn profile_names() -> &'static [&'static str] {
        &["smoke", "light", "medium", "stress", "spike"]
    }

    /// Peak concurrency the profile can reach.
    pub fn max_vus(&self) -> u64 {
        match self {
            Self::Flat { vus, .. } => *vus,
            Self::Staged { start, stages } => stages
                .iter()
                .map(|s| s.target)
                .max()
                .unwrap_or(0)
                .max(*start),
        }
    }

    pub fn total_duration(&self) -> Duration {
        match self {
            Self::Flat { duration, .. } => *duration,
            Self::Staged { stages, .. } => stages
                .iter()
                .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration)),
        }
    }
}

/// Randomized pause between user actions, in whole seconds, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    pub min_secs: u64,
    pub max_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub default_limit: u32,
    pub max_page: u32,
}

/// One metric with its SLO expressions, e.g. `http_req_duration` with
/// `["p(95)<500", "p(99)<1000"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSpec {
    pub metric: String,
    pub expressions: Vec<String>,
}

impl ThresholdSpec {
    pub fn new(metric: &str, expressions: &[&str]) -> Self {
        Self {
            metric: metric.to_string(),
            expressions: expressions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base url `{0}`")]
    InvalidBaseUrl(String),

    #[error("profile duration must be positive")]
    ZeroDuration,

    #[error("staged profile requires at least one stage")]
    EmptyStages,

    #[error("profile requests {requested} VUs, maximum supported is {max}")]
    TooManyVus { requested: u64, max: u64 },

    #[error("scenario weights must sum to exactly 100, got {sum}")]
    WeightSum { sum: u64 },

    #[error("scenario `{0}` appears more than once in the weight table")]
    DuplicateScenario(ScenarioKind),

    #[error("scenario weights must not be empty")]
    EmptyWeights,

    #[error("think time min ({min}s) exceeds max ({max}s)")]
    InvertedThinkTime { min: u64, max: u64 },

    #[error("pagination bounds must be positive")]
    ZeroPagination,

    #[error("request timeout must be positive")]
    ZeroTimeout,

    #[error("invalid threshold on `{metric}`: {error}")]
    Threshold { metric: String, error: String },
}

/// Full run configuration. Loaded once at start, read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub profile_name: String,
    pub profile: LoadProfile,
    /// Ordered scenario weight table; order fixes cumulative boundaries.
    pub weights: Vec<(ScenarioKind, u64)>,
    /// `None` disables pacing entirely (max-throughput runs).
    pub think_time: Option<ThinkTime>,
    pub pagination: Pagination,
    pub search_terms: Vec<String>,
    pub statuses: Vec<String>,
    pub thresholds: Vec<ThresholdSpec>,
    pub request_timeout: Duration,
    /// Seed for the scenario RNG; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Config {
    pub fn new(base_url: impl Into<String>, profile_name: impl Into<String>, profile: LoadProfile) -> Self {
        Self {
            base_url: base_url.into(),
            profile_name: profile_name.into(),
            profile,
            weights: Self::default_weights(),
            think_time: Some(ThinkTime {
                min_secs: 1,
                max_secs: 3,
            }),
            pagination: Pagination {
                default_limit: 20,
                max_page: 100,
            },
            search_terms: ["Product", "Apple", "Samsung", "Nike", "Adidas", "Sony"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            statuses: ["ACTIVE", "DRAFT", "DISCONTINUED"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            thresholds: Self::default_thresholds(),
            request_timeout: Duration::from_secs(30),
            seed: None,
        }
    }

    pub fn default_weights() -> Vec<(ScenarioKind, u64)> {
        vec![
            (ScenarioKind::BrowseProducts, 50),
            (ScenarioKind::SearchProducts, 20),
            (ScenarioKind::ViewProduct, 20),
            (ScenarioKind::ViewCategories, 10),
        ]
    }

    pub fn default_thresholds() -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new("http_req_duration", &["p(95)<500", "p(99)<1000"]),
            ThresholdSpec::new("http_req_failed", &["rate<0.01"]),
            ThresholdSpec::new("http_reqs", &["rate>100"]),
        ]
    }

    /// Reject every malformed input before any virtual user is scheduled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.base_url.clone()))?;
        if parsed.host().is_none() {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }

        match &self.profile {
            LoadProfile::Flat { duration, .. } => {
                if duration.is_zero() {
                    return Err(ConfigError::ZeroDuration);
                }
            }
            LoadProfile::Staged { stages, .. } => {
                if stages.is_empty() {
                    return Err(ConfigError::EmptyStages);
                }
                if self.profile.total_duration().is_zero() {
                    return Err(ConfigError::ZeroDuration);
                }
            }
        }

        let requested = self.profile.max_vus();
        if requested > MAX_VUS {
            return Err(ConfigError::TooManyVus {
                requested,
                max: MAX_VUS,
            });
        }

        if self.weights.is_empty() {
            return Err(ConfigError::EmptyWeights);
        }
        for (idx, (kind, _)) in self.weights.iter().enumerate() {
            if self.weights[..idx].iter().any(|(other, _)| other == kind) {
                return Err(ConfigError::DuplicateScenario(*kind));
            }
        }
        let sum: u64 = self.weights.iter().map(|(_, w)| w).sum();
        if sum != 100 {
            return Err(ConfigError::WeightSum { sum });
        }

        if let Some(think) = self.think_time
            && think.min_secs > think.max_secs
        {
            return Err(ConfigError::InvertedThinkTime {
                min: think.min_secs,
                max: think.max_secs,
            });
        }

        if self.pagination.default_limit == 0 || self.pagination.max_page == 0 {
            return Err(ConfigError::ZeroPagination);
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        for spec in &self.thresholds {
            if spec.metric.is_empty() {
                return Err(ConfigError::Threshold {
                    metric: spec.metric.clone(),
                    error: "empty metric name".to_string(),
                });
            }
            for expr in &spec.expressions {
                parse_threshold_expr(expr).map_err(|error| ConfigError::Threshold {
                    metric: spec.metric.clone(),
                    error,
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config::new(
            "http://localhost:8080",
            "smoke",
            LoadProfile::Flat {
                vus: 1,
                duration: Duration::from_secs(10),
            },
        )
    }

    #[test]
    fn named_profiles_exist_and_have_expected_shape() {
        for name in LoadProfile::profile_names() {
            assert!(LoadProfile::named(name).is_some(), "missing profile {name}");
        }
        assert!(LoadProfile::named("warp").is_none());

        let Some(spike) = LoadProfile::named("spike") else {
            panic!("expected spike profile");
        };
        assert_eq!(spike.max_vus(), 200);
        assert_eq!(spike.total_duration(), Duration::from_secs(220));

        let Some(smoke) = LoadProfile::named("smoke") else {
            panic!("expected smoke profile");
        };
        assert_eq!(smoke.max_vus(), 1);
    }

    #[test]
    fn default_config_validates() {
        let cfg = valid_config();
        if let Err(err) = cfg.validate() {
            panic!("default config should validate: {err}");
        }
    }

    #[test]
    fn weights_must_sum_to_exactly_100() {
        let mut cfg = valid_config();
        cfg.weights = vec![
            (ScenarioKind::BrowseProducts, 60),
            (ScenarioKind::ViewCategories, 30),
        ];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::WeightSum { sum: 90 })
        ));

        cfg.weights = vec![
            (ScenarioKind::BrowseProducts, 60),
            (ScenarioKind::ViewCategories, 41),
        ];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::WeightSum { sum: 101 })
        ));
    }

    #[test]
    fn duplicate_scenarios_are_rejected() {
        let mut cfg = valid_config();
        cfg.weights = vec![
            (ScenarioKind::BrowseProducts, 50),
            (ScenarioKind::BrowseProducts, 50),
        ];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateScenario(ScenarioKind::BrowseProducts))
        ));
    }

    #[test]
    fn zero_weight_entries_are_allowed() {
        let mut cfg = valid_config();
        cfg.weights = vec![
            (ScenarioKind::BrowseProducts, 100),
            (ScenarioKind::UserJourney, 0),
        ];
        if let Err(err) = cfg.validate() {
            panic!("zero weight should be allowed: {err}");
        }
    }

    #[test]
    fn vu_ceiling_is_enforced() {
        let mut cfg = valid_config();
        cfg.profile = LoadProfile::Flat {
            vus: MAX_VUS + 1,
            duration: Duration::from_secs(1),
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooManyVus { .. })
        ));
    }

    #[test]
    fn malformed_thresholds_fail_fast() {
        let mut cfg = valid_config();
        cfg.thresholds = vec![ThresholdSpec::new("http_req_duration", &["p95<500"])];
        assert!(matches!(cfg.validate(), Err(ConfigError::Threshold { .. })));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let mut cfg = valid_config();
        cfg.base_url = "not a url".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidBaseUrl(_))));
    }

    #[test]
    fn inverted_think_time_is_rejected() {
        let mut cfg = valid_config();
        cfg.think_time = Some(ThinkTime {
            min_secs: 5,
            max_secs: 2,
        });
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvertedThinkTime { min: 5, max: 2 })
        ));
    }
}
