use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::application::Application;

/// Optional per-call predicates for narrowing an application listing.
///
/// Every field is independent. A field that is absent, empty or whitespace-only
/// places no constraint on its dimension; the set fields are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    /// Case-insensitive substring of the application name.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    /// Namespace the Application resource itself lives in.
    #[serde(default)]
    pub app_namespace: Option<String>,
    #[serde(default)]
    pub destination_namespace: Option<String>,
    #[serde(default)]
    pub destination_server: Option<String>,
    #[serde(default)]
    pub destination_name: Option<String>,
    #[serde(default)]
    pub health_status: Option<String>,
    #[serde(default)]
    pub sync_status: Option<String>,
    /// `key` (presence) or `key=value` (exact value).
    #[serde(default)]
    pub label: Option<String>,
}

/// Label predicate parsed from `key` or `key=value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelPredicate<'a> {
    pub key: &'a str,
    /// `None` means presence-only. `Some("")` requires the empty value.
    pub value: Option<&'a str>,
}

impl<'a> LabelPredicate<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match raw.split_once('=') {
            Some((key, value)) => Self {
                key,
                value: Some(value),
            },
            None => Self {
                key: raw,
                value: None,
            },
        }
    }

    pub fn matches(&self, app: &Application) -> bool {
        match (app.label(self.key), self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        }
    }
}

/// Criteria after trimming, with unset fields removed.
#[derive(Debug, Default)]
struct ActiveCriteria<'a> {
    search: Option<String>,
    project: Option<&'a str>,
    app_namespace: Option<&'a str>,
    destination_namespace: Option<&'a str>,
    destination_server: Option<&'a str>,
    destination_name: Option<&'a str>,
    health_status: Option<&'a str>,
    sync_status: Option<&'a str>,
    label: Option<LabelPredicate<'a>>,
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn exact(expected: Option<&str>, actual: &str) -> bool {
    expected.is_none_or(|expected| expected == actual)
}

impl<'a> ActiveCriteria<'a> {
    fn from_criteria(criteria: &'a FilterCriteria) -> Self {
        Self {
            search: active(&criteria.search).map(str::to_lowercase),
            project: active(&criteria.project),
            app_namespace: active(&criteria.app_namespace),
            destination_namespace: active(&criteria.destination_namespace),
            destination_server: active(&criteria.destination_server),
            destination_name: active(&criteria.destination_name),
            health_status: active(&criteria.health_status),
            sync_status: active(&criteria.sync_status),
            label: active(&criteria.label).map(LabelPredicate::parse),
        }
    }

    fn is_empty(&self) -> bool {
        self.search.is_none()
            && self.project.is_none()
            && self.app_namespace.is_none()
            && self.destination_namespace.is_none()
            && self.destination_server.is_none()
            && self.destination_name.is_none()
            && self.health_status.is_none()
            && self.sync_status.is_none()
            && self.label.is_none()
    }

    fn matches(&self, app: &Application) -> bool {
        if let Some(search) = &self.search {
            if !app.name().to_lowercase().contains(search.as_str()) {
                return false;
            }
        }
        if let Some(label) = &self.label {
            if !label.matches(app) {
                return false;
            }
        }
        exact(self.project, app.project())
            && exact(self.app_namespace, app.namespace())
            && exact(self.destination_namespace, app.destination_namespace())
            && exact(self.destination_server, app.destination_server())
            && exact(self.destination_name, app.destination_name())
            && exact(self.health_status, app.health_status())
            && exact(self.sync_status, app.sync_status())
    }
}

/// Narrows a raw application listing (`{ metadata, items: [...] }`).
///
/// With no active criteria the listing is returned as-is, metadata included.
/// Otherwise the result is `{ "items": [...] }` holding the matching documents
/// in their original order; the listing metadata is not carried over. A
/// missing or `null` `items` array is treated as empty.
pub fn filter_applications(listing: Value, criteria: &FilterCriteria) -> Value {
    let active = ActiveCriteria::from_criteria(criteria);
    if active.is_empty() {
        return listing;
    }

    let items = match listing {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let matches: Vec<Value> = items
        .into_iter()
        .filter(|document| active.matches(&Application::from_document(document)))
        .collect();

    json!({ "items": matches })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str, extra: Value) -> Value {
        let mut doc = json!({
            "metadata": { "name": name, "namespace": "argocd" },
            "spec": {
                "project": "default",
                "destination": {
                    "server": "https://kubernetes.default.svc",
                    "namespace": "apps",
                    "name": "in-cluster"
                }
            },
            "status": {
                "health": { "status": "Healthy" },
                "sync": { "status": "Synced" }
            }
        });
        merge(&mut doc, extra);
        doc
    }

    fn merge(target: &mut Value, patch: Value) {
        match (target, patch) {
            (Value::Object(target), Value::Object(patch)) => {
                for (key, value) in patch {
                    merge(target.entry(key).or_insert(Value::Null), value);
                }
            }
            (target, patch) => *target = patch,
        }
    }

    fn listing(items: Vec<Value>) -> Value {
        json!({
            "metadata": { "resourceVersion": "1234" },
            "items": items
        })
    }

    fn names(result: &Value) -> Vec<&str> {
        result["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["metadata"]["name"].as_str().unwrap())
            .collect()
    }

    fn search(term: &str) -> FilterCriteria {
        FilterCriteria {
            search: Some(term.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn no_criteria_returns_listing_unchanged() {
        let input = listing(vec![app("my-app", json!({})), app("other-app", json!({}))]);
        let result = filter_applications(input.clone(), &FilterCriteria::default());
        assert_eq!(result, input);
    }

    #[test]
    fn whitespace_only_criteria_count_as_unset() {
        let input = listing(vec![app("my-app", json!({}))]);
        let criteria = FilterCriteria {
            search: Some("   ".to_string()),
            project: Some(String::new()),
            label: Some("\t".to_string()),
            ..Default::default()
        };
        assert!(ActiveCriteria::from_criteria(&criteria).is_empty());
        assert_eq!(filter_applications(input.clone(), &criteria), input);
    }

    #[test]
    fn filtered_result_drops_metadata_wrapper() {
        let input = listing(vec![app("my-app", json!({}))]);
        let result = filter_applications(input, &search("my"));
        assert!(result.get("metadata").is_none());
        assert_eq!(names(&result), vec!["my-app"]);
    }

    #[test]
    fn search_is_case_insensitive_substring_of_name() {
        let input = listing(vec![app("my-app", json!({})), app("other-app", json!({}))]);
        assert_eq!(names(&filter_applications(input.clone(), &search("my"))), vec!["my-app"]);
        assert_eq!(names(&filter_applications(input.clone(), &search("MY"))), vec!["my-app"]);
        assert_eq!(
            names(&filter_applications(input, &search("  app "))),
            vec!["my-app", "other-app"]
        );
    }

    #[test]
    fn search_does_not_look_beyond_the_name() {
        let input = listing(vec![app("billing", json!({ "spec": { "project": "payments" } }))]);
        let result = filter_applications(input, &search("payments"));
        assert!(names(&result).is_empty());
    }

    #[test]
    fn exact_fields_are_case_sensitive() {
        let input = listing(vec![
            app("a", json!({ "spec": { "project": "team-a" } })),
            app("b", json!({ "spec": { "project": "team-b" } })),
        ]);
        let criteria = FilterCriteria {
            project: Some(" team-a ".to_string()),
            ..Default::default()
        };
        assert_eq!(names(&filter_applications(input.clone(), &criteria)), vec!["a"]);

        let criteria = FilterCriteria {
            project: Some("Team-A".to_string()),
            ..Default::default()
        };
        assert!(names(&filter_applications(input, &criteria)).is_empty());
    }

    #[test]
    fn exact_fields_do_not_match_substrings() {
        let input = listing(vec![app("a", json!({ "spec": { "project": "team-a" } }))]);
        let criteria = FilterCriteria {
            project: Some("team".to_string()),
            ..Default::default()
        };
        assert!(names(&filter_applications(input, &criteria)).is_empty());
    }

    #[test]
    fn each_exact_field_maps_to_its_document_field() {
        let input = listing(vec![
            app("match", json!({})),
            app(
                "miss",
                json!({
                    "metadata": { "namespace": "other" },
                    "spec": {
                        "destination": {
                            "server": "https://remote",
                            "namespace": "elsewhere",
                            "name": "remote"
                        }
                    },
                    "status": {
                        "health": { "status": "Degraded" },
                        "sync": { "status": "OutOfSync" }
                    }
                }),
            ),
        ]);
        let cases = [
            FilterCriteria {
                app_namespace: Some("argocd".into()),
                ..Default::default()
            },
            FilterCriteria {
                destination_namespace: Some("apps".into()),
                ..Default::default()
            },
            FilterCriteria {
                destination_server: Some("https://kubernetes.default.svc".into()),
                ..Default::default()
            },
            FilterCriteria {
                destination_name: Some("in-cluster".into()),
                ..Default::default()
            },
            FilterCriteria {
                health_status: Some("Healthy".into()),
                ..Default::default()
            },
            FilterCriteria {
                sync_status: Some("Synced".into()),
                ..Default::default()
            },
        ];
        for criteria in cases {
            assert_eq!(
                names(&filter_applications(input.clone(), &criteria)),
                vec!["match"],
                "criteria: {criteria:?}"
            );
        }
    }

    #[test]
    fn label_without_value_checks_presence_only() {
        let input = listing(vec![
            app("front", json!({ "metadata": { "labels": { "tier": "frontend" } } })),
            app("back", json!({ "metadata": { "labels": { "tier": "backend" } } })),
            app("none", json!({})),
        ]);
        let criteria = FilterCriteria {
            label: Some("tier".to_string()),
            ..Default::default()
        };
        assert_eq!(
            names(&filter_applications(input, &criteria)),
            vec!["front", "back"]
        );
    }

    #[test]
    fn label_with_value_requires_exact_value() {
        let input = listing(vec![
            app("front", json!({ "metadata": { "labels": { "tier": "frontend" } } })),
            app("back", json!({ "metadata": { "labels": { "tier": "backend" } } })),
            app("blank", json!({ "metadata": { "labels": { "tier": "" } } })),
        ]);
        let criteria = FilterCriteria {
            label: Some("tier=frontend".to_string()),
            ..Default::default()
        };
        assert_eq!(names(&filter_applications(input.clone(), &criteria)), vec!["front"]);

        let criteria = FilterCriteria {
            label: Some("tier=".to_string()),
            ..Default::default()
        };
        assert_eq!(names(&filter_applications(input, &criteria)), vec!["blank"]);
    }

    #[test]
    fn label_value_may_contain_equals_sign() {
        assert_eq!(
            LabelPredicate::parse("expr=a=b"),
            LabelPredicate {
                key: "expr",
                value: Some("a=b")
            }
        );
    }

    #[test]
    fn missing_health_never_matches_and_never_fails() {
        let mut bare = app("bare", json!({}));
        bare["status"] = json!({ "sync": { "status": "Synced" } });
        let input = listing(vec![bare, json!({ "metadata": { "name": "empty" } })]);
        let criteria = FilterCriteria {
            health_status: Some("Healthy".to_string()),
            ..Default::default()
        };
        assert!(names(&filter_applications(input, &criteria)).is_empty());
    }

    #[test]
    fn criteria_are_conjunctive() {
        let input = listing(vec![
            app("web-prod", json!({ "spec": { "project": "prod" } })),
            app("web-dev", json!({ "spec": { "project": "dev" } })),
            app("db-prod", json!({ "spec": { "project": "prod" } })),
        ]);
        let criteria = FilterCriteria {
            search: Some("web".to_string()),
            project: Some("prod".to_string()),
            ..Default::default()
        };
        assert_eq!(names(&filter_applications(input, &criteria)), vec!["web-prod"]);
    }

    #[test]
    fn matches_keep_listing_order_and_full_documents() {
        let c = app("c-app", json!({ "spec": { "source": { "path": "c" } } }));
        let input = listing(vec![c.clone(), app("b-other", json!({})), app("a-app", json!({}))]);
        let result = filter_applications(input, &search("-app"));
        assert_eq!(names(&result), vec!["c-app", "a-app"]);
        assert_eq!(result["items"][0], c);
    }

    #[test]
    fn null_items_with_active_criteria_yield_empty_list() {
        let input = json!({ "metadata": {}, "items": null });
        let result = filter_applications(input, &search("x"));
        assert_eq!(result, json!({ "items": [] }));
    }

    #[test]
    fn criteria_deserialize_from_camel_case_arguments() {
        let criteria: FilterCriteria = serde_json::from_value(json!({
            "appNamespace": "argocd",
            "healthStatus": "Healthy",
            "destinationServer": "https://kubernetes.default.svc"
        }))
        .unwrap();
        assert_eq!(criteria.app_namespace.as_deref(), Some("argocd"));
        assert_eq!(criteria.health_status.as_deref(), Some("Healthy"));
        assert_eq!(
            criteria.destination_server.as_deref(),
            Some("https://kubernetes.default.svc")
        );
    }

    #[test]
    fn wrongly_typed_status_does_not_hide_name_or_labels() {
        let item = json!({
            "metadata": { "name": "my-app", "labels": { "tier": "web" } },
            "status": { "health": "Healthy" }
        });
        let input = listing(vec![item.clone()]);

        let result = filter_applications(input.clone(), &search("my"));
        assert_eq!(result, json!({ "items": [item.clone()] }));

        let by_label = FilterCriteria {
            label: Some("tier".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_applications(input.clone(), &by_label), json!({ "items": [item] }));

        let by_health = FilterCriteria {
            health_status: Some("Healthy".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_applications(input, &by_health), json!({ "items": [] }));
    }
}
