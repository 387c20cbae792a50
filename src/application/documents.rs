//! JSON documents consumed and produced by the pipelines
//!
//! Tree nodes are kept as raw JSON objects so every field the visualization
//! relies on survives the round trip; only `id`, `layer`, `parent` and
//! `label` are interpreted.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::application::error_ext::JsonResultExt;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    ranking_keys, BoostFactor, CheckResult, Coverage, DistributionStats, Hierarchy, ImportanceMap,
    LeafScore, NodeId, NodeRecord, RankedNode, ScoreSource, SIZE_FORMULA,
};

/// Node id as written in JSON: integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdValue::Int(value) => write!(f, "{value}"),
            IdValue::Text(value) => f.write_str(value),
        }
    }
}

/// The interpreted part of a tree node.
#[derive(Debug, Deserialize)]
struct NodeFields {
    id: IdValue,
    layer: usize,
    #[serde(default)]
    parent: Option<IdValue>,
    #[serde(default)]
    label: Option<String>,
}

/// Tree document: a `nodes` array plus arbitrary top-level keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeDocument {
    pub nodes: Vec<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TreeDocument {
    pub fn parse(json: &str, path: &Path) -> ApplicationResult<Self> {
        serde_json::from_str(json).with_parse_context(path)
    }

    /// Typed records in document order.
    ///
    /// A node without `label` is labelled with its id.
    pub fn records(&self, path: &Path) -> ApplicationResult<Vec<NodeRecord>> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(position, node)| -> ApplicationResult<NodeRecord> {
                let fields: NodeFields = serde_json::from_value(Value::Object(node.clone()))
                    .map_err(|e| ApplicationError::Parse {
                        path: path.to_path_buf(),
                        message: format!("node #{position}: {e}"),
                    })?;
                let id = NodeId::new(fields.id.to_string())?;
                let parent = fields
                    .parent
                    .map(|parent| NodeId::new(parent.to_string()))
                    .transpose()?;
                let label = fields.label.unwrap_or_else(|| id.to_string());
                Ok(NodeRecord {
                    id,
                    layer: fields.layer,
                    parent,
                    label,
                })
            })
            .collect()
    }

    /// Set `importance` (normalized) and `shap_raw` on every node.
    ///
    /// Ids keep their JSON type; all other fields are left untouched.
    pub fn enrich(&mut self, importance: &ImportanceMap) {
        for node in &mut self.nodes {
            let Some(id) = node_id(node) else {
                continue;
            };
            node.insert("importance".into(), json_number(importance.normalized(id.as_str())));
            node.insert("shap_raw".into(), json_number(importance.raw(id.as_str())));
        }
        debug!("enriched {} nodes", self.nodes.len());
    }

    /// `importance` of every node that carries one, keyed by id.
    pub fn importance_lookup(&self) -> HashMap<NodeId, f64> {
        self.nodes
            .iter()
            .filter_map(|node| {
                let id = node_id(node)?;
                let value = node.get("importance")?.as_f64()?;
                Some((id, value))
            })
            .collect()
    }

    pub fn to_json_pretty(&self) -> ApplicationResult<String> {
        to_json_pretty(self)
    }
}

/// Id of a raw node, normalized the same way as [`TreeDocument::records`].
fn node_id(node: &Map<String, Value>) -> Option<NodeId> {
    let raw = match node.get("id")? {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        _ => return None,
    };
    NodeId::new(raw).ok()
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Per-leaf score records keyed by leaf id.
///
/// A record is either an object holding the score field or a bare number.
/// Keys are trimmed like node ids.
#[derive(Debug, Clone, Default)]
pub struct ScoreTable {
    /// `None` marks a record whose score is not a number
    scores: HashMap<String, Option<f64>>,
}

impl ScoreTable {
    pub fn parse(json: &str, field: &str, path: &Path) -> ApplicationResult<Self> {
        let value: Value = serde_json::from_str(json).with_parse_context(path)?;
        let Value::Object(records) = value else {
            return Err(ApplicationError::Parse {
                path: path.to_path_buf(),
                message: "expected an object mapping leaf id to score record".into(),
            });
        };
        let scores = records
            .into_iter()
            .map(|(id, record)| {
                let score = match &record {
                    Value::Number(number) => number.as_f64(),
                    Value::Object(fields) => fields.get(field).and_then(Value::as_f64),
                    _ => None,
                };
                (id.trim().to_string(), score)
            })
            .collect();
        Ok(Self { scores })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl ScoreSource for ScoreTable {
    fn leaf_score(&self, id: &NodeId) -> LeafScore {
        match self.scores.get(id.as_str()) {
            None => LeafScore::Missing,
            Some(Some(value)) if value.is_finite() && *value >= 0.0 => LeafScore::Present(*value),
            Some(_) => LeafScore::Invalid,
        }
    }
}

impl FromIterator<(String, Option<f64>)> for ScoreTable {
    fn from_iter<T: IntoIterator<Item = (String, Option<f64>)>>(iter: T) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}

/// Pretty JSON with two-space indentation.
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> ApplicationResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| ApplicationError::OperationFailed {
        context: "serialize JSON".into(),
        source: Box::new(e),
    })
}

/// Ordered key/value pairs written as a JSON object.
#[allow(clippy::ptr_arg)]
fn ordered_map<S, V>(entries: &Vec<(String, V)>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    serializer.collect_map(entries.iter().map(|(key, value)| (key, value)))
}

// ============================================================
// IMPORTANCE METADATA
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationInfo {
    pub method: &'static str,
    pub max_value: f64,
    pub floor_applied: bool,
    pub floor_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeImportance {
    pub shap_raw: f64,
    pub shap_normalized: f64,
    pub layer: usize,
    pub is_outcome: bool,
    pub floor_adjusted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost_factor: Option<BoostFactor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeMappingInfo {
    pub min_radius_px: f64,
    pub max_radius_px: f64,
    pub formula: &'static str,
}

/// Sidecar describing how node importance was computed and should be drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceMetadata {
    pub importance_metric: &'static str,
    pub computation_date: String,
    pub normalization: NormalizationInfo,
    #[serde(serialize_with = "ordered_map")]
    pub node_importance: Vec<(String, NodeImportance)>,
    pub size_mapping: SizeMappingInfo,
}

impl ImportanceMetadata {
    pub fn build(
        hierarchy: &Hierarchy,
        importance: &ImportanceMap,
        outcome_layer: usize,
        floor_percentage: f64,
        radius_px: (f64, f64),
        date: NaiveDate,
    ) -> Self {
        let node_importance = hierarchy
            .nodes()
            .map(|(_, node)| {
                let id = node.data.id.as_str();
                let entry = NodeImportance {
                    shap_raw: importance.raw(id),
                    shap_normalized: importance.normalized(id),
                    layer: node.data.layer,
                    is_outcome: node.data.layer == outcome_layer,
                    floor_adjusted: importance.is_floor_adjusted(id),
                    boost_factor: importance.boost(id),
                };
                (id.to_string(), entry)
            })
            .collect();

        Self {
            importance_metric: "shap_hierarchical",
            computation_date: date.format("%Y-%m-%d").to_string(),
            normalization: NormalizationInfo {
                method: "global_max",
                max_value: importance.max_raw(),
                floor_applied: importance.floor().is_some_and(|floor| !floor.skipped),
                floor_percentage,
            },
            node_importance,
            size_mapping: SizeMappingInfo {
                min_radius_px: radius_px.0,
                max_radius_px: radius_px.1,
                formula: SIZE_FORMULA,
            },
        }
    }
}

// ============================================================
// VALIDATION REPORT
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeEntry {
    pub raw_shap: f64,
    pub normalized: f64,
    pub floor_adjusted: bool,
    pub rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost_factor: Option<BoostFactor>,
}

impl From<&RankedNode> for OutcomeEntry {
    fn from(row: &RankedNode) -> Self {
        Self {
            raw_shap: row.raw,
            normalized: row.normalized,
            floor_adjusted: row.floor_adjusted,
            rank: row.rank,
            boost_factor: row.boost_factor,
        }
    }
}

/// Structured validation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub summary: Coverage,
    /// Keyed by outcome label, best first
    #[serde(serialize_with = "ordered_map")]
    pub outcome_importance: Vec<(String, OutcomeEntry)>,
    pub distribution: DistributionStats,
    pub warnings: Vec<String>,
    pub checks: Vec<CheckResult>,
    pub all_passed: bool,
}

impl ValidationReport {
    pub fn build(
        coverage: Coverage,
        outcomes: &[RankedNode],
        distribution: DistributionStats,
        warnings: Vec<String>,
        checks: Vec<CheckResult>,
    ) -> Self {
        let outcome_importance = ranking_keys(outcomes)
            .into_iter()
            .zip(outcomes.iter().map(OutcomeEntry::from))
            .collect();
        let all_passed = checks.iter().all(|check| check.passed);

        Self {
            summary: coverage,
            outcome_importance,
            distribution,
            warnings,
            checks,
            all_passed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HierarchyBuilder;
    use std::path::PathBuf;

    fn path() -> PathBuf {
        PathBuf::from("tree.json")
    }

    #[test]
    fn given_mixed_id_types_when_reading_records_then_ids_are_stringified() {
        let doc = TreeDocument::parse(
            r#"{"nodes": [
                {"id": 1, "layer": 0, "label": "root"},
                {"id": "a", "layer": 1, "parent": 1}
            ], "version": "2.1"}"#,
            &path(),
        )
        .unwrap();

        let records = doc.records(&path()).unwrap();

        assert_eq!(records[0].id.as_str(), "1");
        assert_eq!(records[1].parent.as_ref().unwrap().as_str(), "1");
        assert_eq!(records[1].label, "a");
        assert_eq!(doc.extra.get("version"), Some(&Value::from("2.1")));
    }

    #[test]
    fn given_node_without_layer_when_reading_records_then_parse_error_names_node() {
        let doc = TreeDocument::parse(r#"{"nodes": [{"id": 1}]}"#, &path()).unwrap();

        let err = doc.records(&path()).unwrap_err();

        assert!(matches!(err, ApplicationError::Parse { .. }));
        assert!(err.to_string().contains("node #0"));
    }

    #[test]
    fn given_score_records_when_looking_up_then_classifies_values() {
        let table = ScoreTable::parse(
            r#"{"a": {"shap_normalized": 0.4}, "b": {"shap_normalized": "n/a"},
                "c": {"other": 1}, "d": 0.2, "e": {"shap_normalized": -1}}"#,
            "shap_normalized",
            &path(),
        )
        .unwrap();

        let score = |id: &str| table.leaf_score(&NodeId::new(id).unwrap());
        assert_eq!(score("a"), LeafScore::Present(0.4));
        assert_eq!(score("b"), LeafScore::Invalid);
        assert_eq!(score("c"), LeafScore::Invalid);
        assert_eq!(score("d"), LeafScore::Present(0.2));
        assert_eq!(score("e"), LeafScore::Invalid);
        assert_eq!(score("z"), LeafScore::Missing);
    }

    #[test]
    fn given_padded_ids_when_enriching_then_values_match_trimmed_ids() {
        let mut doc = TreeDocument::parse(
            r#"{"nodes": [
                {"id": "root", "layer": 0},
                {"id": " a ", "layer": 1, "parent": "root"},
                {"id": "b", "layer": 1, "parent": " root"}
            ]}"#,
            &path(),
        )
        .unwrap();
        let scores = ScoreTable::parse(
            r#"{"a": {"shap_normalized": 2.0}, " b ": {"shap_normalized": 1.0}}"#,
            "shap_normalized",
            &path(),
        )
        .unwrap();
        let hierarchy = HierarchyBuilder::new()
            .nodes(doc.records(&path()).unwrap())
            .build()
            .unwrap();
        let importance = ImportanceMap::compute(&hierarchy, &scores);

        doc.enrich(&importance);

        assert_eq!(importance.normalized("a"), 2.0 / 3.0);
        assert_eq!(doc.nodes[1]["id"], " a ");
        assert_eq!(doc.nodes[1]["importance"], 2.0 / 3.0);
        assert_eq!(doc.nodes[1]["shap_raw"], 2.0);
        assert_eq!(doc.nodes[2]["shap_raw"], 1.0);
        assert_eq!(doc.nodes[0]["importance"], 1.0);
        let lookup = doc.importance_lookup();
        assert_eq!(lookup.get("a"), Some(&(2.0 / 3.0)));
    }

    #[test]
    fn given_array_score_document_when_parsing_then_errors() {
        let result = ScoreTable::parse("[1, 2]", "shap_normalized", &path());
        assert!(matches!(result, Err(ApplicationError::Parse { .. })));
    }

    #[test]
    fn given_ordered_entries_when_serializing_then_object_keeps_order() {
        #[derive(Serialize)]
        struct Wrapper {
            #[serde(serialize_with = "ordered_map")]
            entries: Vec<(String, u32)>,
        }
        let wrapper = Wrapper {
            entries: vec![("z".into(), 1), ("a".into(), 2)],
        };

        let json = serde_json::to_string(&wrapper).unwrap();

        assert_eq!(json, r#"{"entries":{"z":1,"a":2}}"#);
    }
}
