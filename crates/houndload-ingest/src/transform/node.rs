//! On-premises Active Directory objects
//!
//! Records look like
//! `{"ObjectIdentifier": "S-1-5-...", "Properties": {...}, "Aces": [...], "Members": [...]}`.

use super::{graph_properties, group_for, is_identifier, GroupMap, TransformResult, Transformer};
use crate::extract::Record;
use crate::template::{format_indexed, format_template};
use serde_json::{json, Value};
use tracing::warn;

const NODE_PROPERTIES: &str =
    "UNWIND $props AS prop MERGE (n:Base {objectid: prop.source}) SET n:{} SET n += prop.map";

const MEMBER_OF: &str = "UNWIND $props AS prop MERGE (n:Base {objectid: prop.source}) SET n:{0} \
     MERGE (m:Base {objectid: prop.target}) SET m:Group \
     MERGE (n)-[r:MemberOf {isacl: false}]->(m)";

const ACE: &str = "UNWIND $props AS prop MERGE (n:Base {objectid: prop.source}) SET n:{0} \
     MERGE (m:Base {objectid: prop.target}) SET m:{1} \
     MERGE (n)-[r:{2} {isacl: true}]->(m) SET r.isinherited = prop.isinherited";

/// Entity kinds exported by the on-premises collector and their node labels
const KINDS: [(&str, &str); 7] = [
    ("computers", "Computer"),
    ("groups", "Group"),
    ("users", "User"),
    ("domains", "Domain"),
    ("ous", "OU"),
    ("gpos", "GPO"),
    ("containers", "Container"),
];

/// Labels whose records carry a `PrimaryGroupSID`
const PRIMARY_GROUP_LABELS: [&str; 2] = ["User", "Computer"];

/// Writes node properties, group memberships and ACL edges for one label
#[derive(Debug, Clone)]
pub struct NodeTransformer {
    kind: &'static str,
    label: &'static str,
}

impl NodeTransformer {
    pub fn new(kind: &'static str, label: &'static str) -> Self {
        Self { kind, label }
    }

    /// One transformer per on-premises entity kind
    pub fn defaults() -> Vec<Self> {
        KINDS
            .iter()
            .map(|&(kind, label)| Self::new(kind, label))
            .collect()
    }

    pub fn label(&self) -> &str {
        self.label
    }

    fn add_members(&self, groups: &mut GroupMap, object_id: &str, record: &Record) {
        let Some(members) = record.get("Members").and_then(Value::as_array) else {
            return;
        };

        for member in members {
            let (Some(member_id), Some(member_type)) = (
                member.get("ObjectIdentifier").and_then(Value::as_str),
                member.get("ObjectType").and_then(Value::as_str),
            ) else {
                continue;
            };
            if !is_identifier(member_type) {
                warn!(kind = self.kind, member_type, "Skipping member with unusable type");
                continue;
            }

            group_for(groups, format!("member_{}", member_type), || {
                format_indexed(MEMBER_OF, &[member_type])
            })
            .props
            .push(json!({"source": member_id.to_uppercase(), "target": object_id}));
        }
    }

    fn add_primary_group(&self, groups: &mut GroupMap, object_id: &str, record: &Record) {
        let Some(group_id) = record.get("PrimaryGroupSID").and_then(Value::as_str) else {
            return;
        };

        group_for(groups, format!("member_{}", self.label), || {
            format_indexed(MEMBER_OF, &[self.label])
        })
        .props
        .push(json!({"source": object_id, "target": group_id.to_uppercase()}));
    }

    fn add_aces(&self, groups: &mut GroupMap, object_id: &str, record: &Record) {
        let Some(aces) = record.get("Aces").and_then(Value::as_array) else {
            return;
        };

        for ace in aces {
            let (Some(principal), Some(principal_type), Some(right)) = (
                ace.get("PrincipalSID").and_then(Value::as_str),
                ace.get("PrincipalType").and_then(Value::as_str),
                ace.get("RightName").and_then(Value::as_str),
            ) else {
                continue;
            };
            if !is_identifier(principal_type) || !is_identifier(right) {
                warn!(kind = self.kind, principal_type, right, "Skipping ACE with unusable name");
                continue;
            }

            let inherited = ace.get("IsInherited").and_then(Value::as_bool).unwrap_or(false);
            group_for(
                groups,
                format!("ace_{}_{}_{}", principal_type, self.label, right),
                || format_indexed(ACE, &[principal_type, self.label, right]),
            )
            .props
            .push(json!({
                "source": principal.to_uppercase(),
                "target": object_id,
                "isinherited": inherited,
            }));
        }
    }
}

impl Transformer for NodeTransformer {
    fn kind(&self) -> &str {
        self.kind
    }

    fn transform(&self, batch: &[Record]) -> TransformResult {
        let mut groups = GroupMap::new();

        for record in batch {
            let Some(object_id) = record.get("ObjectIdentifier").and_then(Value::as_str) else {
                warn!(kind = self.kind, "Skipping record without ObjectIdentifier");
                continue;
            };
            let object_id = object_id.to_uppercase();

            group_for(&mut groups, "properties".to_string(), || {
                format_template(NODE_PROPERTIES, &[self.label])
            })
            .props
            .push(json!({
                "source": object_id,
                "map": graph_properties(record.get("Properties")),
            }));

            if self.label == "Group" {
                self.add_members(&mut groups, &object_id, record);
            }
            if PRIMARY_GROUP_LABELS.contains(&self.label) {
                self.add_primary_group(&mut groups, &object_id, record);
            }
            self.add_aces(&mut groups, &object_id, record);
        }

        TransformResult::Standard(groups)
    }
}
