//! Azure tenant exports
//!
//! Every record is `{"kind": "AZUser", "data": {...}}`. Nodes land in the Azure
//! map keyed by label; hybrid users additionally produce an on-premises `User`
//! node and a `SyncedToADUser` edge.

use super::{graph_properties, group_for, GroupMap, PropertyGroup, TransformResult, Transformer};
use crate::extract::Record;
use crate::template::format_template;
use serde_json::{json, Value};
use tracing::warn;

const AZURE_NODE: &str =
    "UNWIND $props AS prop MERGE (n:AZBase {objectid: prop.objectid}) SET n:{} SET n += prop.map";

const ON_PREM_USER: &str = "UNWIND $props AS prop MERGE (n:Base {objectid: prop.objectid}) SET n:User";

const SYNCED_TO_AD_USER: &str = "UNWIND $props AS prop \
     MATCH (n:AZUser {objectid: prop.source}) MATCH (m:User {objectid: prop.target}) \
     MERGE (n)-[:SyncedToADUser]->(m)";

const AZ_MEMBER_OF: &str = "UNWIND $props AS prop \
     MERGE (n:AZBase {objectid: prop.source}) MERGE (m:AZGroup {objectid: prop.target}) SET m:AZBase \
     MERGE (n)-[:AZMemberOf]->(m)";

const NODE_LABELS: [&str; 10] = [
    "AZUser",
    "AZGroup",
    "AZTenant",
    "AZSubscription",
    "AZResourceGroup",
    "AZVM",
    "AZDevice",
    "AZKeyVault",
    "AZApp",
    "AZServicePrincipal",
];

const GROUP_MEMBER_KIND: &str = "azgroupmember";

/// Transformer for the `azure` entity kind
#[derive(Debug, Clone, Default)]
pub struct AzureTransformer;

#[derive(Default)]
struct AzureGroups {
    azure: GroupMap,
    on_prem: GroupMap,
    relationships: GroupMap,
}

impl AzureTransformer {
    pub fn new() -> Self {
        Self
    }

    fn add_node(groups: &mut AzureGroups, label: &'static str, data: &Value) {
        let Some(id) = data.get("id").and_then(Value::as_str) else {
            warn!(label, "Skipping Azure object without id");
            return;
        };
        let object_id = id.to_uppercase();

        group_for(&mut groups.azure, label.to_string(), || {
            format_template(AZURE_NODE, &[label])
        })
        .props
        .push(json!({"objectid": object_id, "map": graph_properties(Some(data))}));

        if label != "AZUser" {
            return;
        }
        let Some(sid) = data
            .get("onPremisesSecurityIdentifier")
            .and_then(Value::as_str)
            .filter(|sid| !sid.is_empty())
        else {
            return;
        };
        let sid = sid.to_uppercase();

        group_for(&mut groups.on_prem, "User".to_string(), || ON_PREM_USER.to_string())
            .props
            .push(json!({"objectid": sid}));
        group_for(&mut groups.relationships, "SyncedToADUser".to_string(), || {
            SYNCED_TO_AD_USER.to_string()
        })
        .props
        .push(json!({"source": object_id, "target": sid}));
    }

    fn add_group_members(groups: &mut AzureGroups, data: &Value) {
        let Some(group_id) = data.get("groupId").and_then(Value::as_str) else {
            warn!("Skipping Azure group membership without groupId");
            return;
        };
        let Some(members) = data.get("members").and_then(Value::as_array) else {
            return;
        };

        let memberships = group_for(&mut groups.relationships, "AZMemberOf".to_string(), || {
            AZ_MEMBER_OF.to_string()
        });
        for member in members {
            if let Some(member_id) = member.pointer("/member/id").and_then(Value::as_str) {
                memberships.props.push(json!({
                    "source": member_id.to_uppercase(),
                    "target": group_id.to_uppercase(),
                }));
            }
        }
    }
}

impl Transformer for AzureTransformer {
    fn kind(&self) -> &str {
        "azure"
    }

    fn transform(&self, batch: &[Record]) -> TransformResult {
        let mut groups = AzureGroups::default();
        // On-premises users always get a group, even when no hybrid user shows up
        groups
            .on_prem
            .insert("User".to_string(), PropertyGroup::new(ON_PREM_USER));

        for record in batch {
            let (Some(kind), Some(data)) = (
                record.get("kind").and_then(Value::as_str),
                record.get("data"),
            ) else {
                warn!("Skipping Azure record without kind or data");
                continue;
            };

            if kind.eq_ignore_ascii_case(GROUP_MEMBER_KIND) {
                Self::add_group_members(&mut groups, data);
            } else if let Some(label) = NODE_LABELS.iter().copied().find(|l| l.eq_ignore_ascii_case(kind)) {
                Self::add_node(&mut groups, label, data);
            } else {
                warn!(kind, "Skipping unsupported Azure object kind");
            }
        }

        TransformResult::Azure {
            azure: groups.azure,
            on_prem: groups.on_prem,
            relationships: groups.relationships,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_only_user_leaves_on_prem_group_empty() {
        let batch = vec![json!({
            "kind": "AZUser",
            "data": {"id": "aaaa-1", "displayName": "Alice", "accountEnabled": true}
        })];

        match AzureTransformer::new().transform(&batch) {
            TransformResult::Azure {
                azure,
                on_prem,
                relationships,
            } => {
                assert_eq!(azure["AZUser"].props.len(), 1);
                assert!(azure["AZUser"].statement.contains("SET n:AZUser"));
                assert!(on_prem["User"].is_empty());
                assert!(relationships.is_empty());
            },
            other => panic!("expected azure result, got {:?}", other),
        }
    }

    #[test]
    fn test_hybrid_user_links_on_prem_account() {
        let batch = vec![json!({
            "kind": "azuser",
            "data": {"id": "aaaa-2", "onPremisesSecurityIdentifier": "s-1-5-21-1-1104"}
        })];

        match AzureTransformer::new().transform(&batch) {
            TransformResult::Azure {
                on_prem,
                relationships,
                ..
            } => {
                assert_eq!(on_prem["User"].props, vec![json!({"objectid": "S-1-5-21-1-1104"})]);
                assert_eq!(
                    relationships["SyncedToADUser"].props,
                    vec![json!({"source": "AAAA-2", "target": "S-1-5-21-1-1104"})]
                );
            },
            other => panic!("expected azure result, got {:?}", other),
        }
    }

    #[test]
    fn test_group_members_and_unknown_kinds() {
        let batch = vec![
            json!({
                "kind": "AZGroupMember",
                "data": {
                    "groupId": "group-1",
                    "members": [
                        {"groupId": "group-1", "member": {"id": "user-1", "@odata.type": "#microsoft.graph.user"}},
                        {"groupId": "group-1", "member": {"id": "user-2"}}
                    ]
                }
            }),
            json!({"kind": "AZSomethingNew", "data": {"id": "x"}}),
            json!({"data": {"id": "y"}}),
        ];

        match AzureTransformer::new().transform(&batch) {
            TransformResult::Azure {
                azure,
                relationships,
                ..
            } => {
                assert!(azure.is_empty());
                assert_eq!(relationships["AZMemberOf"].props.len(), 2);
            },
            other => panic!("expected azure result, got {:?}", other),
        }
    }
}
