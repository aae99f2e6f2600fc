//! Per-user joined views over one snapshot.
//!
//! Foreign keys are loose: every lookup here tolerates a reference to a record that does not
//! exist and degrades to a placeholder instead of failing.

use db::{Collection, Record};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::snapshot::Snapshot;

pub const UNKNOWN: &str = "Unknown";
pub const NO_PROJECT: &str = "No Project";

/// How timesheets and expenses are attached to a user.
///
/// The two rules disagree for someone who logged time on a project they are no longer
/// listed on: `ProjectMembership` drops those entries, `Owner` keeps them.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScopeRule {
    /// Entries whose `projectId` is one of the user's projects
    #[default]
    ProjectMembership,
    /// Entries whose `userId` is the user, regardless of project
    Owner,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProjectData {
    pub projects: Vec<Record>,
    pub tasks: Vec<Record>,
    pub timesheets: Vec<Record>,
    pub expenses: Vec<Record>,
}

/// Projects the user manages or is a team member of, with the tasks of those projects and
/// the timesheets and expenses selected by `rule`. Every collection keeps document order.
pub fn project_data(snapshot: &Snapshot, user_id: &str, rule: ScopeRule) -> ProjectData {
    let index = snapshot.index();
    let projects = pick(snapshot, Collection::Projects, index.projects_for(user_id).to_vec());
    let project_ids: Vec<&str> = projects.iter().filter_map(Record::id).collect();

    let in_projects = |collection: Collection| {
        let mut positions: Vec<usize> = project_ids
            .iter()
            .flat_map(|project_id| index.in_project(collection, project_id))
            .copied()
            .collect();
        positions.sort_unstable();
        positions.dedup();
        pick(snapshot, collection, positions)
    };
    let scoped = |collection: Collection| match rule {
        ScopeRule::ProjectMembership => in_projects(collection),
        ScopeRule::Owner => pick(snapshot, collection, index.owned_by(collection, user_id).to_vec()),
    };

    ProjectData {
        tasks: in_projects(Collection::Tasks),
        timesheets: scoped(Collection::Timesheets),
        expenses: scoped(Collection::Expenses),
        projects,
    }
}

fn pick(snapshot: &Snapshot, collection: Collection, positions: Vec<usize>) -> Vec<Record> {
    let records = snapshot.collection(collection);
    positions
        .into_iter()
        .filter_map(|position| records.get(position).cloned())
        .collect()
}

/// Display name of the record `id` points at, or "Unknown" for a missing or dangling reference.
pub fn resolve_name<'a>(snapshot: &'a Snapshot, collection: Collection, id: Option<&str>) -> &'a str {
    id.and_then(|id| snapshot.find(collection, id))
        .and_then(|record| record.str_field(collection.display_field()))
        .unwrap_or(UNKNOWN)
}

/// Project name for a `projectId`, or "No Project" when it is null or orphaned.
pub fn project_label<'a>(snapshot: &'a Snapshot, project_id: Option<&str>) -> &'a str {
    project_id
        .and_then(|id| snapshot.find(Collection::Projects, id))
        .and_then(|project| project.str_field(Collection::Projects.display_field()))
        .unwrap_or(NO_PROJECT)
}

/// A task with its references resolved for display.
#[derive(Debug, Clone, Serialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct JoinedTask {
    #[ts(type = "Record<string, unknown>")]
    pub task: Record,
    pub project_name: String,
    pub assignee_name: String,
}

pub fn joined_tasks(snapshot: &Snapshot, tasks: &[Record]) -> Vec<JoinedTask> {
    tasks
        .iter()
        .map(|task| JoinedTask {
            project_name: project_label(snapshot, task.str_field("projectId")).to_string(),
            assignee_name: match task.str_field("assignedTo") {
                Some(user_id) => resolve_name(snapshot, Collection::Users, Some(user_id)).to_string(),
                None => "Unassigned".to_string(),
            },
            task: task.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use db::Document;
    use serde_json::{Value, json};

    use super::*;

    fn snapshot(value: Value) -> Snapshot {
        Snapshot::new(Document::from_value(value).unwrap(), 1)
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().filter_map(Record::id).collect()
    }

    fn project_ids(data: &ProjectData) -> HashSet<&str> {
        data.projects.iter().filter_map(Record::id).collect()
    }

    #[test]
    fn test_tasks_follow_project_membership() {
        let snapshot = snapshot(json!({
            "projects": [
                {"id": "p1", "name": "Apollo", "teamMembers": ["u1"]},
                {"id": "p2", "name": "Gemini", "teamMembers": ["u2"]}
            ],
            "tasks": [
                {"id": "t1", "title": "Launch", "projectId": "p1"},
                {"id": "t2", "title": "Dock", "projectId": "p2"}
            ]
        }));

        let data = project_data(&snapshot, "u1", ScopeRule::default());

        assert_eq!(ids(&data.projects), vec!["p1"]);
        assert_eq!(data.tasks, vec![snapshot.collection(Collection::Tasks)[0].clone()]);
    }

    #[test]
    fn test_manager_sees_managed_projects() {
        let snapshot = snapshot(json!({
            "projects": [
                {"id": "p1", "managerId": "u9", "teamMembers": ["u9", "u1"]},
                {"id": "p2", "managerId": "u9", "teamMembers": []},
                {"id": "p3", "managerId": "u1"}
            ],
            "tasks": [
                {"id": "t1", "projectId": "p2"},
                {"id": "t2", "projectId": "p3"},
                {"id": "t3", "projectId": "p1"}
            ]
        }));

        let data = project_data(&snapshot, "u9", ScopeRule::ProjectMembership);

        assert_eq!(ids(&data.projects), vec!["p1", "p2"]);
        assert_eq!(ids(&data.tasks), vec!["t1", "t3"]);
    }

    #[test]
    fn test_tasks_are_exactly_those_of_visible_projects() {
        let snapshot = snapshot(json!({
            "projects": [
                {"id": "p1", "teamMembers": ["u1", "u2"]},
                {"id": "p2", "managerId": "u1"},
                {"id": "p3", "teamMembers": ["u2"]}
            ],
            "tasks": [
                {"id": "t1", "projectId": "p1"},
                {"id": "t2", "projectId": "p3"},
                {"id": "t3", "projectId": "p2"},
                {"id": "t4", "projectId": "gone"},
                {"id": "t5", "projectId": null},
                {"id": "t6"}
            ]
        }));

        for user in ["u1", "u2", "u3"] {
            let data = project_data(&snapshot, user, ScopeRule::default());
            let visible = project_ids(&data);
            let expected: Vec<&str> = snapshot
                .collection(Collection::Tasks)
                .iter()
                .filter(|task| task.str_field("projectId").is_some_and(|p| visible.contains(p)))
                .filter_map(Record::id)
                .collect();
            assert_eq!(ids(&data.tasks), expected, "user {user}");
        }
    }

    #[test]
    fn test_scope_rules_diverge_for_former_members() {
        let snapshot = snapshot(json!({
            "projects": [
                {"id": "p1", "teamMembers": ["u1"]},
                {"id": "p2", "teamMembers": ["u2"]}
            ],
            "timesheets": [
                {"id": "ts1", "userId": "u1", "projectId": "p1", "hours": 2},
                {"id": "ts2", "userId": "u1", "projectId": "p2", "hours": 3},
                {"id": "ts3", "userId": "u2", "projectId": "p1", "hours": 1}
            ],
            "expenses": [
                {"id": "e1", "userId": "u1", "projectId": null, "amount": 5}
            ]
        }));

        let by_project = project_data(&snapshot, "u1", ScopeRule::ProjectMembership);
        let by_owner = project_data(&snapshot, "u1", ScopeRule::Owner);

        assert_eq!(ids(&by_project.timesheets), vec!["ts1", "ts3"]);
        assert!(by_project.expenses.is_empty());
        assert_eq!(ids(&by_owner.timesheets), vec!["ts1", "ts2"]);
        assert_eq!(ids(&by_owner.expenses), vec!["e1"]);
    }

    #[test]
    fn test_orphans_degrade_to_placeholders() {
        let snapshot = snapshot(json!({
            "users": [{"id": "u1", "name": "Ada"}],
            "projects": [{"id": "p1", "name": "Apollo"}],
            "tasks": [
                {"id": "t1", "title": "Ok", "projectId": "p1", "assignedTo": "u1"},
                {"id": "t2", "title": "Orphan", "projectId": "deleted", "assignedTo": "ghost"},
                {"id": "t3", "title": "Loose", "projectId": null, "assignedTo": null}
            ]
        }));

        let joined = joined_tasks(&snapshot, snapshot.collection(Collection::Tasks));

        let labels: Vec<(&str, &str)> = joined
            .iter()
            .map(|j| (j.project_name.as_str(), j.assignee_name.as_str()))
            .collect();
        assert_eq!(
            labels,
            vec![("Apollo", "Ada"), (NO_PROJECT, UNKNOWN), (NO_PROJECT, "Unassigned")]
        );
        assert_eq!(resolve_name(&snapshot, Collection::Customers, Some("c1")), UNKNOWN);
        assert_eq!(resolve_name(&snapshot, Collection::Users, None), UNKNOWN);
    }

    #[test]
    fn test_unknown_user_sees_nothing() {
        let snapshot = snapshot(json!({"projects": [{"id": "p1", "teamMembers": ["u1"]}]}));
        assert_eq!(project_data(&snapshot, "nobody", ScopeRule::Owner), ProjectData::default());
    }
}
