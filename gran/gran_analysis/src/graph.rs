//! Transition graph construction.
//!
//! A work-list fixed point materialises every reachable RBAC state and
//! its labelled outgoing edges. The initial frontier is the full
//! product of role slots and declared subjects (plus any seeded entry
//! states); each popped state contributes role-transition, set-UID,
//! set-GID, and exec edges, and newly discovered states join the
//! queue. The state space is finite, so the loop terminates.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, info};

use gran_core::{AccessMode, Capability, Label, Result, State, DONTCARE};
use gran_policy::PolicyTables;

use crate::state::effective_role;

/// The completed state set and transition relation.
///
/// Append-only during construction, read-only afterwards. A state
/// absent from `trans` is a sink: it has no outgoing edges.
#[derive(Debug, Default)]
pub struct TransitionGraph {
    pub states: HashSet<State>,
    pub trans: HashMap<State, Vec<(Label, State)>>,
}

impl TransitionGraph {
    /// Outgoing edges of `state`; absent states are sinks.
    pub fn edges(&self, state: &State) -> &[(Label, State)] {
        self.trans.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.trans.values().map(Vec::len).sum()
    }
}

/// Build the transition graph over `tables`.
pub fn build_graph(
    tables: &PolicyTables,
    blacklist: &BTreeSet<String>,
    best_case: bool,
    seeds: &[State],
) -> Result<TransitionGraph> {
    let mut graph = TransitionGraph::default();
    let mut queue: VecDeque<State> = VecDeque::new();

    let specials = slot_values(&tables.special_roles, Some(blacklist));
    let users = slot_values(&tables.user_roles, None);
    let groups = slot_values(&tables.group_roles, None);

    for special in &specials {
        for user in &users {
            for group in &groups {
                for subject in tables.all_subjects.iter() {
                    let state = State::new(*special, *user, *group, subject);
                    if graph.states.insert(state.clone()) {
                        queue.push_back(state);
                    }
                }
            }
        }
    }
    for seed in seeds {
        if graph.states.insert(seed.clone()) {
            queue.push_back(seed.clone());
        }
    }

    while let Some(state) = queue.pop_front() {
        let (role, _) = effective_role(tables, &state);
        if blacklist.contains(role) {
            continue;
        }
        let role = role.to_string();
        if tables
            .subject_paths
            .get(&role)
            .map_or(true, |set| set.is_empty())
        {
            // A slot may name a role that declares no subjects (most
            // commonly an absent default role); such states are sinks.
            debug!(role = %role, "effective role has no subjects; sink state");
            graph.trans.insert(state, Vec::new());
            continue;
        }
        let sc = tables.match_subject(&role, &state.subject)?.to_string();

        let mut edges: Vec<(Label, State)> = Vec::new();
        let mut emitted: HashSet<(Label, State)> = HashSet::new();
        let mut emit = |edges: &mut Vec<(Label, State)>, label: Label, next: State| {
            if emitted.insert((label.clone(), next.clone())) {
                edges.push((label, next));
            }
        };

        // Role transitions change the special slot.
        let mut targets: Vec<&str> = tables
            .role_transitions
            .get(&role)
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default();
        targets.push(DONTCARE);
        for target in targets {
            if target != DONTCARE && !tables.roles.contains_key(target) {
                debug!(role = %role, to = target, "transition to undeclared role skipped");
                continue;
            }
            if blacklist.contains(target) {
                continue;
            }
            emit(
                &mut edges,
                Label::SetRole(target.to_string()),
                state.with_special(target),
            );
        }

        // Identity transitions require the respective capability.
        let caps = tables.caps_of(&role, &sc);
        if caps.is_some_and(|c| c.contains(&Capability::SetUid)) {
            if let Some(set) = tables.user_trans_of(&role, &sc) {
                for user in set {
                    if blacklist.contains(user) {
                        continue;
                    }
                    emit(
                        &mut edges,
                        Label::SetUid(user.clone()),
                        state.with_user(user_slot(tables, user)),
                    );
                }
            }
        }
        if caps.is_some_and(|c| c.contains(&Capability::SetGid)) {
            if let Some(set) = tables.grp_trans_of(&role, &sc) {
                for group in set {
                    if blacklist.contains(group) {
                        continue;
                    }
                    emit(
                        &mut edges,
                        Label::SetGid(group.clone()),
                        state.with_group(group_slot(tables, group)),
                    );
                }
            }
        }

        // Exec: entering whatever subject governs the executed binary.
        let objects = tables.objects_of(&role, &sc);
        let executable: Vec<String> = objects
            .map(|set| {
                set.iter()
                    .filter(|obj| {
                        tables
                            .perm(&role, &sc, obj)
                            .is_some_and(|p| AccessMode::Exec.allowed_by(p))
                    })
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        for object in executable {
            for target_subject in ex_img(tables, &object, &role, &sc) {
                if best_case {
                    emit(
                        &mut edges,
                        Label::Exec(object.clone()),
                        state.with_subject(target_subject.as_str()),
                    );
                    continue;
                }
                // A set-UID/GID binary may change identity with no
                // capability check.
                let mut users: BTreeSet<&str> = tables
                    .user_trans_of(&role, &sc)
                    .map(|s| s.iter().map(String::as_str).collect())
                    .unwrap_or_default();
                users.insert(state.user.as_str());
                let mut groups: BTreeSet<&str> = tables
                    .grp_trans_of(&role, &sc)
                    .map(|s| s.iter().map(String::as_str).collect())
                    .unwrap_or_default();
                groups.insert(state.group.as_str());
                for user in &users {
                    if blacklist.contains(*user) {
                        continue;
                    }
                    for group in &groups {
                        if blacklist.contains(*group) {
                            continue;
                        }
                        emit(
                            &mut edges,
                            Label::Exec(object.clone()),
                            State::new(
                                state.special.clone(),
                                user_slot(tables, user),
                                group_slot(tables, group),
                                target_subject.clone(),
                            ),
                        );
                    }
                }
            }
        }

        for (_, next) in &edges {
            if graph.states.insert(next.clone()) {
                queue.push_back(next.clone());
            }
        }
        graph.trans.insert(state, edges);
    }

    info!(
        states = graph.states.len(),
        edges = graph.edge_count(),
        "transition graph built"
    );
    Ok(graph)
}

fn slot_values<'a>(
    roles: &'a [String],
    blacklist: Option<&BTreeSet<String>>,
) -> Vec<&'a str> {
    let mut out: Vec<&str> = roles
        .iter()
        .filter(|r| blacklist.map_or(true, |b| !b.contains(*r)))
        .map(String::as_str)
        .collect();
    out.push(DONTCARE);
    out
}

/// The user slot a transition to `user` lands in: the role itself if
/// it is a declared user role, otherwise the wildcard.
fn user_slot<'a>(tables: &PolicyTables, user: &'a str) -> &'a str {
    if tables.user_roles.iter().any(|r| r == user) {
        user
    } else {
        DONTCARE
    }
}

fn group_slot<'a>(tables: &PolicyTables, group: &'a str) -> &'a str {
    if tables.group_roles.iter().any(|r| r == group) {
        group
    } else {
        DONTCARE
    }
}

/// Candidate subjects entered by executing `object` from `(role, sc)`:
/// every declared subject that lies under the object's pattern and
/// whose governing object entry is exactly `object`, plus the subject
/// governing the object path itself.
fn ex_img(tables: &PolicyTables, object: &str, role: &str, sc: &str) -> Vec<String> {
    let mut out: BTreeSet<String> = BTreeSet::new();
    let objects = tables.objects_of(role, sc);
    let pattern = objects.and_then(|set| set.get(object));
    for candidate in tables.all_subjects.iter() {
        let under = pattern.is_some_and(|p| p.matches_prefix_of(candidate));
        if under && objects.and_then(|set| set.gmp(candidate)) == Some(object) {
            out.insert(candidate.to_string());
        }
    }
    if let Some(governing) = tables.all_subjects.gmp(object) {
        out.insert(governing.to_string());
    }
    out.into_iter().collect()
}
