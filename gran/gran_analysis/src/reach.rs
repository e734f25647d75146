//! Reachability searches over the completed transition graph.
//!
//! All walks are iterative work-list searches: state counts grow with
//! the product of roles and subjects, so recursion is out. Blacklisted
//! effective roles are never entered. A state missing from the
//! transition map is a sink, not an error.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use gran_core::{AccessMode, Label, State};

use crate::Analysis;

/// One path to a state, as edge labels from the origin.
pub type Trace = Vec<Label>;

/// One path to a state, as `(predecessor, label)` pairs.
pub type EdgeTrace = Vec<(State, Label)>;

impl Analysis {
    /// Every state reachable from `from`, with one path each.
    ///
    /// The first path found is recorded; the origin maps to the empty
    /// trace.
    pub fn reachable_states(&self, from: &State) -> HashMap<State, Trace> {
        let mut seen: HashMap<State, Trace> = HashMap::new();
        let mut queue: VecDeque<State> = VecDeque::new();
        seen.insert(from.clone(), Vec::new());
        queue.push_back(from.clone());
        while let Some(state) = queue.pop_front() {
            let trace = seen[&state].clone();
            for (label, next) in self.graph.edges(&state) {
                if seen.contains_key(next) || !self.enterable(next) {
                    continue;
                }
                let mut extended = trace.clone();
                extended.push(label.clone());
                seen.insert(next.clone(), extended);
                queue.push_back(next.clone());
            }
        }
        seen
    }

    /// Like [`reachable_states`](Self::reachable_states), but each
    /// path carries its predecessor states for rendering.
    pub fn reachable_states_edges(&self, from: &State) -> HashMap<State, EdgeTrace> {
        let mut seen: HashMap<State, EdgeTrace> = HashMap::new();
        let mut queue: VecDeque<State> = VecDeque::new();
        seen.insert(from.clone(), Vec::new());
        queue.push_back(from.clone());
        while let Some(state) = queue.pop_front() {
            let trace = seen[&state].clone();
            for (label, next) in self.graph.edges(&state) {
                if seen.contains_key(next) || !self.enterable(next) {
                    continue;
                }
                let mut extended = trace.clone();
                extended.push((state.clone(), label.clone()));
                seen.insert(next.clone(), extended);
                queue.push_back(next.clone());
            }
        }
        seen
    }

    /// Two-phase search: walk from `from` until a state can read
    /// `target`, then collect every writable object of every state
    /// visited from that point on, each annotated with the traces by
    /// which it was reached.
    ///
    /// States are tracked separately per phase, so a state may be
    /// visited once while still hunting for the read and once more
    /// after it.
    pub fn reachable_write_objects(
        &self,
        from: &State,
        target: &str,
    ) -> BTreeMap<String, Vec<Trace>> {
        let mut read_seen: HashSet<State> = HashSet::new();
        let mut write_seen: HashSet<State> = HashSet::new();
        let mut result: BTreeMap<String, Vec<Trace>> = BTreeMap::new();
        let mut queue: VecDeque<(State, bool, Trace)> = VecDeque::new();

        read_seen.insert(from.clone());
        queue.push_back((from.clone(), false, Vec::new()));

        while let Some((state, mut writing, trace)) = queue.pop_front() {
            if !writing && self.read_allowed(&state, target) {
                if !write_seen.insert(state.clone()) {
                    continue;
                }
                writing = true;
            }
            if writing {
                for object in self.writable_objects(&state) {
                    result.entry(object).or_default().push(trace.clone());
                }
            }
            for (label, next) in self.graph.edges(&state) {
                if !self.enterable(next) {
                    continue;
                }
                let seen = if writing {
                    &mut write_seen
                } else {
                    &mut read_seen
                };
                if !seen.insert(next.clone()) {
                    continue;
                }
                let mut extended = trace.clone();
                extended.push(label.clone());
                queue.push_back((next.clone(), writing, extended));
            }
        }
        result
    }

    /// Single-phase walk recording, per object, the traces of every
    /// visited state that may access it in `mode`.
    pub fn trace_to_perm(&self, from: &State, mode: AccessMode) -> BTreeMap<String, Vec<Trace>> {
        let mut reached: Vec<(State, Trace)> = self.reachable_states(from).into_iter().collect();
        reached.sort_by(|a, b| a.0.cmp(&b.0));
        let mut result: BTreeMap<String, Vec<Trace>> = BTreeMap::new();
        for (state, trace) in reached {
            for object in self.objects_with_access(&state, mode) {
                result.entry(object).or_default().push(trace.clone());
            }
        }
        result
    }

    /// Objects the state's matched subject may write.
    pub fn writable_objects(&self, state: &State) -> Vec<String> {
        self.objects_with_access(state, AccessMode::Write)
    }

    fn objects_with_access(&self, state: &State, mode: AccessMode) -> Vec<String> {
        let (role, _) = crate::state::effective_role(&self.tables, state);
        let Ok(sc) = self.tables.match_subject(role, &state.subject) else {
            return Vec::new();
        };
        let Some(objects) = self.tables.objects_of(role, sc) else {
            return Vec::new();
        };
        objects
            .iter()
            .filter(|object| {
                self.tables
                    .perm(role, sc, object)
                    .is_some_and(|p| mode.allowed_by(p))
            })
            .map(str::to_string)
            .collect()
    }
}
