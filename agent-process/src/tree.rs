//! Process tree ordering for tree termination

use std::collections::{HashMap, HashSet};

/// A process and its parent, taken from a system snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub parent_pid: Option<u32>,
}

/// Order in which to kill `root` and all of its descendants.
///
/// Every process appears after all of its descendants; `root` is last.
pub fn kill_order(root: u32, records: &[ProcessRecord]) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for record in records {
        if let Some(parent) = record.parent_pid {
            if parent != record.pid {
                children.entry(parent).or_default().push(record.pid);
            }
        }
    }

    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![(root, false)];

    while let Some((pid, expanded)) = stack.pop() {
        if expanded {
            order.push(pid);
            continue;
        }
        // pid reuse can produce cycles in a snapshot
        if !seen.insert(pid) {
            continue;
        }
        stack.push((pid, true));
        if let Some(kids) = children.get(&pid) {
            for &kid in kids {
                if !seen.contains(&kid) {
                    stack.push((kid, false));
                }
            }
        }
    }

    order
}
