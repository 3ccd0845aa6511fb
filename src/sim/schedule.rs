/// Deferred spawn requests keyed by due time on the simulation clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduledSpawn {
    Traffic,
    Pedestrian,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    due: f64,
    spawn: ScheduledSpawn,
}

#[derive(Default)]
pub struct Schedule {
    entries: Vec<Entry>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, due: f64, spawn: ScheduledSpawn) {
        self.entries.push(Entry { due, spawn });
    }

    /// Removes and returns every entry due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: f64) -> Vec<ScheduledSpawn> {
        let mut due: Vec<Entry> = Vec::new();
        self.entries.retain(|entry| {
            if entry.due <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due.total_cmp(&b.due));
        due.into_iter().map(|entry| entry.spawn).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
