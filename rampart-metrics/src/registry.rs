use dashmap::DashMap;
use parking_lot::RwLock;

use crate::storage::{MetricStorage, MetricValue};
use crate::tags::{Sym, SymbolTable, TagSet};
use crate::{MetricHandle, MetricKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricId(u32);

#[derive(Debug)]
struct MetricDef {
    name: Sym,
    kind: MetricKind,
}

/// One snapshotted series: metric name, kind, resolved tags, and value.
#[derive(Debug, Clone)]
pub struct SeriesSummary {
    pub name: String,
    pub kind: MetricKind,
    pub tags: Vec<(String, String)>,
    pub value: MetricValue,
}

#[derive(Debug, Default)]
pub struct Registry {
    symbols: SymbolTable,
    defs: RwLock<Vec<MetricDef>>,
    series: DashMap<(MetricId, TagSet), MetricStorage>,
}

impl Registry {
    /// Register a metric, or return the existing id if the name is taken.
    /// Re-registering with a different kind keeps the original kind.
    pub fn register(&self, name: &str, kind: MetricKind) -> MetricId {
        let name = self.symbols.intern(name);

        let mut defs = self.defs.write();
        if let Some(idx) = defs.iter().position(|d| d.name == name) {
            return MetricId(idx as u32);
        }

        let id = MetricId(defs.len() as u32);
        defs.push(MetricDef { name, kind });
        id
    }

    pub fn lookup(&self, name: &str) -> Option<(MetricId, MetricKind)> {
        let defs = self.defs.read();
        defs.iter()
            .enumerate()
            .find(|(_, d)| self.symbols.resolve(d.name).as_deref() == Some(name))
            .map(|(idx, d)| (MetricId(idx as u32), d.kind))
    }

    pub fn kind_of(&self, metric: MetricId) -> Option<MetricKind> {
        self.defs.read().get(metric.0 as usize).map(|d| d.kind)
    }

    pub fn resolve_tags(&self, tags: &[(&str, &str)]) -> TagSet {
        TagSet::from_pairs(
            tags.iter()
                .map(|(k, v)| (self.symbols.intern(k), self.symbols.intern(v))),
        )
    }

    /// Writer handle for the series `metric` x `tags`, created on first use.
    pub fn series(&self, metric: MetricId, tags: TagSet) -> Option<MetricHandle> {
        if let Some(existing) = self.series.get(&(metric, tags.clone())) {
            return Some(existing.handle());
        }

        let kind = self.kind_of(metric)?;
        let entry = self
            .series
            .entry((metric, tags))
            .or_insert_with(|| MetricStorage::new(kind));
        Some(entry.handle())
    }

    /// Writer handle for the untagged base series of `metric`.
    pub fn base_series(&self, metric: MetricId) -> Option<MetricHandle> {
        self.series(metric, TagSet::empty())
    }

    /// Snapshot of the untagged base series, if any sample created it.
    pub fn base_value(&self, metric: MetricId) -> Option<MetricValue> {
        self.series
            .get(&(metric, TagSet::empty()))
            .map(|s| s.value().value())
    }

    /// Immutable snapshot of every live series, sorted by name then tags.
    pub fn summarize(&self) -> Vec<SeriesSummary> {
        let defs = self.defs.read();
        let mut out = Vec::with_capacity(self.series.len());

        for entry in self.series.iter() {
            let (metric, tags) = entry.key();
            let Some(def) = defs.get(metric.0 as usize) else {
                continue;
            };

            let resolve = |sym: Sym| {
                self.symbols
                    .resolve(sym)
                    .map(|s| s.to_string())
                    .unwrap_or_default()
            };

            out.push(SeriesSummary {
                name: resolve(def.name),
                kind: def.kind,
                tags: tags.iter().map(|(k, v)| (resolve(k), resolve(v))).collect(),
                value: entry.value().value(),
            });
        }

        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.tags.cmp(&b.tags)));
        out
    }
}
