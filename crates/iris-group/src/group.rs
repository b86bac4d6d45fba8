use crate::span::{bounds_of, split_spans};
use crate::{Span, SpanItem};
use iris_types::{CmdId, CmdIdRange, SubCmdIdx};
use std::any::Any;
use std::fmt;
use std::ops::ControlFlow;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    #[error("group '{name}' [{start}..{end}) is not contained by receiver [{recv_start}..{recv_end})")]
    OutOfRange {
        name: String,
        start: CmdId,
        end: CmdId,
        recv_start: CmdId,
        recv_end: CmdId,
    },

    #[error("group '{name}' [{start}..{end}) overlaps existing group '{existing}' without containing it")]
    Overlap {
        name: String,
        start: CmdId,
        end: CmdId,
        existing: String,
    },
}

/// A named, possibly nested interval of commands.
///
/// Invariants: every span's bounds lie inside `range`; spans are sorted by
/// start and pairwise non-overlapping. The group's range need not coincide
/// with its bounding span.
pub struct CmdIdGroup {
    pub name: String,
    pub range: CmdIdRange,
    pub spans: Vec<Span>,
    /// Sub-commands a client may toggle experimentally (e.g. disable for
    /// profiling). Carried through; the tree itself never interprets them.
    pub experimentable_cmds: Vec<SubCmdIdx>,
    /// Open payload slot for clients. Ignored by `Debug` and `PartialEq`.
    pub user_data: Option<Box<dyn Any + Send>>,
}

impl CmdIdGroup {
    pub fn new(name: impl Into<String>, range: CmdIdRange) -> Self {
        CmdIdGroup {
            name: name.into(),
            range,
            spans: Vec::new(),
            experimentable_cmds: Vec::new(),
            user_data: None,
        }
    }

    /// Number of direct items: each bare range contributes one item per
    /// command, each sub-group contributes exactly one.
    pub fn count(&self) -> u64 {
        self.spans.iter().map(Span::item_count).sum()
    }

    /// The i-th direct item.
    pub fn index(&self, i: u64) -> Option<SpanItem<'_>> {
        let mut i = i;
        for span in &self.spans {
            let n = span.item_count();
            if i < n {
                return Some(match span {
                    Span::Range(r) => SpanItem::Cmd(SubCmdIdx::from_cmd(CmdId::new(
                        r.start.value() + i,
                    ))),
                    Span::Group(g) => SpanItem::Group(g),
                });
            }
            i -= n;
        }
        None
    }

    /// Index of the direct item whose bounds contain `id`. Ids falling in
    /// a gap at this level have no item.
    pub fn index_of(&self, id: CmdId) -> Option<u64> {
        let mut base = 0u64;
        for span in &self.spans {
            let b = span.bounds();
            if b.contains(id) {
                return Some(match span {
                    Span::Range(r) => base + (id.value() - r.start.value()),
                    Span::Group(_) => base,
                });
            }
            base += span.item_count();
        }
        None
    }

    /// Inserts a group over `[start, end)` at the deepest existing group
    /// whose range contains it.
    ///
    /// Existing sibling spans fully inside the new range are absorbed into
    /// it; bare ranges crossing its edges are split in place. Inserting a
    /// range identical to an existing sub-group's wraps that sub-group:
    /// the last added becomes the ancestor.
    pub fn add_group(
        &mut self,
        start: CmdId,
        end: CmdId,
        name: impl Into<String>,
        experimentable_cmds: Vec<SubCmdIdx>,
    ) -> Result<(), GroupError> {
        let name = name.into();
        if start > end || start < self.range.start || end > self.range.end {
            return Err(GroupError::OutOfRange {
                name,
                start,
                end,
                recv_start: self.range.start,
                recv_end: self.range.end,
            });
        }
        let r = CmdIdRange::new(start, end);
        let lo = self.spans.partition_point(|s| s.bounds().end <= start);
        let hi = self.spans.partition_point(|s| s.bounds().start < end);

        if hi - lo == 1 {
            if let Span::Group(h) = &mut self.spans[lo] {
                if contains_range(&h.range, &r) && h.range != r {
                    return h.add_group(start, end, name, experimentable_cmds);
                }
                if h.range == r {
                    let old = self.spans.remove(lo);
                    let mut g = CmdIdGroup::new(name, r);
                    g.experimentable_cmds = experimentable_cmds;
                    g.spans.push(old);
                    self.spans.insert(lo, Span::Group(g));
                    return Ok(());
                }
            }
        }

        // Validate before mutating: a partially overlapping sub-group is a
        // hard error and must leave the tree untouched.
        for span in &self.spans[lo..hi] {
            if let Span::Group(h) = span {
                if !contains_range(&r, &h.range) {
                    return Err(GroupError::Overlap {
                        name,
                        start,
                        end,
                        existing: h.name.clone(),
                    });
                }
            }
        }

        let mut g = CmdIdGroup::new(name, r);
        g.experimentable_cmds = experimentable_cmds;
        let mut left: Option<Span> = None;
        let mut right: Option<Span> = None;
        for span in self.spans.drain(lo..hi) {
            match span {
                Span::Group(h) => g.spans.push(Span::Group(h)),
                Span::Range(rng) => {
                    if rng.start < start {
                        left = Some(Span::Range(CmdIdRange::new(rng.start, start)));
                    }
                    let inner = CmdIdRange::new(rng.start.max(start), rng.end.min(end));
                    if !inner.is_empty() {
                        g.spans.push(Span::Range(inner));
                    }
                    if rng.end > end {
                        right = Some(Span::Range(CmdIdRange::new(end, rng.end)));
                    }
                }
            }
        }
        let mut insert_at = lo;
        if let Some(l) = left {
            self.spans.insert(insert_at, l);
            insert_at += 1;
        }
        self.spans.insert(insert_at, Span::Group(g));
        if let Some(rt) = right {
            self.spans.insert(insert_at + 1, rt);
        }
        Ok(())
    }

    /// Inserts a single command, merging with an adjacent bare range.
    /// Commands falling inside a sub-group are added to that sub-group.
    /// Ids already present are left alone.
    pub fn add_command(&mut self, id: CmdId) {
        let pos = self.spans.partition_point(|s| s.bounds().end <= id);
        if pos < self.spans.len() && self.spans[pos].bounds().contains(id) {
            match &mut self.spans[pos] {
                Span::Range(_) => {}
                Span::Group(g) => g.add_command(id),
            }
            return;
        }
        let mut start = id;
        let mut end = CmdId::new(id.value() + 1);
        // Coalesce with the bare range ending at `id`.
        if pos > 0 {
            if let Span::Range(prev) = &self.spans[pos - 1] {
                if prev.end == id {
                    start = prev.start;
                }
            }
        }
        // Coalesce with the bare range starting right after `id`.
        if pos < self.spans.len() {
            if let Span::Range(next) = &self.spans[pos] {
                if next.start == end {
                    end = next.end;
                }
            }
        }
        let merged = Span::Range(CmdIdRange::new(start, end));
        let remove_prev = start != id;
        let remove_next = end != CmdId::new(id.value() + 1);
        if remove_next {
            self.spans[pos] = merged;
            if remove_prev {
                self.spans.remove(pos - 1);
            }
        } else if remove_prev {
            self.spans[pos - 1] = merged;
        } else {
            self.spans.insert(pos, merged);
        }
    }

    /// Post-processes the sibling list for presentation.
    ///
    /// If `max_children > 0` and any bare range holds more than
    /// `max_children` commands, the whole list is re-chunked via the span
    /// splitter. If `max_neighbours > 0`, each maximal run of bare
    /// commands longer than `max_neighbours` is wrapped in a "Sub Group"
    /// wrapper so named sub-groups stay visible.
    pub fn cluster(&mut self, max_children: u64, max_neighbours: u64) {
        if max_children > 0
            && self
                .spans
                .iter()
                .any(|s| matches!(s, Span::Range(r) if r.len() > max_children))
        {
            let spans = std::mem::take(&mut self.spans);
            self.spans = split_spans(spans, max_children);
        }
        if max_neighbours > 0 {
            let spans = std::mem::take(&mut self.spans);
            let mut out: Vec<Span> = Vec::new();
            let mut run: Vec<Span> = Vec::new();
            fn flush(out: &mut Vec<Span>, run: &mut Vec<Span>, max_neighbours: u64) {
                if run.is_empty() {
                    return;
                }
                let len: u64 = run.iter().map(Span::item_count).sum();
                if len > max_neighbours {
                    let chunk = std::mem::take(run);
                    let range = bounds_of(&chunk);
                    let mut g = CmdIdGroup::new("Sub Group", range);
                    g.spans = chunk;
                    out.push(Span::Group(g));
                } else {
                    out.append(run);
                }
            }
            for span in spans {
                match span {
                    Span::Range(_) => run.push(span),
                    Span::Group(_) => {
                        flush(&mut out, &mut run, max_neighbours);
                        out.push(span);
                    }
                }
            }
            flush(&mut out, &mut run, max_neighbours);
            self.spans = out;
        }
    }

    /// Visits direct items from index `from` upward.
    pub fn iterate_forwards<F>(&self, from: u64, mut cb: F) -> ControlFlow<()>
    where
        F: FnMut(u64, SpanItem<'_>) -> ControlFlow<()>,
    {
        let count = self.count();
        for i in from..count {
            let item = self.index(i).expect("index within count");
            cb(i, item)?;
        }
        ControlFlow::Continue(())
    }

    /// Visits direct items from index `from` downward to 0.
    pub fn iterate_backwards<F>(&self, from: u64, mut cb: F) -> ControlFlow<()>
    where
        F: FnMut(u64, SpanItem<'_>) -> ControlFlow<()>,
    {
        let count = self.count();
        if count == 0 {
            return ControlFlow::Continue(());
        }
        let mut i = from.min(count - 1);
        loop {
            let item = self.index(i).expect("index within count");
            cb(i, item)?;
            if i == 0 {
                return ControlFlow::Continue(());
            }
            i -= 1;
        }
    }

    /// Depth-first walk over the whole subtree.
    ///
    /// Groups are visited at their entry point: forward order is pre-order,
    /// backward order is its exact reverse. `from` is an index path naming
    /// the first item to visit (empty for the natural first item); the
    /// callback receives the index path of each visited item.
    pub fn traverse<F>(&self, backwards: bool, from: &[u64], cb: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&[u64], SpanItem<'_>) -> ControlFlow<()>,
    {
        let mut path = Vec::with_capacity(from.len() + 4);
        let start = if from.is_empty() { None } else { Some(from) };
        self.traverse_inner(backwards, start, &mut path, cb)
    }

    fn traverse_inner<F>(
        &self,
        backwards: bool,
        start: Option<&[u64]>,
        path: &mut Vec<u64>,
        cb: &mut F,
    ) -> ControlFlow<()>
    where
        F: FnMut(&[u64], SpanItem<'_>) -> ControlFlow<()>,
    {
        let count = self.count();
        if count == 0 {
            return ControlFlow::Continue(());
        }
        let (begin, rest) = match start {
            Some([i, rest @ ..]) => ((*i).min(count - 1), Some(rest)),
            _ => (if backwards { count - 1 } else { 0 }, None),
        };
        let mut i = begin;
        loop {
            let deeper = if i == begin { rest } else { None };
            path.push(i);
            let item = self.index(i).expect("index within count");
            match item {
                SpanItem::Cmd(idx) => cb(path, SpanItem::Cmd(idx))?,
                SpanItem::Group(g) => {
                    let names_group_itself = deeper.map_or(true, |r| r.is_empty());
                    let descend = deeper.filter(|r| !r.is_empty());
                    if backwards {
                        // Reversed pre-order: children first, entry after.
                        // Starting at the group itself skips its children;
                        // they come later in forward order, so earlier than
                        // nothing here.
                        if deeper.is_none() {
                            g.traverse_inner(true, None, path, cb)?;
                        } else if let Some(d) = descend {
                            g.traverse_inner(true, Some(d), path, cb)?;
                        }
                        cb(path, SpanItem::Group(g))?;
                    } else {
                        if names_group_itself {
                            cb(path, SpanItem::Group(g))?;
                        }
                        g.traverse_inner(false, descend, path, cb)?;
                    }
                }
            }
            path.pop();
            if backwards {
                if i == 0 {
                    return ControlFlow::Continue(());
                }
                i -= 1;
            } else {
                i += 1;
                if i == count {
                    return ControlFlow::Continue(());
                }
            }
        }
    }
}

fn contains_range(outer: &CmdIdRange, inner: &CmdIdRange) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

impl fmt::Debug for CmdIdGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmdIdGroup")
            .field("name", &self.name)
            .field("range", &self.range)
            .field("spans", &self.spans)
            .field("experimentable_cmds", &self.experimentable_cmds)
            .finish_non_exhaustive()
    }
}

// `user_data` is an open payload slot; it takes no part in equality.
impl PartialEq for CmdIdGroup {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.range == other.range
            && self.spans == other.spans
            && self.experimentable_cmds == other.experimentable_cmds
    }
}
