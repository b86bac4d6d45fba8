use crate::CmdIdGroup;
use iris_types::{CmdId, CmdIdRange, SubCmdIdx};

/// One sibling entry in a group: a run of bare commands or a nested group.
#[derive(Debug, PartialEq)]
pub enum Span {
    Range(CmdIdRange),
    Group(CmdIdGroup),
}

impl Span {
    /// The command interval this span covers.
    pub fn bounds(&self) -> CmdIdRange {
        match self {
            Span::Range(r) => *r,
            Span::Group(g) => g.range,
        }
    }

    /// Direct items this span contributes to its parent: one per command
    /// for a range, exactly one for a group.
    pub fn item_count(&self) -> u64 {
        match self {
            Span::Range(r) => r.len(),
            Span::Group(_) => 1,
        }
    }
}

/// Payload handed to tree walks: a leaf command (by absolute id) or a
/// nested group.
#[derive(Debug)]
pub enum SpanItem<'a> {
    Cmd(SubCmdIdx),
    Group(&'a CmdIdGroup),
}

impl SpanItem<'_> {
    pub fn as_cmd(&self) -> Option<CmdId> {
        match self {
            SpanItem::Cmd(idx) => Some(idx.cmd_id()),
            SpanItem::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&CmdIdGroup> {
        match self {
            SpanItem::Cmd(_) => None,
            SpanItem::Group(g) => Some(g),
        }
    }
}

/// Bounding interval of a non-empty sorted span list.
pub(crate) fn bounds_of(spans: &[Span]) -> CmdIdRange {
    let start = spans.first().map(|s| s.bounds().start).unwrap_or(CmdId::new(0));
    let end = spans.last().map(|s| s.bounds().end).unwrap_or(CmdId::new(0));
    CmdIdRange::new(start, end)
}

/// Rewrites `spans` so no chunk holds more than `max` direct items, each
/// chunk wrapped in an auto-named "Sub Group k". Groups are atomic (never
/// divided); ranges crossing a chunk boundary are split in place. A
/// trailing remainder smaller than `max` still gets a wrapper.
pub(crate) fn split_spans(spans: Vec<Span>, max: u64) -> Vec<Span> {
    debug_assert!(max > 0);
    let mut out: Vec<Span> = Vec::new();
    let mut current: Vec<Span> = Vec::new();
    let mut count = 0u64;
    let mut k = 0usize;

    fn flush(out: &mut Vec<Span>, current: &mut Vec<Span>, count: &mut u64, k: &mut usize) {
        if current.is_empty() {
            return;
        }
        let chunk = std::mem::take(current);
        let range = bounds_of(&chunk);
        let mut g = CmdIdGroup::new(format!("Sub Group {k}"), range);
        g.spans = chunk;
        out.push(Span::Group(g));
        *count = 0;
        *k += 1;
    }

    for mut span in spans {
        loop {
            let space = max - count;
            if span.item_count() <= space {
                count += span.item_count();
                current.push(span);
                if count == max {
                    flush(&mut out, &mut current, &mut count, &mut k);
                }
                break;
            }
            // Only a range can exceed the remaining space; groups count 1
            // and space is always at least 1 after a flush.
            let Span::Range(r) = span else { unreachable!() };
            let cut = CmdId::new(r.start.value() + space);
            current.push(Span::Range(CmdIdRange::new(r.start, cut)));
            flush(&mut out, &mut current, &mut count, &mut k);
            span = Span::Range(CmdIdRange::new(cut, r.end));
        }
    }
    flush(&mut out, &mut current, &mut count, &mut k);
    out
}
