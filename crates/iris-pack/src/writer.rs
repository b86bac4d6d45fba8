use crate::varint::write_uvarint;
use crate::{tag, Message, PackError, MAGIC, MAJOR_VERSION, MINOR_VERSION};
use std::io::Write;

/// Streaming pack writer.
///
/// Group ids are allocated by the writer, counting up from 1. Every opened
/// group must be closed before [`Writer::finish`]; a cancelled operation
/// uses [`Writer::finish_cancelled`] instead, which marks the still-open
/// groups as non-terminated so readers can commit what was written.
pub struct Writer<W> {
    w: W,
    next_group: u64,
    /// Open group ids in opening order.
    open: Vec<u64>,
}

impl<W: Write> Writer<W> {
    pub fn new(mut w: W) -> Result<Self, PackError> {
        w.write_all(&MAGIC)?;
        w.write_all(&MAJOR_VERSION.to_le_bytes())?;
        w.write_all(&MINOR_VERSION.to_le_bytes())?;
        Ok(Writer {
            w,
            next_group: 1,
            open: Vec::new(),
        })
    }

    fn write_record(&mut self, tag: u8, parent: Option<u64>, msg: Option<&Message>) -> Result<(), PackError> {
        let mut buf = Vec::with_capacity(16 + msg.map_or(0, |m| m.bytes.len()));
        buf.push(tag);
        if let Some(p) = parent {
            write_uvarint(&mut buf, p);
        }
        if let Some(m) = msg {
            write_uvarint(&mut buf, m.msg_type);
            write_uvarint(&mut buf, m.bytes.len() as u64);
            buf.extend_from_slice(&m.bytes);
        }
        self.w.write_all(&buf)?;
        Ok(())
    }

    fn check_open(&self, id: u64) -> Result<(), PackError> {
        if self.open.contains(&id) {
            return Ok(());
        }
        Err(PackError::GroupNotOpen { id })
    }

    pub fn object(&mut self, msg: &Message) -> Result<(), PackError> {
        self.write_record(tag::OBJECT, None, Some(msg))
    }

    /// Opens a group and returns its id.
    pub fn begin_group(&mut self, msg: &Message) -> Result<u64, PackError> {
        self.write_record(tag::BEGIN_GROUP, None, Some(msg))?;
        let id = self.next_group;
        self.next_group += 1;
        self.open.push(id);
        Ok(id)
    }

    /// Opens a group nested under `parent` and returns its id.
    pub fn begin_child_group(&mut self, parent: u64, msg: &Message) -> Result<u64, PackError> {
        self.check_open(parent)?;
        self.write_record(tag::BEGIN_CHILD_GROUP, Some(parent), Some(msg))?;
        let id = self.next_group;
        self.next_group += 1;
        self.open.push(id);
        Ok(id)
    }

    pub fn child_object(&mut self, parent: u64, msg: &Message) -> Result<(), PackError> {
        self.check_open(parent)?;
        self.write_record(tag::CHILD_OBJECT, Some(parent), Some(msg))
    }

    pub fn end_group(&mut self, id: u64) -> Result<(), PackError> {
        self.check_open(id)?;
        self.write_record(tag::END_GROUP, Some(id), None)?;
        self.open.retain(|&g| g != id);
        Ok(())
    }

    pub fn end_group_non_terminated(&mut self, id: u64) -> Result<(), PackError> {
        self.check_open(id)?;
        self.write_record(tag::END_GROUP_NON_TERMINATED, Some(id), None)?;
        self.open.retain(|&g| g != id);
        Ok(())
    }

    /// Flushes and returns the sink. Fails if any group is still open.
    pub fn finish(mut self) -> Result<W, PackError> {
        if !self.open.is_empty() {
            return Err(PackError::UnclosedGroups {
                count: self.open.len(),
            });
        }
        self.w.flush()?;
        Ok(self.w)
    }

    /// Marks every still-open group non-terminated (most recently opened
    /// first), then flushes. Used when the producing operation was
    /// cancelled mid-stream.
    pub fn finish_cancelled(mut self) -> Result<W, PackError> {
        while let Some(id) = self.open.last().copied() {
            self.end_group_non_terminated(id)?;
        }
        self.w.flush()?;
        Ok(self.w)
    }
}
