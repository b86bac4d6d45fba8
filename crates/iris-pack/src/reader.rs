use crate::varint::read_uvarint;
use crate::{tag, Message, PackError, MAGIC, MAJOR_VERSION, MAX_MSG_SIZE, MIN_MAJOR_VERSION};
use std::io::{ErrorKind, Read};

/// One record of a pack stream, in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Object { msg: Message },
    BeginGroup { id: u64, msg: Message },
    BeginChildGroup { id: u64, parent: u64, msg: Message },
    ChildObject { parent: u64, msg: Message },
    EndGroup { id: u64 },
    EndGroupNonTerminated { id: u64 },
}

/// Streaming pack reader.
///
/// Yields events until the stream ends. A clean end requires every opened
/// group to have been closed or marked non-terminated; anything else is a
/// malformed stream. Errors carry the byte offset of the failing record.
#[derive(Debug)]
pub struct Reader<R> {
    r: R,
    offset: u64,
    major: u16,
    minor: u16,
    next_group: u64,
    open: Vec<u64>,
}

impl<R: Read> Reader<R> {
    pub fn new(mut r: R) -> Result<Self, PackError> {
        let mut magic = [0u8; 8];
        read_header_bytes(&mut r, &mut magic)?;
        if magic != MAGIC {
            return Err(PackError::InvalidMagic);
        }
        let mut version = [0u8; 4];
        read_header_bytes(&mut r, &mut version)?;
        let major = u16::from_le_bytes([version[0], version[1]]);
        let minor = u16::from_le_bytes([version[2], version[3]]);
        if major > MAJOR_VERSION {
            return Err(PackError::VersionTooNew {
                major,
                minor,
                supported: MAJOR_VERSION,
            });
        }
        if major < MIN_MAJOR_VERSION {
            return Err(PackError::VersionTooOld {
                major,
                minor,
                supported: MIN_MAJOR_VERSION,
            });
        }
        Ok(Reader {
            r,
            offset: 12,
            major,
            minor,
            next_group: 1,
            open: Vec::new(),
        })
    }

    pub fn version(&self) -> (u16, u16) {
        (self.major, self.minor)
    }

    /// Byte offset just past the last record read.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The next record, or `None` at a clean end of stream.
    pub fn next_event(&mut self) -> Result<Option<Event>, PackError> {
        let record_offset = self.offset;
        let mut tag_byte = [0u8; 1];
        match self.r.read_exact(&mut tag_byte) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                if !self.open.is_empty() {
                    return Err(PackError::UnclosedGroups {
                        count: self.open.len(),
                    });
                }
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        self.offset += 1;

        let event = match tag_byte[0] {
            tag::OBJECT => Event::Object {
                msg: self.read_msg(record_offset)?,
            },
            tag::BEGIN_GROUP => {
                let msg = self.read_msg(record_offset)?;
                let id = self.alloc_group();
                Event::BeginGroup { id, msg }
            }
            tag::BEGIN_CHILD_GROUP => {
                let parent = read_uvarint(&mut self.r, &mut self.offset)?;
                self.check_open(parent, record_offset)?;
                let msg = self.read_msg(record_offset)?;
                let id = self.alloc_group();
                Event::BeginChildGroup { id, parent, msg }
            }
            tag::CHILD_OBJECT => {
                let parent = read_uvarint(&mut self.r, &mut self.offset)?;
                self.check_open(parent, record_offset)?;
                let msg = self.read_msg(record_offset)?;
                Event::ChildObject { parent, msg }
            }
            tag::END_GROUP => {
                let id = read_uvarint(&mut self.r, &mut self.offset)?;
                self.close_group(id, record_offset)?;
                Event::EndGroup { id }
            }
            tag::END_GROUP_NON_TERMINATED => {
                let id = read_uvarint(&mut self.r, &mut self.offset)?;
                self.close_group(id, record_offset)?;
                Event::EndGroupNonTerminated { id }
            }
            _ => {
                return Err(PackError::BadRecord {
                    offset: record_offset,
                    reason: "unknown record tag",
                })
            }
        };
        Ok(Some(event))
    }

    fn alloc_group(&mut self) -> u64 {
        let id = self.next_group;
        self.next_group += 1;
        self.open.push(id);
        id
    }

    fn check_open(&self, id: u64, offset: u64) -> Result<(), PackError> {
        if self.open.contains(&id) {
            return Ok(());
        }
        Err(PackError::UnknownGroup { id, offset })
    }

    fn close_group(&mut self, id: u64, offset: u64) -> Result<(), PackError> {
        self.check_open(id, offset)?;
        self.open.retain(|&g| g != id);
        Ok(())
    }

    fn read_msg(&mut self, record_offset: u64) -> Result<Message, PackError> {
        let msg_type = read_uvarint(&mut self.r, &mut self.offset)?;
        let len = read_uvarint(&mut self.r, &mut self.offset)?;
        if len > MAX_MSG_SIZE {
            return Err(PackError::BadRecord {
                offset: record_offset,
                reason: "message length exceeds limit",
            });
        }
        let mut bytes = vec![0u8; len as usize];
        self.r.read_exact(&mut bytes).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                PackError::BadRecord {
                    offset: record_offset,
                    reason: "message truncated",
                }
            } else {
                PackError::Io(e)
            }
        })?;
        self.offset += len;
        Ok(Message { msg_type, bytes })
    }
}

fn read_header_bytes<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), PackError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            PackError::MissingHeader
        } else {
            PackError::Io(e)
        }
    })
}
