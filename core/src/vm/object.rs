//! Object tree and property tables (version 4+ layout).
//!
//! Entries are 14 bytes: 48 attribute bits, parent, sibling and child object
//! numbers, and the address of the property table. `Header::objects` is
//! already offset by one entry, so object `n` lives at `objects + 14 * n`.

use anyhow::{Result, bail};
use tracing::warn;

use crate::vm::machine::Machine;

const ENTRY_SIZE: u32 = 14;
const PARENT: u32 = 6;
const SIBLING: u32 = 8;
const CHILD: u32 = 10;
const PROPERTIES: u32 = 12;

/// A property located in an object's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Property {
    number: u8,
    len: u16,
    data: u32,
}

impl Machine {
    #[inline]
    fn entry(&self, obj: u16) -> usize {
        (self.header.objects + ENTRY_SIZE * obj as u32) as usize
    }

    /// Object 0 reaches here only from buggy story code; reads answer 0/false.
    fn null_object(&self, obj: u16, op: &str) -> bool {
        if obj == 0 {
            warn!(target: "zvm::object", op, pc = self.state.pc, "operation on object 0");
            return true;
        }
        false
    }

    pub fn test_attr(&self, obj: u16, attr: u16) -> Result<bool> {
        if self.null_object(obj, "test_attr") || attr >= 48 {
            return Ok(false);
        }
        let byte = self.memory.read8(self.entry(obj) + attr as usize / 8)?;
        Ok(byte & (0x80 >> (attr % 8)) != 0)
    }

    pub fn set_attr(&mut self, obj: u16, attr: u16, on: bool) -> Result<()> {
        if self.null_object(obj, "set_attr") || attr >= 48 {
            return Ok(());
        }
        let addr = self.entry(obj) + attr as usize / 8;
        let mask = 0x80u8 >> (attr % 8);
        let byte = self.memory.read8(addr)?;
        self.memory.write8(addr, if on { byte | mask } else { byte & !mask })?;
        Ok(())
    }

    fn link(&self, obj: u16, field: u32, op: &str) -> Result<u16> {
        if self.null_object(obj, op) {
            return Ok(0);
        }
        Ok(self.memory.read16(self.entry(obj) + field as usize)?)
    }

    fn set_link(&mut self, obj: u16, field: u32, value: u16) -> Result<()> {
        let addr = self.entry(obj) + field as usize;
        Ok(self.memory.write16(addr, value)?)
    }

    pub fn parent(&self, obj: u16) -> Result<u16> {
        self.link(obj, PARENT, "get_parent")
    }

    pub fn sibling(&self, obj: u16) -> Result<u16> {
        self.link(obj, SIBLING, "get_sibling")
    }

    pub fn child(&self, obj: u16) -> Result<u16> {
        self.link(obj, CHILD, "get_child")
    }

    /// Detach `obj` from its parent, keeping the rest of the sibling chain intact.
    pub fn remove_obj(&mut self, obj: u16) -> Result<()> {
        if self.null_object(obj, "remove_obj") {
            return Ok(());
        }
        let parent = self.parent(obj)?;
        if parent == 0 {
            return Ok(());
        }
        let next = self.sibling(obj)?;
        let first = self.child(parent)?;
        if first == obj {
            self.set_link(parent, CHILD, next)?;
        } else {
            let mut cur = first;
            while cur != 0 {
                let sib = self.sibling(cur)?;
                if sib == obj {
                    self.set_link(cur, SIBLING, next)?;
                    break;
                }
                cur = sib;
            }
        }
        self.set_link(obj, PARENT, 0)?;
        self.set_link(obj, SIBLING, 0)?;
        Ok(())
    }

    /// Make `obj` the first child of `dest`.
    pub fn insert_obj(&mut self, obj: u16, dest: u16) -> Result<()> {
        if self.null_object(obj, "insert_obj") || self.null_object(dest, "insert_obj") {
            return Ok(());
        }
        self.remove_obj(obj)?;
        let first = self.child(dest)?;
        self.set_link(obj, SIBLING, first)?;
        self.set_link(obj, PARENT, dest)?;
        self.set_link(dest, CHILD, obj)?;
        Ok(())
    }

    fn property_table(&self, obj: u16) -> Result<u32> {
        Ok(self.memory.read16(self.entry(obj) + PROPERTIES as usize)? as u32)
    }

    /// Address of the object's short name z-string, or `None` when it has none.
    pub fn short_name_addr(&self, obj: u16) -> Result<Option<u32>> {
        if self.null_object(obj, "print_obj") {
            return Ok(None);
        }
        let table = self.property_table(obj)?;
        if self.memory.read8(table as usize)? == 0 {
            return Ok(None);
        }
        Ok(Some(table + 1))
    }

    /// Decode the property header at `addr`; `None` marks the end of the list.
    fn property_at(&self, addr: u32) -> Result<Option<Property>> {
        let b = self.memory.read8(addr as usize)?;
        if b == 0 {
            return Ok(None);
        }
        let number = b & 0x3F;
        let prop = if b & 0x80 != 0 {
            let len = match self.memory.read8(addr as usize + 1)? & 0x3F {
                0 => 64,
                n => n as u16,
            };
            Property {
                number,
                len,
                data: addr + 2,
            }
        } else {
            Property {
                number,
                len: if b & 0x40 != 0 { 2 } else { 1 },
                data: addr + 1,
            }
        };
        Ok(Some(prop))
    }

    fn first_property(&self, obj: u16) -> Result<Option<Property>> {
        let table = self.property_table(obj)?;
        let name_words = self.memory.read8(table as usize)? as u32;
        self.property_at(table + 1 + 2 * name_words)
    }

    fn find_property(&self, obj: u16, number: u16) -> Result<Option<Property>> {
        let mut cur = self.first_property(obj)?;
        while let Some(prop) = cur {
            if prop.number as u16 == number {
                return Ok(Some(prop));
            }
            // properties are stored in descending order
            if (prop.number as u16) < number {
                break;
            }
            cur = self.property_at(prop.data + prop.len as u32)?;
        }
        Ok(None)
    }

    /// Property value, falling back to the defaults table.
    pub fn get_prop(&self, obj: u16, number: u16) -> Result<u16> {
        if !self.null_object(obj, "get_prop")
            && let Some(prop) = self.find_property(obj, number)?
        {
            return Ok(match prop.len {
                1 => self.memory.read8(prop.data as usize)? as u16,
                _ => self.memory.read16(prop.data as usize)?,
            });
        }
        let default = self.header.property_defaults as usize + 2 * (number.max(1) as usize - 1);
        Ok(self.memory.read16(default)?)
    }

    pub fn get_prop_addr(&self, obj: u16, number: u16) -> Result<u16> {
        if self.null_object(obj, "get_prop_addr") {
            return Ok(0);
        }
        Ok(self.find_property(obj, number)?.map_or(0, |p| p.data as u16))
    }

    /// Length of the property whose data starts at `data`; `get_prop_len 0` is 0.
    pub fn get_prop_len(&self, data: u16) -> Result<u16> {
        if data == 0 {
            return Ok(0);
        }
        let b = self.memory.read8(data as usize - 1)?;
        let len = if b & 0x80 != 0 {
            match b & 0x3F {
                0 => 64,
                n => n as u16,
            }
        } else if b & 0x40 != 0 {
            2
        } else {
            1
        };
        Ok(len)
    }

    /// Number of the property after `number` (first property when `number` is 0).
    pub fn get_next_prop(&self, obj: u16, number: u16) -> Result<u16> {
        if self.null_object(obj, "get_next_prop") {
            return Ok(0);
        }
        let next = if number == 0 {
            self.first_property(obj)?
        } else {
            match self.find_property(obj, number)? {
                Some(prop) => self.property_at(prop.data + prop.len as u32)?,
                None => None,
            }
        };
        Ok(next.map_or(0, |p| p.number as u16))
    }

    pub fn put_prop(&mut self, obj: u16, number: u16, value: u16) -> Result<()> {
        if self.null_object(obj, "put_prop") {
            return Ok(());
        }
        let Some(prop) = self.find_property(obj, number)? else {
            bail!("put_prop: object {} has no property {}", obj, number);
        };
        match prop.len {
            1 => self.memory.write8(prop.data as usize, value as u8)?,
            _ => self.memory.write16(prop.data as usize, value)?,
        }
        Ok(())
    }
}
